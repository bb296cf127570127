//! Sample-shaped views of a single series.
//!
//! A [`Series`] pairs the series identity ([`Labels`]) with a lazy, single-pass
//! [`SampleIterator`]. Sample mergers operate on this shape; the chunk-shaped
//! counterpart lives in [`crate::chunk`].

use std::fmt;

use crate::chunk::SourceError;

/// One timestamped value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Timestamp in milliseconds.
    pub t: i64,
    /// Sample value.
    pub v: f64,
}

impl Sample {
    /// Build a sample.
    pub const fn new(t: i64, v: f64) -> Self {
        Self { t, v }
    }
}

impl From<(i64, f64)> for Sample {
    fn from((t, v): (i64, f64)) -> Self {
        Self { t, v }
    }
}

/// Label set identifying a series, kept sorted by label name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    /// Label set with no labels.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a label set from name/value pairs. Later duplicates of a name win.
    pub fn from_pairs<N, V, I>(pairs: I) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (N, V)>,
    {
        let mut labels: Vec<(String, String)> = Vec::new();
        for (name, value) in pairs {
            let name = name.into();
            let value = value.into();
            match labels.binary_search_by(|(existing, _)| existing.as_str().cmp(&name)) {
                Ok(idx) => labels[idx].1 = value,
                Err(idx) => labels.insert(idx, (name, value)),
            }
        }
        Self(labels)
    }

    /// Value of the label `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .binary_search_by(|(existing, _)| existing.as_str().cmp(name))
            .ok()
            .map(|idx| self.0[idx].1.as_str())
    }

    /// Returns `true` when the set carries no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        f.write_str("}")
    }
}

/// Forward-only, single-pass sequence of samples in timestamp order.
///
/// Iteration ends either because the source is exhausted or because it failed;
/// callers tell the two apart with [`SampleIterator::take_error`] once `next`
/// returned `None`.
pub trait SampleIterator: Iterator<Item = Sample> {
    /// Error that terminated iteration, if any.
    fn take_error(&mut self) -> Option<SourceError>;
}

/// Boxed sample iterator that can be handed to another worker thread.
pub type BoxSampleIterator = Box<dyn SampleIterator + Send>;

impl<I: SampleIterator + ?Sized> SampleIterator for Box<I> {
    fn take_error(&mut self) -> Option<SourceError> {
        (**self).take_error()
    }
}

/// In-memory sample iterator that never fails.
#[derive(Debug, Default)]
pub struct VecSampleIterator {
    inner: std::vec::IntoIter<Sample>,
}

impl VecSampleIterator {
    /// Iterate over `samples` in the order given.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            inner: samples.into_iter(),
        }
    }
}

impl Iterator for VecSampleIterator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        self.inner.next()
    }
}

impl SampleIterator for VecSampleIterator {
    fn take_error(&mut self) -> Option<SourceError> {
        None
    }
}

/// A labelled, lazily produced sample sequence.
pub struct Series {
    labels: Labels,
    samples: BoxSampleIterator,
}

impl Series {
    /// Pair `labels` with a sample source.
    pub fn new(labels: Labels, samples: BoxSampleIterator) -> Self {
        Self { labels, samples }
    }

    /// Series backed by an in-memory sample list.
    pub fn from_samples(labels: Labels, samples: Vec<Sample>) -> Self {
        Self::new(labels, Box::new(VecSampleIterator::new(samples)))
    }

    /// Labels of the series.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Consume the series, keeping only the sample source.
    pub fn into_samples(self) -> BoxSampleIterator {
        self.samples
    }

    /// Split into labels and sample source.
    pub fn into_parts(self) -> (Labels, BoxSampleIterator) {
        (self.labels, self.samples)
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}
