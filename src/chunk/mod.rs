//! Chunk-shaped views of a single series.
//!
//! A [`Chunk`] is an opaque, immutable run of encoded samples bounded by its
//! inclusive `[min_time, max_time]`. Chunk sources are exposed through the
//! pull-based [`ChunkIterator`] capability; the physical encoding is owned by a
//! [`ChunkCodec`].

mod codec;
mod error;
mod plain;

use bytes::Bytes;
pub use codec::{ChunkCodec, ChunkEncoder};
pub(crate) use error::join_errors;
pub use error::{CodecError, SourceError};
pub use plain::PlainCodec;

use crate::series::Labels;

/// Immutable unit of a series' encoded samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    min_time: i64,
    max_time: i64,
    payload: Bytes,
}

impl Chunk {
    /// Wrap an encoded payload covering `[min_time, max_time]`.
    pub fn new(min_time: i64, max_time: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            min_time,
            max_time,
            payload: payload.into(),
        }
    }

    /// Inclusive lower timestamp bound.
    pub fn min_time(&self) -> i64 {
        self.min_time
    }

    /// Inclusive upper timestamp bound.
    pub fn max_time(&self) -> i64 {
        self.max_time
    }

    /// Encoded sample bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// `min_time <= max_time`.
    pub fn is_well_formed(&self) -> bool {
        self.min_time <= self.max_time
    }

    /// Same bounds and byte-identical payload.
    ///
    /// This is the only comparison that allows dropping a chunk without decoding it.
    pub fn is_identical(&self, other: &Chunk) -> bool {
        self.min_time == other.min_time
            && self.max_time == other.max_time
            && self.payload == other.payload
    }

    /// Whether the inclusive time ranges of both chunks intersect.
    pub fn overlaps(&self, other: &Chunk) -> bool {
        self.min_time <= other.max_time && other.min_time <= self.max_time
    }
}

/// Forward-only, single-pass sequence of chunks of one series, ascending by `min_time`.
///
/// Iteration ends either because the source is exhausted or because it failed;
/// callers tell the two apart with [`ChunkIterator::take_error`] once `next`
/// returned `None`.
pub trait ChunkIterator: Iterator<Item = Chunk> {
    /// Error that terminated iteration, if any.
    fn take_error(&mut self) -> Option<SourceError>;
}

/// Boxed chunk iterator that can be handed to another worker thread.
pub type BoxChunkIterator = Box<dyn ChunkIterator + Send>;

impl<I: ChunkIterator + ?Sized> ChunkIterator for Box<I> {
    fn take_error(&mut self) -> Option<SourceError> {
        (**self).take_error()
    }
}

/// In-memory chunk iterator that never fails.
#[derive(Debug, Default)]
pub struct VecChunkIterator {
    inner: std::vec::IntoIter<Chunk>,
}

impl VecChunkIterator {
    /// Iterate over `chunks` in the order given.
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            inner: chunks.into_iter(),
        }
    }
}

impl Iterator for VecChunkIterator {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        self.inner.next()
    }
}

impl ChunkIterator for VecChunkIterator {
    fn take_error(&mut self) -> Option<SourceError> {
        None
    }
}

/// A labelled chunk sequence read from one block.
pub struct ChunkSeries {
    labels: Labels,
    chunks: BoxChunkIterator,
}

impl ChunkSeries {
    /// Pair `labels` with a chunk source.
    pub fn new(labels: Labels, chunks: BoxChunkIterator) -> Self {
        Self { labels, chunks }
    }

    /// Chunk series backed by an in-memory chunk list.
    pub fn from_chunks(labels: Labels, chunks: Vec<Chunk>) -> Self {
        Self::new(labels, Box::new(VecChunkIterator::new(chunks)))
    }

    /// Labels of the series.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Split into labels and chunk source.
    pub fn into_parts(self) -> (Labels, BoxChunkIterator) {
        (self.labels, self.chunks)
    }
}

impl std::fmt::Debug for ChunkSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSeries")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}
