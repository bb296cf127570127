//! Reference sample merger: k-way merge by timestamp with duplicate collapsing.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use super::SampleMerger;
use crate::{
    chunk::SourceError,
    series::{BoxSampleIterator, Labels, Sample, SampleIterator, Series},
};

/// Merges overlapping sample sequences of one series into a single ordered sequence.
///
/// Samples sharing a timestamp collapse to one; the sample of the earliest
/// input wins. A sample present in only one input is always kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChainSampleMerger;

impl SampleMerger for ChainSampleMerger {
    fn merge(&self, series: Vec<Series>) -> Series {
        let labels = series
            .first()
            .map(|s| s.labels().clone())
            .unwrap_or_else(Labels::empty);
        let inputs = series.into_iter().map(Series::into_samples).collect();
        Series::new(labels, Box::new(ChainSampleIterator::new(inputs)))
    }
}

struct ChainSampleIterator {
    inputs: Vec<BoxSampleIterator>,
    heads: BinaryHeap<Reverse<SampleHead>>,
    primed: bool,
    last: Option<i64>,
}

impl ChainSampleIterator {
    fn new(inputs: Vec<BoxSampleIterator>) -> Self {
        let heads = BinaryHeap::with_capacity(inputs.len());
        Self {
            inputs,
            heads,
            primed: false,
            last: None,
        }
    }

    fn pull(&mut self, input: usize) {
        if let Some(sample) = self.inputs[input].next() {
            self.heads.push(Reverse(SampleHead { input, sample }));
        }
    }
}

impl Iterator for ChainSampleIterator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if !self.primed {
            self.primed = true;
            for input in 0..self.inputs.len() {
                self.pull(input);
            }
        }
        while let Some(Reverse(head)) = self.heads.pop() {
            self.pull(head.input);
            if self.last == Some(head.sample.t) {
                continue;
            }
            self.last = Some(head.sample.t);
            return Some(head.sample);
        }
        None
    }
}

impl SampleIterator for ChainSampleIterator {
    fn take_error(&mut self) -> Option<SourceError> {
        SourceError::aggregate(
            self.inputs
                .iter_mut()
                .filter_map(|input| input.take_error())
                .collect(),
        )
    }
}

struct SampleHead {
    input: usize,
    sample: Sample,
}

impl Ord for SampleHead {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sample
            .t
            .cmp(&other.sample.t)
            .then(self.input.cmp(&other.input))
    }
}

impl PartialOrd for SampleHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SampleHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SampleHead {}
