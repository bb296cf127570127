//! Test-only utilities (compiled under `cfg(test)` only).

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    chunk::{Chunk, ChunkIterator, PlainCodec, SourceError, VecChunkIterator},
    merge::{ChainSampleMerger, SampleMerger},
    series::{Labels, Sample, Series},
};

/// Samples with the given timestamps, valued `t * 10`.
pub(crate) fn samples_at(ts: &[i64]) -> Vec<Sample> {
    ts.iter().map(|&t| Sample::new(t, t as f64 * 10.0)).collect()
}

/// Encode `samples` as a single plain chunk.
pub(crate) fn plain_chunk(samples: &[Sample]) -> Chunk {
    PlainCodec::with_samples_per_chunk(usize::MAX)
        .encode_samples(samples.iter().copied())
        .expect("encode chunk")
        .remove(0)
}

/// Chunk source that yields its chunks and then reports `error`.
pub(crate) struct FailingChunkIterator {
    chunks: VecChunkIterator,
    error: Option<SourceError>,
}

impl FailingChunkIterator {
    pub(crate) fn new(chunks: Vec<Chunk>, error: SourceError) -> Self {
        Self {
            chunks: VecChunkIterator::new(chunks),
            error: Some(error),
        }
    }
}

impl Iterator for FailingChunkIterator {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        self.chunks.next()
    }
}

impl ChunkIterator for FailingChunkIterator {
    fn take_error(&mut self) -> Option<SourceError> {
        self.error.take()
    }
}

/// Chain merger that counts how often it was invoked.
#[derive(Default)]
pub(crate) struct CountingMerger {
    calls: AtomicUsize,
}

impl CountingMerger {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SampleMerger for CountingMerger {
    fn merge(&self, series: Vec<Series>) -> Series {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ChainSampleMerger.merge(series)
    }
}

/// Merger that violates its contract by dropping every sample.
pub(crate) struct DroppingMerger;

impl SampleMerger for DroppingMerger {
    fn merge(&self, _series: Vec<Series>) -> Series {
        Series::from_samples(Labels::empty(), Vec::new())
    }
}

/// Chain merger that appends one extra sample `offset` after the merged run,
/// so its output reaches past the overlap it resolved.
pub(crate) struct TrailingSampleMerger {
    offset: i64,
    calls: AtomicUsize,
}

impl TrailingSampleMerger {
    pub(crate) fn new(offset: i64) -> Self {
        Self {
            offset,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SampleMerger for TrailingSampleMerger {
    fn merge(&self, series: Vec<Series>) -> Series {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut samples: Vec<Sample> = ChainSampleMerger.merge(series).into_samples().collect();
        if let Some(last) = samples.last().copied() {
            samples.push(Sample::new(last.t + self.offset, last.v));
        }
        Series::from_samples(Labels::empty(), samples)
    }
}
