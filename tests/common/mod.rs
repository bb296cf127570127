//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tsmerge::{
    Chunk, ChunkCodec, ChunkSeries, Labels, PlainCodec, Sample, SampleMerger,
    VerticalChunkSeriesMerger,
};

/// Route `tsmerge` events to the test writer when `RUST_LOG` asks for them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Labels used by every scenario series.
pub fn series_labels() -> Labels {
    Labels::from_pairs([("__name__", "http_requests_total"), ("job", "api")])
}

/// Encode `samples` as one plain chunk regardless of its length.
pub fn chunk_of(samples: &[Sample]) -> Chunk {
    PlainCodec::with_samples_per_chunk(usize::MAX)
        .encode_samples(samples.iter().copied())
        .expect("samples should encode")
        .remove(0)
}

/// Labelled chunk series over `chunks`.
pub fn chunk_series(chunks: Vec<Chunk>) -> ChunkSeries {
    ChunkSeries::from_chunks(series_labels(), chunks)
}

/// Merger backed by the plain codec.
pub fn plain_merger(sample_merger: Arc<dyn SampleMerger>) -> VerticalChunkSeriesMerger {
    VerticalChunkSeriesMerger::new(sample_merger, Arc::new(PlainCodec::new()))
}

/// Decode every chunk with the plain codec.
pub fn decode_all(chunks: &[Chunk]) -> Vec<Sample> {
    let codec = PlainCodec::new();
    chunks.iter().flat_map(|chunk| codec.decode(chunk)).collect()
}

/// Assert the chunks are ordered by `min_time` and never overlap.
pub fn assert_ordered_and_disjoint(chunks: &[Chunk]) {
    for pair in chunks.windows(2) {
        assert!(
            pair[0].max_time() < pair[1].min_time(),
            "chunks [{}, {}] and [{}, {}] overlap or are out of order",
            pair[0].min_time(),
            pair[0].max_time(),
            pair[1].min_time(),
            pair[1].max_time(),
        );
    }
}
