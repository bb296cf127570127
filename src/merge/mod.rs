//! Vertical merging of chunk sequences that belong to the same series.
//!
//! [`VerticalChunkSeriesMerger`] drives a heap over one chunk source per block
//! and only falls back to sample-level merging, through a pluggable
//! [`SampleMerger`], when chunks genuinely overlap.

mod adapter;
mod chain;
mod error;
mod heap;
mod vertical;

pub use chain::ChainSampleMerger;
pub use error::MergeError;
pub use vertical::{MergedChunkSeries, VerticalChunkSeriesMerger};

use crate::series::Series;

/// Sample-level conflict resolution for overlapping sequences of one series.
///
/// Implementations must keep timestamp order, collapse identical samples and
/// never drop a sample that appears in exactly one input.
pub trait SampleMerger: Send + Sync {
    /// Merge `series` into a single sample sequence.
    fn merge(&self, series: Vec<Series>) -> Series;
}
