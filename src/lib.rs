#![deny(missing_docs)]
//! Compaction-time merge engine for time-series blocks.
//!
//! Two pieces cooperate when several blocks are compacted together:
//!
//! - [`planner::GroupPlanner`] decides whether a group of blocks may be
//!   compacted at all: it skips groups containing a block marked
//!   non-compactable and rejects groups that exceed the largest configured
//!   compaction range.
//! - [`merge::VerticalChunkSeriesMerger`] combines the chunk sequences one
//!   series has in each block into a single ordered, non-overlapping,
//!   deduplicated sequence, delegating genuine overlaps to a pluggable
//!   [`merge::SampleMerger`].

/// Chunk-shaped series views and the chunk encoding capability.
pub mod chunk;

/// Block identifiers.
pub mod id;

/// Vertical chunk-series merging.
pub mod merge;

/// Logging macros shared by every subsystem.
mod observability;

/// Merge tuning options.
pub mod option;

/// Compaction group guard.
pub mod planner;

/// Sample-shaped series views.
pub mod series;

#[cfg(test)]
mod test_support;

pub use crate::{
    chunk::{Chunk, ChunkCodec, ChunkIterator, ChunkSeries, PlainCodec, SourceError},
    id::BlockId,
    merge::{
        ChainSampleMerger, MergeError, MergedChunkSeries, SampleMerger, VerticalChunkSeriesMerger,
    },
    option::MergeOptions,
    planner::{BlockMeta, CompactionRanges, GroupPlanner, PlanError, PlanOutcome},
    series::{Labels, Sample, SampleIterator, Series},
};
