//! Compaction group guard.
//!
//! Upstream grouping decides which blocks belong together; the planner here is
//! a validating pass-through that either approves a group unchanged, skips it
//! because a member is marked non-compactable, or rejects it because a member
//! falls outside the largest configured compaction range.

mod error;
mod markers;
mod ranges;

use std::collections::HashMap;

pub use error::{PlanError, RangesError};
pub use markers::{
    NoCompactMark, NoCompactMarkSource, NoCompactMarks, NoCompactReason, SharedNoCompactMarks,
};
pub use ranges::{align_range_start, CompactionRanges};
use tokio_util::sync::CancellationToken;

use crate::{
    id::BlockId,
    observability::{log_debug, log_info, log_warn},
};

/// Identity and time bounds of one on-disk block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMeta {
    /// Block identifier.
    pub id: BlockId,
    /// Inclusive lower timestamp bound.
    pub min_time: i64,
    /// Upper timestamp bound.
    pub max_time: i64,
}

impl BlockMeta {
    /// Describe block `id` covering `[min_time, max_time]`.
    pub fn new(id: BlockId, min_time: i64, max_time: i64) -> Self {
        Self {
            id,
            min_time,
            max_time,
        }
    }
}

/// Decision reached for a compaction group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Every block may be compacted; blocks are returned unchanged and in order.
    Approved(Vec<BlockMeta>),
    /// A member is marked non-compactable, so the whole group sits out this cycle.
    Skipped {
        /// First marked block found in the group.
        excluded: BlockId,
    },
}

impl PlanOutcome {
    /// Blocks to compact; empty when the group was skipped.
    pub fn blocks(&self) -> &[BlockMeta] {
        match self {
            PlanOutcome::Approved(blocks) => blocks,
            PlanOutcome::Skipped { .. } => &[],
        }
    }

    /// Consume the outcome, keeping only the blocks to compact.
    pub fn into_blocks(self) -> Vec<BlockMeta> {
        match self {
            PlanOutcome::Approved(blocks) => blocks,
            PlanOutcome::Skipped { .. } => Vec::new(),
        }
    }
}

/// Validates compaction groups against the largest range and the marker set.
///
/// Holds no mutable state; safe to call concurrently for independent groups.
#[derive(Debug)]
pub struct GroupPlanner<S> {
    ranges: CompactionRanges,
    marks: S,
}

impl<S> GroupPlanner<S>
where
    S: NoCompactMarkSource,
{
    /// Planner bounded by `ranges` that consults `marks` on every call.
    pub fn new(ranges: CompactionRanges, marks: S) -> Self {
        Self { ranges, marks }
    }

    /// Configured compaction ranges.
    pub fn ranges(&self) -> &CompactionRanges {
        &self.ranges
    }

    /// Plan a group of blocks sorted ascending by `min_time`.
    ///
    /// Takes one fresh marker snapshot per call, so a marker applied between
    /// calls is honored on the next one.
    pub fn plan(
        &self,
        cancel: &CancellationToken,
        blocks: Vec<BlockMeta>,
    ) -> Result<PlanOutcome, PlanError> {
        if cancel.is_cancelled() {
            return Err(PlanError::Cancelled);
        }
        let marks = self.marks.snapshot();
        self.plan_with_marks(blocks, &marks)
    }

    /// Plan a group against an explicit marker snapshot.
    pub fn plan_with_marks(
        &self,
        blocks: Vec<BlockMeta>,
        marks: &HashMap<BlockId, NoCompactMark>,
    ) -> Result<PlanOutcome, PlanError> {
        let Some(first) = blocks.first() else {
            return Err(PlanError::EmptyGroup);
        };
        let largest = self.ranges.largest();
        let range_start = align_range_start(first.min_time, largest);
        let range_end = range_start.saturating_add(largest);

        for block in &blocks {
            if let Some(mark) = marks.get(&block.id) {
                log_info!(
                    component = "planner",
                    event = "compaction_group_excluded",
                    block = %block.id,
                    reason = %mark.reason,
                    group_size = blocks.len(),
                );
                return Ok(PlanOutcome::Skipped { excluded: block.id });
            }
            if block.min_time < range_start || block.max_time > range_end {
                log_warn!(
                    component = "planner",
                    event = "compaction_group_out_of_range",
                    block = %block.id,
                    min_time = block.min_time,
                    max_time = block.max_time,
                    range_start,
                    range_end,
                );
                return Err(PlanError::OutOfRange {
                    block: block.id,
                    min_time: block.min_time,
                    max_time: block.max_time,
                    range_start,
                    range_end,
                });
            }
        }
        log_debug!(
            component = "planner",
            event = "compaction_group_approved",
            group_size = blocks.len(),
            range_start,
            range_end,
        );
        Ok(PlanOutcome::Approved(blocks))
    }
}
