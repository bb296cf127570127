//! Read side of the non-compactable block markers.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use crate::id::BlockId;

/// Snapshot of the blocks currently excluded from compaction.
pub type NoCompactMarks = HashMap<BlockId, NoCompactMark>;

/// Why a block was excluded from compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoCompactReason {
    /// Excluded by an operator.
    Manual,
    /// Compacting the block would produce an oversized index.
    IndexSizeExceeding,
    /// The block contains out-of-order chunks.
    OutOfOrderChunks,
}

impl fmt::Display for NoCompactReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            NoCompactReason::Manual => "manual",
            NoCompactReason::IndexSizeExceeding => "index-size-exceeding",
            NoCompactReason::OutOfOrderChunks => "block-index-out-of-order-chunk",
        };
        f.write_str(reason)
    }
}

/// Marker excluding a block from compaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoCompactMark {
    /// Marked block.
    pub block: BlockId,
    /// Why the block was marked.
    pub reason: NoCompactReason,
    /// Free-form details recorded with the marker.
    pub details: String,
    /// When the marker was applied, in unix seconds.
    pub no_compact_time: i64,
}

impl NoCompactMark {
    /// Marker for `block` with no details.
    pub fn new(block: BlockId, reason: NoCompactReason) -> Self {
        Self {
            block,
            reason,
            details: String::new(),
            no_compact_time: 0,
        }
    }

    /// Attach free-form details.
    pub fn with_details(self, details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            ..self
        }
    }

    /// Record when the marker was applied.
    pub fn with_time(self, no_compact_time: i64) -> Self {
        Self {
            no_compact_time,
            ..self
        }
    }
}

/// Provides the current set of non-compactable blocks.
///
/// Snapshots may lag the external marker store by one refresh interval; the
/// planner takes exactly one snapshot per planning call.
pub trait NoCompactMarkSource: Send + Sync {
    /// Immutable view of the currently marked blocks.
    fn snapshot(&self) -> Arc<NoCompactMarks>;
}

impl<S: NoCompactMarkSource + ?Sized> NoCompactMarkSource for Arc<S> {
    fn snapshot(&self) -> Arc<NoCompactMarks> {
        (**self).snapshot()
    }
}

/// In-process marker set refreshed wholesale by an external poller.
///
/// Readers always see a complete map: [`replace`](Self::replace) swaps the
/// snapshot and never mutates one that has already been handed out.
#[derive(Debug, Default)]
pub struct SharedNoCompactMarks {
    current: RwLock<Arc<NoCompactMarks>>,
}

impl SharedNoCompactMarks {
    /// Empty marker set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker set starting from `marks`.
    pub fn from_marks(marks: impl IntoIterator<Item = NoCompactMark>) -> Self {
        let marks = marks.into_iter().map(|mark| (mark.block, mark)).collect();
        Self {
            current: RwLock::new(Arc::new(marks)),
        }
    }

    /// Publish a freshly loaded marker set.
    pub fn replace(&self, marks: impl IntoIterator<Item = NoCompactMark>) {
        let marks: NoCompactMarks = marks.into_iter().map(|mark| (mark.block, mark)).collect();
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(marks);
    }
}

impl NoCompactMarkSource for SharedNoCompactMarks {
    fn snapshot(&self) -> Arc<NoCompactMarks> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }
}
