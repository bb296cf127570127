use thiserror::Error;

use crate::id::BlockId;

/// Errors returned while validating a compaction group.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A block lies outside the largest configured compaction range. Points at
    /// a grouping bug upstream; never retried or corrected here.
    #[error(
        "block {block} with time range {min_time}:{max_time} is outside the largest expected \
         range {range_start}:{range_end}"
    )]
    OutOfRange {
        /// Offending block.
        block: BlockId,
        /// Lower bound of the block.
        min_time: i64,
        /// Upper bound of the block.
        max_time: i64,
        /// Start of the expected range.
        range_start: i64,
        /// End of the expected range.
        range_end: i64,
    },
    /// The group to plan contained no block.
    #[error("compaction group is empty")]
    EmptyGroup,
    /// The caller cancelled planning.
    #[error("compaction planning cancelled")]
    Cancelled,
}

/// Invalid compaction range configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangesError {
    /// No range configured.
    #[error("at least one compaction range is required")]
    Empty,
    /// A range length is zero or negative.
    #[error("compaction range {0} must be positive")]
    NonPositive(i64),
    /// Ranges are not strictly ascending.
    #[error("compaction range {next} follows {previous}; ranges must be strictly ascending")]
    NotAscending {
        /// Preceding range length.
        previous: i64,
        /// Range length that broke the order.
        next: i64,
    },
}
