use thiserror::Error;

use crate::{
    chunk::{join_errors, SourceError},
    series::Labels,
};

/// Errors surfaced by a vertical chunk merge once iteration stopped.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An input chunk source failed or produced a malformed chunk.
    #[error("chunk source {source_index} failed: {error}")]
    Source {
        /// Position of the failing input in the merge call.
        source_index: usize,
        /// Failure reported by the source.
        error: SourceError,
    },
    /// Decoding, merging or re-encoding an overlap failed.
    #[error("resolving overlap for series {labels} failed: {error}")]
    Resolution {
        /// Series being merged.
        labels: Labels,
        /// Underlying failure.
        error: SourceError,
    },
    /// Merging a non-empty overlap produced no chunk at all.
    #[error(
        "merging {inputs} overlapping chunks of series {labels} in [{min_time}, {max_time}] \
         produced no output chunk"
    )]
    InvariantViolation {
        /// Series being merged.
        labels: Labels,
        /// Lower bound of the overlap.
        min_time: i64,
        /// Upper bound of the overlap.
        max_time: i64,
        /// Number of chunks fed into the sample merger.
        inputs: usize,
    },
    /// The caller cancelled the merge.
    #[error("chunk merge cancelled")]
    Cancelled,
    /// Several of the above.
    #[error("{} merge errors: {}", .0.len(), join_errors(.0))]
    Multi(Vec<MergeError>),
}

impl MergeError {
    /// Collapse a list of failures into at most one error.
    pub fn aggregate(mut errors: Vec<MergeError>) -> Option<MergeError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(MergeError::Multi(errors)),
        }
    }

    /// Whether this error, or any error it aggregates, is an invariant violation.
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            MergeError::InvariantViolation { .. } => true,
            MergeError::Multi(errors) => errors.iter().any(MergeError::is_invariant_violation),
            _ => false,
        }
    }
}
