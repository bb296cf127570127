use thiserror::Error;

/// Errors raised while encoding or decoding a chunk payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload is too short or not a whole number of samples.
    #[error("chunk payload of {len} bytes is not a valid sample run")]
    InvalidLength {
        /// Length of the rejected payload.
        len: usize,
    },
    /// Stored checksum does not match the sample bytes.
    #[error("chunk payload crc32 mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum recorded in the payload trailer.
        expected: u32,
        /// Checksum computed over the sample bytes.
        actual: u32,
    },
    /// Samples must be appended with strictly increasing timestamps.
    #[error("sample at {next} appended after sample at {previous}")]
    OutOfOrder {
        /// Timestamp of the last accepted sample.
        previous: i64,
        /// Timestamp of the rejected sample.
        next: i64,
    },
    /// The encoder refused a sample even though its current chunk was empty.
    #[error("encoder rejected sample at {timestamp} into an empty chunk")]
    SampleRejected {
        /// Timestamp of the rejected sample.
        timestamp: i64,
    },
}

/// Failure reported by a chunk or sample source once it stops yielding items.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading the underlying block failed.
    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),
    /// A chunk payload could not be encoded or decoded.
    #[error("source codec error: {0}")]
    Codec(#[from] CodecError),
    /// A chunk declared `min_time > max_time`.
    #[error("malformed chunk: min_time {min_time} is after max_time {max_time}")]
    MalformedChunk {
        /// Declared lower bound.
        min_time: i64,
        /// Declared upper bound.
        max_time: i64,
    },
    /// Iteration stopped because the caller cancelled the operation.
    #[error("source iteration cancelled")]
    Cancelled,
    /// Several inputs of a combined source failed.
    #[error("{} sources failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<SourceError>),
}

impl SourceError {
    /// Collapse a list of failures into at most one error.
    pub fn aggregate(mut errors: Vec<SourceError>) -> Option<SourceError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(SourceError::Multiple(errors)),
        }
    }
}

pub(crate) fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
