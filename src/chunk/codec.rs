use super::{Chunk, CodecError};
use crate::series::{BoxSampleIterator, Sample};

/// Incremental chunk builder. The encoder owns the chunk-size and splitting policy.
pub trait ChunkEncoder: Send {
    /// Append a sample to the chunk under construction.
    ///
    /// Returns `Ok(false)` without taking the sample when the current chunk is
    /// full; the caller should [`cut`](ChunkEncoder::cut) and retry.
    fn append(&mut self, sample: Sample) -> Result<bool, CodecError>;

    /// Returns `true` when no sample is buffered.
    fn is_empty(&self) -> bool;

    /// Seal the buffered samples into a chunk and start a new one.
    fn cut(&mut self) -> Option<Chunk>;
}

/// Physical chunk encoding.
pub trait ChunkCodec: Send + Sync {
    /// Lazily decode the samples of `chunk`.
    ///
    /// Decoding failures surface through the returned iterator's `take_error`.
    fn decode(&self, chunk: &Chunk) -> BoxSampleIterator;

    /// Fresh encoder for building new chunks.
    fn encoder(&self) -> Box<dyn ChunkEncoder>;
}
