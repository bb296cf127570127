//! Adapters between the chunk-shaped merge engine and sample-shaped mergers.

use tokio_util::sync::CancellationToken;

use crate::{
    chunk::{Chunk, ChunkCodec, ChunkEncoder, ChunkIterator, CodecError, SourceError},
    series::{BoxSampleIterator, Labels, Sample, Series},
};

/// Decode view of a single chunk. Labels do not matter to sample mergers.
pub(crate) fn chunk_to_series(codec: &dyn ChunkCodec, chunk: &Chunk) -> Series {
    Series::new(Labels::empty(), codec.decode(chunk))
}

/// Encode view: re-encodes a sample sequence into chunks on demand.
pub(crate) struct SeriesToChunkEncoder {
    samples: BoxSampleIterator,
    encoder: Box<dyn ChunkEncoder>,
    pending: Option<Sample>,
    cancel: CancellationToken,
    cancel_check_interval: usize,
    pulled: usize,
    done: bool,
    error: Option<SourceError>,
}

impl SeriesToChunkEncoder {
    pub(crate) fn new(
        samples: BoxSampleIterator,
        encoder: Box<dyn ChunkEncoder>,
        cancel: CancellationToken,
        cancel_check_interval: usize,
    ) -> Self {
        Self {
            samples,
            encoder,
            pending: None,
            cancel,
            cancel_check_interval: cancel_check_interval.max(1),
            pulled: 0,
            done: false,
            error: None,
        }
    }

    fn fail(&mut self, error: SourceError) -> Option<Chunk> {
        self.done = true;
        self.error = Some(error);
        None
    }

    fn next_sample(&mut self) -> Option<Sample> {
        if let Some(sample) = self.pending.take() {
            return Some(sample);
        }
        let sample = self.samples.next()?;
        self.pulled += 1;
        Some(sample)
    }
}

impl Iterator for SeriesToChunkEncoder {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        loop {
            let Some(sample) = self.next_sample() else {
                self.done = true;
                if let Some(err) = self.samples.take_error() {
                    return self.fail(err);
                }
                return self.encoder.cut();
            };
            if self.pulled % self.cancel_check_interval == 0 && self.cancel.is_cancelled() {
                return self.fail(SourceError::Cancelled);
            }
            match self.encoder.append(sample) {
                Ok(true) => {}
                Ok(false) if self.encoder.is_empty() => {
                    return self.fail(CodecError::SampleRejected {
                        timestamp: sample.t,
                    }
                    .into());
                }
                Ok(false) => {
                    self.pending = Some(sample);
                    return self.encoder.cut();
                }
                Err(err) => return self.fail(err.into()),
            }
        }
    }
}

impl ChunkIterator for SeriesToChunkEncoder {
    fn take_error(&mut self) -> Option<SourceError> {
        self.error.take()
    }
}
