//! Uncompressed reference chunk encoding.
//!
//! Payload layout: `N × (timestamp: i64 LE, value: f64 bits LE)` followed by a
//! little-endian crc32 of the sample bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Chunk, ChunkCodec, ChunkEncoder, CodecError, SourceError};
use crate::series::{BoxSampleIterator, Sample, SampleIterator};

const SAMPLE_WIDTH: usize = 16;
const CHECKSUM_WIDTH: usize = 4;
/// Samples per chunk used by Prometheus-style heads.
const DEFAULT_SAMPLES_PER_CHUNK: usize = 120;

/// Fixed-width sample codec with a crc32 trailer.
#[derive(Clone, Copy, Debug)]
pub struct PlainCodec {
    samples_per_chunk: usize,
}

impl PlainCodec {
    /// Codec cutting a chunk every 120 samples.
    pub fn new() -> Self {
        Self {
            samples_per_chunk: DEFAULT_SAMPLES_PER_CHUNK,
        }
    }

    /// Codec cutting a chunk every `samples_per_chunk` samples (at least one).
    pub fn with_samples_per_chunk(samples_per_chunk: usize) -> Self {
        Self {
            samples_per_chunk: samples_per_chunk.max(1),
        }
    }

    /// Maximum number of samples written into one chunk.
    pub fn samples_per_chunk(&self) -> usize {
        self.samples_per_chunk
    }

    /// Encode an ordered sample run, splitting it per the chunk-size policy.
    pub fn encode_samples(
        &self,
        samples: impl IntoIterator<Item = Sample>,
    ) -> Result<Vec<Chunk>, CodecError> {
        let mut encoder = PlainEncoder::new(self.samples_per_chunk);
        let mut chunks = Vec::new();
        for sample in samples {
            if !encoder.append(sample)? {
                chunks.extend(encoder.cut());
                if !encoder.append(sample)? {
                    return Err(CodecError::SampleRejected {
                        timestamp: sample.t,
                    });
                }
            }
        }
        chunks.extend(encoder.cut());
        Ok(chunks)
    }
}

impl Default for PlainCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkCodec for PlainCodec {
    fn decode(&self, chunk: &Chunk) -> BoxSampleIterator {
        Box::new(PlainSampleIterator::new(chunk.payload().clone()))
    }

    fn encoder(&self) -> Box<dyn ChunkEncoder> {
        Box::new(PlainEncoder::new(self.samples_per_chunk))
    }
}

struct PlainEncoder {
    samples_per_chunk: usize,
    buf: BytesMut,
    count: usize,
    min_time: i64,
    max_time: i64,
    last: Option<i64>,
}

impl PlainEncoder {
    fn new(samples_per_chunk: usize) -> Self {
        Self {
            samples_per_chunk,
            buf: BytesMut::new(),
            count: 0,
            min_time: 0,
            max_time: 0,
            last: None,
        }
    }
}

impl ChunkEncoder for PlainEncoder {
    fn append(&mut self, sample: Sample) -> Result<bool, CodecError> {
        if let Some(previous) = self.last {
            if sample.t <= previous {
                return Err(CodecError::OutOfOrder {
                    previous,
                    next: sample.t,
                });
            }
        }
        if self.count >= self.samples_per_chunk {
            return Ok(false);
        }
        if self.count == 0 {
            self.min_time = sample.t;
            self.buf
                .reserve(self.samples_per_chunk.min(1024) * SAMPLE_WIDTH + CHECKSUM_WIDTH);
        }
        self.buf.put_i64_le(sample.t);
        self.buf.put_u64_le(sample.v.to_bits());
        self.max_time = sample.t;
        self.count += 1;
        self.last = Some(sample.t);
        Ok(true)
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn cut(&mut self) -> Option<Chunk> {
        if self.count == 0 {
            return None;
        }
        let crc = crc32fast::hash(&self.buf);
        self.buf.put_u32_le(crc);
        self.count = 0;
        Some(Chunk::new(
            self.min_time,
            self.max_time,
            self.buf.split().freeze(),
        ))
    }
}

enum DecodeState {
    Unchecked,
    Valid,
    Failed,
}

/// Lazy decoder: the payload is validated on the first pull, not on construction.
struct PlainSampleIterator {
    payload: Bytes,
    offset: usize,
    end: usize,
    state: DecodeState,
    error: Option<SourceError>,
}

impl PlainSampleIterator {
    fn new(payload: Bytes) -> Self {
        Self {
            payload,
            offset: 0,
            end: 0,
            state: DecodeState::Unchecked,
            error: None,
        }
    }

    fn validate(&mut self) -> Result<(), CodecError> {
        let len = self.payload.len();
        if len < CHECKSUM_WIDTH || (len - CHECKSUM_WIDTH) % SAMPLE_WIDTH != 0 {
            return Err(CodecError::InvalidLength { len });
        }
        let end = len - CHECKSUM_WIDTH;
        let mut trailer = &self.payload[end..];
        let expected = trailer.get_u32_le();
        let actual = crc32fast::hash(&self.payload[..end]);
        if expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }
        self.end = end;
        Ok(())
    }
}

impl Iterator for PlainSampleIterator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        match self.state {
            DecodeState::Failed => return None,
            DecodeState::Unchecked => match self.validate() {
                Ok(()) => self.state = DecodeState::Valid,
                Err(err) => {
                    self.state = DecodeState::Failed;
                    self.error = Some(err.into());
                    return None;
                }
            },
            DecodeState::Valid => {}
        }
        if self.offset >= self.end {
            return None;
        }
        let mut cursor = &self.payload[self.offset..self.offset + SAMPLE_WIDTH];
        self.offset += SAMPLE_WIDTH;
        let t = cursor.get_i64_le();
        let v = f64::from_bits(cursor.get_u64_le());
        Some(Sample { t, v })
    }
}

impl SampleIterator for PlainSampleIterator {
    fn take_error(&mut self) -> Option<SourceError> {
        self.error.take()
    }
}
