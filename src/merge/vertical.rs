//! Vertical merge of overlapping chunk sequences of one series.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{
    adapter::{chunk_to_series, SeriesToChunkEncoder},
    heap::ChunkFrontier,
    MergeError, SampleMerger,
};
use crate::{
    chunk::{BoxChunkIterator, Chunk, ChunkCodec, ChunkIterator, ChunkSeries, SourceError},
    observability::{log_debug, log_error},
    option::MergeOptions,
    series::Labels,
};

/// Combines chunk sequences of the same series read from different blocks.
///
/// Chunks that do not overlap pass through untouched and byte-identical
/// replicas are dropped without decoding. Only genuinely overlapping chunks
/// are decoded, merged by the [`SampleMerger`] and re-encoded by the
/// [`ChunkCodec`].
#[derive(Clone)]
pub struct VerticalChunkSeriesMerger {
    sample_merger: Arc<dyn SampleMerger>,
    codec: Arc<dyn ChunkCodec>,
    options: MergeOptions,
}

impl VerticalChunkSeriesMerger {
    /// Merger resolving overlaps with `sample_merger` and re-encoding with `codec`.
    pub fn new(sample_merger: Arc<dyn SampleMerger>, codec: Arc<dyn ChunkCodec>) -> Self {
        Self {
            sample_merger,
            codec,
            options: MergeOptions::default(),
        }
    }

    /// Replace the merge options.
    pub fn with_options(self, options: MergeOptions) -> Self {
        Self { options, ..self }
    }

    /// Lazily merge `series` into one chunk sequence.
    ///
    /// Nothing is read from the inputs until the result is iterated. The
    /// result carries the labels of the first input with non-empty labels; an
    /// empty input list yields an empty sequence.
    pub fn merge(&self, series: Vec<ChunkSeries>, cancel: CancellationToken) -> MergedChunkSeries {
        let labels = series
            .iter()
            .map(ChunkSeries::labels)
            .find(|labels| !labels.is_empty())
            .or_else(|| series.first().map(ChunkSeries::labels))
            .cloned()
            .unwrap_or_else(Labels::empty);
        let sources = series
            .into_iter()
            .map(|s| Some(s.into_parts().1))
            .collect::<Vec<_>>();
        MergedChunkSeries {
            chunks: CompactingChunkIterator {
                input_count: sources.len(),
                frontier: ChunkFrontier::with_capacity(sources.len()),
                sources,
                labels: labels.clone(),
                sample_merger: Arc::clone(&self.sample_merger),
                codec: Arc::clone(&self.codec),
                options: self.options.clone(),
                cancel,
                primed: false,
                halted: false,
                errors: Vec::new(),
                malformed: Vec::new(),
                error: None,
            },
            labels,
        }
    }
}

impl std::fmt::Debug for VerticalChunkSeriesMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerticalChunkSeriesMerger")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Output of [`VerticalChunkSeriesMerger::merge`]: ordered, non-overlapping
/// chunks of one series, consumed in a single forward pass.
pub struct MergedChunkSeries {
    labels: Labels,
    chunks: CompactingChunkIterator,
}

impl MergedChunkSeries {
    /// Labels of the merged series.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Errors observed while merging, meaningful once iteration returned `None`.
    ///
    /// Failures of several inputs are reported together as
    /// [`MergeError::Multi`]. Chunks yielded before a failure remain valid.
    pub fn take_error(&mut self) -> Option<MergeError> {
        self.chunks.take_error()
    }
}

impl Iterator for MergedChunkSeries {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        self.chunks.next()
    }
}

impl std::fmt::Debug for MergedChunkSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedChunkSeries")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Heap-driven k-way chunk merge.
///
/// Slots at index `>= input_count` hold re-encoded overlap results whose
/// remaining chunks were pushed back into the frontier. A slot is emptied as
/// soon as its source is exhausted; emptied resolution slots are reused.
struct CompactingChunkIterator {
    sources: Vec<Option<BoxChunkIterator>>,
    input_count: usize,
    frontier: ChunkFrontier,
    labels: Labels,
    sample_merger: Arc<dyn SampleMerger>,
    codec: Arc<dyn ChunkCodec>,
    options: MergeOptions,
    cancel: CancellationToken,
    primed: bool,
    halted: bool,
    /// Failures of exhausted sources, in the order they surfaced.
    errors: Vec<MergeError>,
    /// Malformed chunks seen so far, keyed by their claimed `min_time`.
    malformed: Vec<(i64, MergeError)>,
    error: Option<MergeError>,
}

impl CompactingChunkIterator {
    /// Move the next chunk of `source` into the frontier, releasing the
    /// source once it is exhausted.
    fn pull(&mut self, source: usize) {
        let Some(chunks) = self.sources[source].as_mut() else {
            return;
        };
        match chunks.next() {
            Some(chunk) if chunk.is_well_formed() => self.frontier.push(source, chunk),
            Some(chunk) => {
                let error = SourceError::MalformedChunk {
                    min_time: chunk.min_time(),
                    max_time: chunk.max_time(),
                };
                let error = self.source_error(source, error);
                self.malformed.push((chunk.min_time(), error));
            }
            None => {
                let error = self.sources[source]
                    .take()
                    .and_then(|mut chunks| chunks.take_error());
                if let Some(error) = error {
                    let error = self.source_error(source, error);
                    self.errors.push(error);
                }
            }
        }
    }

    /// Put a re-encoded overlap result into a free resolution slot.
    fn attach(&mut self, chunks: BoxChunkIterator) -> usize {
        let free =
            (self.input_count..self.sources.len()).find(|&slot| self.sources[slot].is_none());
        match free {
            Some(slot) => {
                self.sources[slot] = Some(chunks);
                slot
            }
            None => {
                self.sources.push(Some(chunks));
                self.sources.len() - 1
            }
        }
    }

    /// Lowest `min_time` claimed by a malformed chunk; output must end before it.
    fn malformed_from(&self) -> Option<i64> {
        self.malformed.iter().map(|(min_time, _)| *min_time).min()
    }

    fn stop_at_malformed(&mut self) -> Result<Option<Chunk>, MergeError> {
        self.errors.extend(self.malformed.drain(..).map(|(_, error)| error));
        Ok(None)
    }

    fn source_error(&self, source: usize, error: SourceError) -> MergeError {
        if source < self.input_count {
            MergeError::Source {
                source_index: source,
                error,
            }
        } else {
            self.resolution_error(error)
        }
    }

    fn resolution_error(&self, error: SourceError) -> MergeError {
        match error {
            SourceError::Cancelled => MergeError::Cancelled,
            error => MergeError::Resolution {
                labels: self.labels.clone(),
                error,
            },
        }
    }

    fn halt(&mut self, error: MergeError) -> Option<Chunk> {
        self.halted = true;
        self.error = Some(error);
        None
    }

    fn advance(&mut self) -> Result<Option<Chunk>, MergeError> {
        if self.cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        if !self.primed {
            self.primed = true;
            for source in 0..self.sources.len() {
                self.pull(source);
            }
        }
        if let Some(bound) = self.malformed_from() {
            if self
                .frontier
                .peek_min_time()
                .map_or(true, |min_time| min_time >= bound)
            {
                return self.stop_at_malformed();
            }
        }
        let Some((source, head)) = self.frontier.pop() else {
            return Ok(None);
        };
        self.pull(source);

        let mut max_time = head.max_time();
        let mut overlapping: Vec<Chunk> = Vec::new();
        let mut prev = head.clone();
        while let Some(min_time) = self.frontier.peek_min_time() {
            if min_time > max_time {
                break;
            }
            let Some((source, next)) = self.frontier.pop() else {
                break;
            };
            self.pull(source);
            if next.is_identical(&prev) {
                continue;
            }
            max_time = max_time.max(next.max_time());
            prev = next.clone();
            overlapping.push(next);
        }
        if let Some(bound) = self.malformed_from() {
            if max_time >= bound {
                return self.stop_at_malformed();
            }
        }
        if overlapping.is_empty() {
            return Ok(Some(head));
        }
        self.resolve(head, overlapping, max_time).map(Some)
    }

    /// Decode, merge and re-encode `head` with the chunks overlapping it.
    fn resolve(
        &mut self,
        head: Chunk,
        overlapping: Vec<Chunk>,
        max_time: i64,
    ) -> Result<Chunk, MergeError> {
        if self.cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        let min_time = head.min_time();
        let inputs = overlapping.len() + 1;
        let decoded = std::iter::once(&head)
            .chain(overlapping.iter())
            .map(|chunk| chunk_to_series(self.codec.as_ref(), chunk))
            .collect();
        let merged = self.sample_merger.merge(decoded);
        let mut encoded = SeriesToChunkEncoder::new(
            merged.into_samples(),
            self.codec.encoder(),
            self.cancel.clone(),
            self.options.cancel_check_interval,
        );
        let Some(first) = encoded.next() else {
            if let Some(error) = encoded.take_error() {
                return Err(self.resolution_error(error));
            }
            log_error!(
                component = "merge",
                event = "merge_invariant_violation",
                labels = %self.labels,
                min_time,
                max_time,
                inputs,
            );
            return Err(MergeError::InvariantViolation {
                labels: self.labels.clone(),
                min_time,
                max_time,
                inputs,
            });
        };
        log_debug!(
            component = "merge",
            event = "overlap_resolved",
            labels = %self.labels,
            inputs,
            min_time = first.min_time(),
            max_time = first.max_time(),
        );
        let slot = self.attach(Box::new(encoded));
        self.pull(slot);
        Ok(first)
    }

    fn take_error(&mut self) -> Option<MergeError> {
        let mut errors = std::mem::take(&mut self.errors);
        for source in 0..self.sources.len() {
            let error = self.sources[source]
                .as_mut()
                .and_then(|chunks| chunks.take_error());
            if let Some(error) = error {
                errors.push(self.source_error(source, error));
            }
        }
        errors.extend(self.malformed.drain(..).map(|(_, error)| error));
        errors.extend(self.error.take());
        MergeError::aggregate(errors)
    }

    #[cfg(test)]
    fn live_sources(&self) -> usize {
        self.sources.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Iterator for CompactingChunkIterator {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.halted {
            return None;
        }
        match self.advance() {
            Ok(Some(chunk)) => Some(chunk),
            Ok(None) => {
                self.halted = true;
                None
            }
            Err(error) => self.halt(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{
        chunk::{ChunkCodec, CodecError, PlainCodec},
        merge::ChainSampleMerger,
        series::Sample,
        test_support::{
            plain_chunk, samples_at, CountingMerger, DroppingMerger, FailingChunkIterator,
            TrailingSampleMerger,
        },
    };

    fn merger_with(sample_merger: Arc<dyn SampleMerger>) -> VerticalChunkSeriesMerger {
        VerticalChunkSeriesMerger::new(sample_merger, Arc::new(PlainCodec::new()))
    }

    fn unlabelled(chunks: Vec<Chunk>) -> ChunkSeries {
        ChunkSeries::from_chunks(Labels::empty(), chunks)
    }

    fn bounds(chunks: &[Chunk]) -> Vec<(i64, i64)> {
        chunks
            .iter()
            .map(|c| (c.min_time(), c.max_time()))
            .collect()
    }

    fn decode_all(chunks: &[Chunk]) -> Vec<Sample> {
        let codec = PlainCodec::new();
        chunks.iter().flat_map(|c| codec.decode(c)).collect()
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        let mut merged =
            merger_with(Arc::new(ChainSampleMerger)).merge(Vec::new(), CancellationToken::new());
        assert!(merged.labels().is_empty());
        assert!(merged.next().is_none());
        assert!(merged.take_error().is_none());
    }

    #[test]
    fn disjoint_chunks_pass_through_without_merging() {
        let counting = Arc::new(CountingMerger::default());
        let a = plain_chunk(&samples_at(&[0, 10]));
        let b = plain_chunk(&samples_at(&[20, 30]));
        let c = plain_chunk(&samples_at(&[40, 50]));
        let d = plain_chunk(&samples_at(&[60]));

        let merged: Vec<Chunk> = merger_with(counting.clone())
            .merge(
                vec![
                    unlabelled(vec![a.clone(), c.clone()]),
                    unlabelled(vec![b.clone(), d.clone()]),
                ],
                CancellationToken::new(),
            )
            .collect();
        assert_eq!(merged, vec![a, b, c, d]);
        assert_eq!(counting.calls(), 0);
    }

    #[test]
    fn identical_replicas_are_dropped_without_decoding() {
        let counting = Arc::new(CountingMerger::default());
        let replica = Chunk::new(100, 200, Bytes::from_static(b"bytes"));
        let merged: Vec<Chunk> = merger_with(counting.clone())
            .merge(
                vec![
                    unlabelled(vec![replica.clone()]),
                    unlabelled(vec![replica.clone()]),
                    unlabelled(vec![replica.clone()]),
                ],
                CancellationToken::new(),
            )
            .collect();
        assert_eq!(merged, vec![replica]);
        assert_eq!(counting.calls(), 0);
    }

    #[test]
    fn overlapping_chunks_are_merged_into_one() {
        let counting = Arc::new(CountingMerger::default());
        let a = plain_chunk(&samples_at(&[100, 150, 200, 250, 299]));
        let b = plain_chunk(&[
            Sample::new(200, -1.0),
            Sample::new(300, -2.0),
            Sample::new(399, -3.0),
        ]);
        let mut merged = merger_with(counting.clone()).merge(
            vec![unlabelled(vec![a]), unlabelled(vec![b])],
            CancellationToken::new(),
        );
        let chunks: Vec<Chunk> = merged.by_ref().collect();
        assert!(merged.take_error().is_none());
        assert_eq!(counting.calls(), 1);
        assert_eq!(bounds(&chunks), vec![(100, 399)]);
        let ts: Vec<i64> = decode_all(&chunks).iter().map(|s| s.t).collect();
        assert_eq!(ts, vec![100, 150, 200, 250, 299, 300, 399]);
    }

    #[test]
    fn overlap_chain_extends_running_max() {
        let a = plain_chunk(&samples_at(&[0, 10]));
        let b = plain_chunk(&samples_at(&[10, 20]));
        let c = plain_chunk(&samples_at(&[20, 30]));
        let d = plain_chunk(&samples_at(&[40]));
        let chunks: Vec<Chunk> = merger_with(Arc::new(ChainSampleMerger))
            .merge(
                vec![
                    unlabelled(vec![a, c]),
                    unlabelled(vec![b]),
                    unlabelled(vec![d.clone()]),
                ],
                CancellationToken::new(),
            )
            .collect();
        assert_eq!(bounds(&chunks), vec![(0, 30), (40, 40)]);
        assert_eq!(chunks[1], d);
    }

    #[test]
    fn leftover_encoded_chunks_are_pushed_back() {
        let merger = VerticalChunkSeriesMerger::new(
            Arc::new(ChainSampleMerger),
            Arc::new(PlainCodec::with_samples_per_chunk(2)),
        );
        let a = plain_chunk(&samples_at(&[0, 2, 4, 6]));
        let b = plain_chunk(&samples_at(&[1, 3, 5]));
        let c = plain_chunk(&samples_at(&[10, 11]));
        let mut merged = merger.merge(
            vec![unlabelled(vec![a, c.clone()]), unlabelled(vec![b])],
            CancellationToken::new(),
        );
        let chunks: Vec<Chunk> = merged.by_ref().collect();
        assert!(merged.take_error().is_none());
        assert_eq!(
            bounds(&chunks),
            vec![(0, 1), (2, 3), (4, 5), (6, 6), (10, 11)]
        );
        assert_eq!(chunks[4], c);
    }

    #[test]
    fn leftover_chunk_overlapping_later_input_is_merged_again() {
        let trailing = Arc::new(TrailingSampleMerger::new(5));
        let merger = VerticalChunkSeriesMerger::new(
            trailing.clone(),
            Arc::new(PlainCodec::with_samples_per_chunk(2)),
        );
        let a = plain_chunk(&samples_at(&[0, 2, 4, 6]));
        let b = plain_chunk(&samples_at(&[1, 3, 5]));
        let c = plain_chunk(&samples_at(&[8, 9]));
        let mut merged = merger.merge(
            vec![unlabelled(vec![a, c]), unlabelled(vec![b])],
            CancellationToken::new(),
        );
        let chunks: Vec<Chunk> = merged.by_ref().collect();
        assert!(merged.take_error().is_none());
        // The first resolution ends in a leftover [6, 11] that overlaps [8, 9].
        assert_eq!(trailing.calls(), 2);
        assert_eq!(
            bounds(&chunks),
            vec![(0, 1), (2, 3), (4, 5), (6, 8), (9, 11), (16, 16)]
        );
        let ts: Vec<i64> = decode_all(&chunks).iter().map(|s| s.t).collect();
        assert_eq!(ts, vec![0, 1, 2, 3, 4, 5, 6, 8, 9, 11, 16]);
    }

    #[test]
    fn labels_come_from_first_labelled_input() {
        let labels = Labels::from_pairs([("__name__", "up"), ("job", "api")]);
        let merged = merger_with(Arc::new(ChainSampleMerger)).merge(
            vec![
                unlabelled(Vec::new()),
                ChunkSeries::from_chunks(labels.clone(), Vec::new()),
            ],
            CancellationToken::new(),
        );
        assert_eq!(merged.labels(), &labels);
    }

    #[test]
    fn source_failures_are_aggregated_after_partial_output() {
        let a = plain_chunk(&samples_at(&[0]));
        let b = plain_chunk(&samples_at(&[10]));
        let c = plain_chunk(&samples_at(&[20]));
        let mut merged = merger_with(Arc::new(ChainSampleMerger)).merge(
            vec![
                ChunkSeries::new(
                    Labels::empty(),
                    Box::new(FailingChunkIterator::new(vec![a.clone()], SourceError::Cancelled)),
                ),
                unlabelled(vec![b.clone()]),
                ChunkSeries::new(
                    Labels::empty(),
                    Box::new(FailingChunkIterator::new(
                        vec![c.clone()],
                        SourceError::Io(std::io::Error::other("disk gone")),
                    )),
                ),
            ],
            CancellationToken::new(),
        );
        let chunks: Vec<Chunk> = merged.by_ref().collect();
        assert_eq!(chunks, vec![a, b, c]);
        match merged.take_error() {
            Some(MergeError::Multi(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(matches!(
                    errors[0],
                    MergeError::Source {
                        source_index: 0,
                        ..
                    }
                ));
                assert!(matches!(
                    errors[1],
                    MergeError::Source {
                        source_index: 2,
                        ..
                    }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn well_formed_head_is_emitted_before_malformed_chunk() {
        let good = plain_chunk(&samples_at(&[0]));
        let mut merged = merger_with(Arc::new(ChainSampleMerger)).merge(
            vec![unlabelled(vec![
                good.clone(),
                Chunk::new(50, 40, Bytes::new()),
            ])],
            CancellationToken::new(),
        );
        assert_eq!(merged.next(), Some(good));
        assert!(merged.next().is_none());
        assert!(matches!(
            merged.take_error(),
            Some(MergeError::Source {
                source_index: 0,
                error: SourceError::MalformedChunk {
                    min_time: 50,
                    max_time: 40
                }
            })
        ));
    }

    #[test]
    fn malformed_chunk_inside_pending_span_halts_before_output() {
        let good = plain_chunk(&samples_at(&[0]));
        let wide = plain_chunk(&samples_at(&[0, 60]));
        let mut merged = merger_with(Arc::new(ChainSampleMerger)).merge(
            vec![
                unlabelled(vec![good, Chunk::new(50, 40, Bytes::new())]),
                unlabelled(vec![wide]),
            ],
            CancellationToken::new(),
        );
        assert!(merged.next().is_none());
        assert!(matches!(
            merged.take_error(),
            Some(MergeError::Source {
                source_index: 0,
                error: SourceError::MalformedChunk { .. }
            })
        ));
    }

    #[test]
    fn exhausted_resolution_sources_are_released() {
        let pairs = 1_000;
        let a: Vec<Chunk> = (0..pairs)
            .map(|i| plain_chunk(&samples_at(&[i * 10, i * 10 + 5])))
            .collect();
        let b: Vec<Chunk> = (0..pairs)
            .map(|i| plain_chunk(&samples_at(&[i * 10 + 3, i * 10 + 8])))
            .collect();
        let mut merged = merger_with(Arc::new(ChainSampleMerger))
            .merge(vec![unlabelled(a), unlabelled(b)], CancellationToken::new());

        let mut count = 0;
        while let Some(chunk) = merged.next() {
            assert_eq!(
                (chunk.min_time(), chunk.max_time()),
                (count * 10, count * 10 + 8)
            );
            assert!(merged.chunks.sources.len() <= 3);
            count += 1;
        }
        assert_eq!(count, pairs);
        assert_eq!(merged.chunks.live_sources(), 0);
        assert!(merged.take_error().is_none());
    }

    #[test]
    fn empty_merge_result_is_invariant_violation() {
        let labels = Labels::from_pairs([("__name__", "up")]);
        let a = plain_chunk(&samples_at(&[0, 10]));
        let b = plain_chunk(&samples_at(&[5, 15]));
        let mut merged = merger_with(Arc::new(DroppingMerger)).merge(
            vec![
                ChunkSeries::from_chunks(labels.clone(), vec![a]),
                ChunkSeries::from_chunks(labels.clone(), vec![b]),
            ],
            CancellationToken::new(),
        );
        assert!(merged.next().is_none());
        let err = merged.take_error().expect("invariant violation");
        assert!(err.is_invariant_violation());
        match err {
            MergeError::InvariantViolation {
                labels: reported,
                min_time,
                max_time,
                inputs,
            } => {
                assert_eq!(reported, labels);
                assert_eq!((min_time, max_time, inputs), (0, 15, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn undecodable_overlap_reports_resolution_error() {
        let a = Chunk::new(0, 10, Bytes::from_static(b"garbage"));
        let b = plain_chunk(&samples_at(&[5]));
        let mut merged = merger_with(Arc::new(ChainSampleMerger)).merge(
            vec![unlabelled(vec![a]), unlabelled(vec![b])],
            CancellationToken::new(),
        );
        assert!(merged.next().is_none());
        match merged.take_error() {
            Some(MergeError::Resolution {
                error: SourceError::Codec(CodecError::InvalidLength { len: 7 }),
                ..
            }) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancelled_merge_stops_before_resolving() {
        let cancel = CancellationToken::new();
        let a = plain_chunk(&samples_at(&[0, 10]));
        let b = plain_chunk(&samples_at(&[5, 15]));
        let mut merged = merger_with(Arc::new(ChainSampleMerger))
            .merge(vec![unlabelled(vec![a]), unlabelled(vec![b])], cancel.clone());
        cancel.cancel();
        assert!(merged.next().is_none());
        assert!(matches!(merged.take_error(), Some(MergeError::Cancelled)));
    }

    #[test]
    fn merge_is_lazy_until_iterated() {
        let counting = Arc::new(CountingMerger::default());
        let a = plain_chunk(&samples_at(&[0, 10]));
        let b = plain_chunk(&samples_at(&[5, 15]));
        let mut merged = merger_with(counting.clone()).merge(
            vec![unlabelled(vec![a]), unlabelled(vec![b])],
            CancellationToken::new(),
        );
        assert_eq!(counting.calls(), 0);
        assert!(merged.next().is_some());
        assert_eq!(counting.calls(), 1);
    }
}
