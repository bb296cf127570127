//! Merge frontier: the next pending chunk of every live source.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use crate::chunk::Chunk;

/// Min-heap of pending chunks ordered by `(min_time, max_time)`.
///
/// Ties on both bounds fall back to the source index so a given input order
/// always pops in the same order.
#[derive(Debug, Default)]
pub(crate) struct ChunkFrontier {
    heap: BinaryHeap<Reverse<FrontierEntry>>,
}

impl ChunkFrontier {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, source: usize, chunk: Chunk) {
        self.heap.push(Reverse(FrontierEntry { source, chunk }));
    }

    /// Remove the chunk with the smallest bounds, with the index of its source.
    pub(crate) fn pop(&mut self) -> Option<(usize, Chunk)> {
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.source, entry.chunk))
    }

    pub(crate) fn peek_min_time(&self) -> Option<i64> {
        self.heap.peek().map(|Reverse(entry)| entry.chunk.min_time())
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

#[derive(Debug)]
struct FrontierEntry {
    source: usize,
    chunk: Chunk,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chunk
            .min_time()
            .cmp(&other.chunk.min_time())
            .then(self.chunk.max_time().cmp(&other.chunk.max_time()))
            .then(self.source.cmp(&other.source))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn pops_by_min_then_max_time() {
        let mut frontier = ChunkFrontier::with_capacity(4);
        frontier.push(0, Chunk::new(10, 50, Bytes::new()));
        frontier.push(1, Chunk::new(10, 20, Bytes::new()));
        frontier.push(2, Chunk::new(5, 100, Bytes::new()));
        frontier.push(3, Chunk::new(10, 20, Bytes::new()));
        assert_eq!(frontier.len(), 4);
        assert_eq!(frontier.peek_min_time(), Some(5));

        let order: Vec<usize> = std::iter::from_fn(|| frontier.pop())
            .map(|(source, _)| source)
            .collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
        assert!(frontier.is_empty());
    }
}
