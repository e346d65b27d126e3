//! Restartable commit queues.
//!
//! The pending queue comes in four shapes: an empty sentinel, FIFO
//! (insertion order, with `unpop` for the topological sorter), LIFO, and
//! a date queue (max-heap on commit time with insertion-order tiebreak so
//! equal timestamps pop deterministically). Draining constructors convert
//! one shape into another when the pipeline is assembled.

use std::collections::{BinaryHeap, VecDeque};

use super::commit::{CommitIx, CommitPool};

/// Heap element of the date queue.
#[derive(Debug, PartialEq, Eq)]
struct DateEntry {
    time: i64,
    seq: u64,
    ix: CommitIx,
}

impl Ord for DateEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Newest first; earlier insertion wins ties.
        self.time
            .cmp(&other.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for DateEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap on commit time.
#[derive(Debug, Default)]
pub(crate) struct DateQueue {
    heap: BinaryHeap<DateEntry>,
    seq: u64,
}

/// A restartable ordering container over commit nodes.
#[derive(Debug)]
pub(crate) enum RevQueue {
    /// Always empty.
    Empty,
    /// Pops in insertion order.
    Fifo(VecDeque<CommitIx>),
    /// Pops newest insertion first.
    Lifo(Vec<CommitIx>),
    /// Pops the newest commit time first.
    Date(DateQueue),
}

impl RevQueue {
    /// Creates an insertion-ordered queue.
    pub(crate) fn fifo() -> Self {
        Self::Fifo(VecDeque::new())
    }

    /// Creates a date-ordered queue.
    pub(crate) fn date() -> Self {
        Self::Date(DateQueue::default())
    }

    /// Drains `source` into a FIFO, preserving its pop order.
    pub(crate) fn fifo_from(mut source: RevQueue) -> Self {
        let mut q = Self::fifo();
        while let Some(ix) = source.next() {
            q.add_unordered(ix);
        }
        q
    }

    /// Drains `source` into a date queue ordered by commit time.
    pub(crate) fn date_from(mut source: RevQueue, pool: &CommitPool) -> Self {
        let mut q = Self::date();
        while let Some(ix) = source.next() {
            q.add(ix, pool.get(ix).commit_time());
        }
        q
    }

    /// Adds a commit with its commit time (needed by the date shape).
    pub(crate) fn add(&mut self, ix: CommitIx, time: i64) {
        match self {
            Self::Empty => {}
            Self::Fifo(q) => q.push_back(ix),
            Self::Lifo(q) => q.push(ix),
            Self::Date(d) => {
                d.seq += 1;
                d.heap.push(DateEntry {
                    time,
                    seq: d.seq,
                    ix,
                });
            }
        }
    }

    /// Adds a commit to a shape that ignores time.
    ///
    /// # Panics
    /// Panics in debug builds when called on the date shape.
    pub(crate) fn add_unordered(&mut self, ix: CommitIx) {
        debug_assert!(
            !matches!(self, Self::Date(_)),
            "date queue additions need a commit time"
        );
        self.add(ix, 0);
    }

    /// Pops the next commit, or `None` when the queue is drained.
    pub(crate) fn next(&mut self) -> Option<CommitIx> {
        match self {
            Self::Empty => None,
            Self::Fifo(q) => q.pop_front(),
            Self::Lifo(q) => q.pop(),
            Self::Date(d) => d.heap.pop().map(|e| e.ix),
        }
    }

    /// Pushes a commit back to the front of a FIFO.
    ///
    /// # Panics
    /// Panics if the queue is not the FIFO shape; only the topological
    /// sorter uses this.
    pub(crate) fn unpop(&mut self, ix: CommitIx) {
        match self {
            Self::Fifo(q) => q.push_front(ix),
            _ => panic!("unpop requires the FIFO shape"),
        }
    }

    /// Returns true if no commits are queued.
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Fifo(q) => q.is_empty(),
            Self::Lifo(q) => q.is_empty(),
            Self::Date(d) => d.heap.is_empty(),
        }
    }

    /// Iterates queued commits in unspecified order.
    pub(crate) fn iter(&self) -> Box<dyn Iterator<Item = CommitIx> + '_> {
        match self {
            Self::Empty => Box::new(std::iter::empty()),
            Self::Fifo(q) => Box::new(q.iter().copied()),
            Self::Lifo(q) => Box::new(q.iter().copied()),
            Self::Date(d) => Box::new(d.heap.iter().map(|e| e.ix)),
        }
    }

    /// True if every queued commit carries `bits`.
    pub(crate) fn everybody_has_flag(&self, pool: &CommitPool, bits: u32) -> bool {
        self.iter().all(|ix| pool.flags(ix) & bits == bits)
    }

    /// True if any queued commit carries `bits`.
    pub(crate) fn anybody_has_flag(&self, pool: &CommitPool, bits: u32) -> bool {
        self.iter().any(|ix| pool.flags(ix) & bits == bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_preserves_insertion_order() {
        let mut q = RevQueue::fifo();
        for ix in [3, 1, 2] {
            q.add_unordered(ix);
        }
        assert_eq!(q.next(), Some(3));
        assert_eq!(q.next(), Some(1));
        assert_eq!(q.next(), Some(2));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn lifo_reverses() {
        let mut q = RevQueue::Lifo(Vec::new());
        for ix in [1, 2, 3] {
            q.add_unordered(ix);
        }
        assert_eq!(q.next(), Some(3));
        assert_eq!(q.next(), Some(2));
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn date_orders_newest_first_with_stable_ties() {
        let mut q = RevQueue::date();
        q.add(1, 100);
        q.add(2, 300);
        q.add(3, 200);
        q.add(4, 300);
        assert_eq!(q.next(), Some(2));
        assert_eq!(q.next(), Some(4));
        assert_eq!(q.next(), Some(3));
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn unpop_front_of_fifo() {
        let mut q = RevQueue::fifo();
        q.add_unordered(1);
        q.add_unordered(2);
        let first = q.next().unwrap();
        q.unpop(first);
        assert_eq!(q.next(), Some(first));
    }

    #[test]
    fn fifo_from_preserves_pop_order() {
        let mut src = RevQueue::fifo();
        for ix in [5, 6, 7] {
            src.add_unordered(ix);
        }
        let mut q = RevQueue::fifo_from(src);
        assert_eq!(q.next(), Some(5));
        assert_eq!(q.next(), Some(6));
        assert_eq!(q.next(), Some(7));
    }

    #[test]
    fn empty_sentinel_swallows_additions() {
        let mut q = RevQueue::Empty;
        q.add_unordered(1);
        assert!(q.is_empty());
        assert_eq!(q.next(), None);
    }
}
