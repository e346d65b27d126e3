//! Generator pipeline plumbing.
//!
//! A generator is a lazy producer of commit nodes with a declared
//! `output_type` bitfield that downstream generators inspect to decide
//! whether further transformation is required. Within one walk the
//! generators form a chain terminating in the walker's pending slot.
//!
//! This module carries the capability trait, the output bits, and the
//! whole-stream buffering generator used for rewrite (FIFO) and reverse
//! (LIFO) stages.

use super::commit::{CommitIx, WalkState};
use super::errors::RevWalkError;
use super::queue::RevQueue;

/// Output declaration bits.
pub(crate) mod output {
    /// Output is ordered newest commit time first.
    pub const SORT_COMMIT_TIME_DESC: u32 = 1 << 0;
    /// Output is topologically ordered.
    pub const SORT_TOPO: u32 = 1 << 1;
    /// Rewrite marks have been applied to the stream's commits.
    pub const HAS_REWRITE: u32 = 1 << 2;
    /// A rewrite stage must still compress marked parent chains.
    pub const NEEDS_REWRITE: u32 = 1 << 3;
    /// The stream may contain commits tagged uninteresting.
    pub const HAS_UNINTERESTING: u32 = 1 << 4;
}

/// A lazy producer of commit nodes.
pub(crate) trait Generator {
    /// Declared properties of this generator's output.
    fn output_type(&self) -> u32;

    /// Produces the next commit, or `None` at end of walk.
    ///
    /// # Errors
    /// Object access failures and illegal pipeline states.
    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError>;
}

/// Buffering shape for `BufferGenerator`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BufferOrder {
    /// Replay in production order.
    Fifo,
    /// Replay in reverse production order.
    Lifo,
}

/// Buffers the entire upstream output, then replays it.
///
/// The drain happens on the first `next` call, keeping pipeline assembly
/// cheap. The FIFO shape feeds the rewrite stage; the LIFO shape
/// implements the reverse sort.
pub(crate) struct BufferGenerator {
    source: Option<Box<dyn Generator>>,
    buffer: RevQueue,
    output_type: u32,
}

impl BufferGenerator {
    pub(crate) fn new(order: BufferOrder, source: Box<dyn Generator>) -> Self {
        let buffer = match order {
            BufferOrder::Fifo => RevQueue::fifo(),
            BufferOrder::Lifo => RevQueue::Lifo(Vec::new()),
        };
        Self {
            output_type: source.output_type(),
            source: Some(source),
            buffer,
        }
    }
}

impl Generator for BufferGenerator {
    fn output_type(&self) -> u32 {
        self.output_type
    }

    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError> {
        if let Some(mut source) = self.source.take() {
            while let Some(ix) = source.next(state)? {
                self.buffer.add_unordered(ix);
            }
        }
        Ok(self.buffer.next())
    }
}


#[cfg(test)]
mod tests {
    use crate::odb::MemoryObjectDatabase;

    use super::test_support::FixedGenerator;
    use super::*;

    #[test]
    fn fifo_buffer_replays_in_order() {
        let db = MemoryObjectDatabase::new();
        let mut state = WalkState::new(&db);
        let mut g = BufferGenerator::new(
            BufferOrder::Fifo,
            Box::new(FixedGenerator::new(vec![1, 2, 3], 0)),
        );
        let mut seen = Vec::new();
        while let Some(ix) = g.next(&mut state).unwrap() {
            seen.push(ix);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn lifo_buffer_reverses() {
        let db = MemoryObjectDatabase::new();
        let mut state = WalkState::new(&db);
        let mut g = BufferGenerator::new(
            BufferOrder::Lifo,
            Box::new(FixedGenerator::new(vec![1, 2, 3], 0)),
        );
        let mut seen = Vec::new();
        while let Some(ix) = g.next(&mut state).unwrap() {
            seen.push(ix);
        }
        assert_eq!(seen, vec![3, 2, 1]);
    }

    #[test]
    fn buffer_preserves_output_type() {
        let g = BufferGenerator::new(
            BufferOrder::Fifo,
            Box::new(FixedGenerator::new(Vec::new(), output::NEEDS_REWRITE)),
        );
        assert_eq!(g.output_type(), output::NEEDS_REWRITE);
    }
}
