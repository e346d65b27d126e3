//! Topological ordering.
//!
//! Buffers the upstream output, counts each commit's in-degree (number
//! of buffered children), and then emits only commits whose children
//! have all been emitted. A commit popped too early is tagged delayed;
//! when its last child is produced it is pushed back to the queue front
//! so it follows that child immediately.

use super::commit::{flags, CommitIx, WalkState};
use super::errors::RevWalkError;
use super::generator::{output, Generator};
use super::queue::RevQueue;

/// Emits no commit before any of its emitted descendants.
pub(crate) struct TopoSortGenerator {
    source: Option<Box<dyn Generator>>,
    pending: RevQueue,
    output_type: u32,
}

impl TopoSortGenerator {
    pub(crate) fn new(source: Box<dyn Generator>) -> Self {
        let output_type = source.output_type() | output::SORT_TOPO;
        Self {
            source: Some(source),
            pending: RevQueue::fifo(),
            output_type,
        }
    }

    /// Drains the source, counting in-degrees over the buffered subgraph.
    fn prime(&mut self, state: &mut WalkState<'_>) -> Result<(), RevWalkError> {
        let Some(mut source) = self.source.take() else {
            return Ok(());
        };
        while let Some(c) = source.next(state)? {
            let parents = state.pool.get(c).parents.clone();
            for p in parents {
                state.pool.get_mut(p).in_degree += 1;
            }
            self.pending.add_unordered(c);
        }
        Ok(())
    }
}

impl Generator for TopoSortGenerator {
    fn output_type(&self) -> u32 {
        self.output_type
    }

    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError> {
        self.prime(state)?;
        loop {
            let Some(c) = self.pending.next() else {
                return Ok(None);
            };
            if state.pool.get(c).in_degree > 0 {
                // A child is missing; hold this commit until the last
                // child is produced.
                state.pool.add_flags(c, flags::TOPO_DELAY);
                continue;
            }
            let parents = state.pool.get(c).parents.clone();
            for p in parents {
                let parent = state.pool.get_mut(p);
                parent.in_degree -= 1;
                if parent.in_degree == 0 && parent.flags & flags::TOPO_DELAY != 0 {
                    // We were the parent's last child; emit it right
                    // behind us.
                    parent.flags &= !flags::TOPO_DELAY;
                    self.pending.unpop(p);
                }
            }
            return Ok(Some(c));
        }
    }
}
