//! Merge-base computation.
//!
//! Each start commit is colored with its own branch bit; the walk pops a
//! date-ordered queue, carrying colors down parent edges. A commit that
//! accumulates every branch bit is a merge base. Its ancestry is then
//! painted so deeper common ancestors are not also reported; the walk
//! ends when every queued commit lies under an emitted base.

use super::commit::{flags, CommitIx, WalkState};
use super::errors::RevWalkError;
use super::generator::Generator;
use super::queue::RevQueue;

/// Produces merge bases of the start set.
pub(crate) struct MergeBaseGenerator {
    pending: RevQueue,
    branch_mask: u32,
}

impl MergeBaseGenerator {
    pub(crate) fn new() -> Self {
        Self {
            pending: RevQueue::date(),
            branch_mask: 0,
        }
    }

    /// Colors each start commit and seeds the date queue.
    ///
    /// # Errors
    /// `IllegalState` if more start commits are supplied than coloring
    /// bits exist.
    pub(crate) fn init(
        &mut self,
        mut starts: RevQueue,
        state: &mut WalkState<'_>,
    ) -> Result<(), RevWalkError> {
        let mut next_bit = flags::FIRST_BRANCH;
        while let Some(c) = starts.next() {
            if next_bit >= 32 {
                return Err(RevWalkError::illegal_state(format!(
                    "merge base supports at most {} start commits",
                    flags::BRANCH_BITS
                )));
            }
            let branch = 1u32 << next_bit;
            next_bit += 1;
            self.branch_mask |= branch;
            state.parse_headers(c)?;
            state.pool.add_flags(c, branch);
            let time = state.pool.get(c).commit_time();
            self.pending.add(c, time);
        }
        Ok(())
    }

}

impl Generator for MergeBaseGenerator {
    fn output_type(&self) -> u32 {
        0
    }

    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError> {
        loop {
            let Some(c) = self.pending.next() else {
                return Ok(None);
            };

            // Parse and enqueue parents so colors keep flowing down.
            let parents = state.pool.get(c).parents.clone();
            for p in parents {
                if state.pool.flags(p) & flags::SEEN != 0 {
                    continue;
                }
                state.parse_headers(p)?;
                state.pool.add_flags(p, flags::SEEN);
                let time = state.pool.get(p).commit_time();
                self.pending.add(p, time);
            }

            let colors = state.pool.flags(c) & self.branch_mask;
            let is_base = colors == self.branch_mask;
            let mut carry = colors;
            if is_base {
                // A base's ancestors carry every color plus the paint
                // that suppresses them as deeper bases.
                carry |= flags::MERGE_BASE;
            }
            state.pool.carry_flags(c, carry);

            if state.pool.flags(c) & flags::MERGE_BASE != 0 {
                // Under an already-reported base; nothing new here.
                if self
                    .pending
                    .everybody_has_flag(&state.pool, flags::MERGE_BASE)
                {
                    return Ok(None);
                }
                continue;
            }

            if is_base {
                return Ok(Some(c));
            }
        }
    }
}
