//! The base producer of the revision pipeline.
//!
//! Pops commits from the chosen queue, enqueues unseen parents, carries
//! the uninteresting flag transitively down parent edges, applies the
//! commit filter and the optional tree-rewrite filter, and emits
//! survivors.
//!
//! Termination is exact: the walk ends when the queue drains, or when
//! every queued commit is uninteresting. Any commit added later would
//! inherit the flag from its popped parent, so nothing interesting can
//! follow.

use crate::treewalk::{Selection, TreeFilter};

use super::commit::{flags, CommitIx, WalkState};
use super::errors::RevWalkError;
use super::filter::RevFilter;
use super::generator::Generator;
use super::queue::RevQueue;
use super::rewrite::tree_rewrite_include;

/// Pops the pending queue and emits filtered commits.
pub(crate) struct PendingGenerator {
    queue: RevQueue,
    filter: RevFilter,
    /// Tree filter fused into the commit filter for path-limited walks.
    tree_rewrite: Option<TreeFilter>,
    /// When false (boundary mode) bodies of uninteresting commits are
    /// kept; the boundary stage may still deliver them.
    can_dispose: bool,
    output_type: u32,
}

impl PendingGenerator {
    pub(crate) fn new(
        queue: RevQueue,
        filter: RevFilter,
        tree_rewrite: Option<TreeFilter>,
        can_dispose: bool,
        output_type: u32,
    ) -> Self {
        Self {
            queue,
            filter,
            tree_rewrite,
            can_dispose,
            output_type,
        }
    }

    /// Whether the queue is date-shaped (newest first).
    fn is_date_ordered(&self) -> bool {
        matches!(self.queue, RevQueue::Date(_))
    }
}

impl Generator for PendingGenerator {
    fn output_type(&self) -> u32 {
        self.output_type
    }

    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError> {
        loop {
            let Some(c) = self.queue.next() else {
                return Ok(None);
            };
            let c_uninteresting = state.pool.flags(c) & flags::UNINTERESTING != 0;

            // Enqueue unseen parents; parse first so the date queue can
            // order them.
            let parents = state.pool.get(c).parents.clone();
            for p in parents {
                if c_uninteresting {
                    state.pool.add_flags(p, flags::UNINTERESTING);
                }
                if state.pool.flags(p) & flags::SEEN != 0 {
                    continue;
                }
                state.parse_headers(p)?;
                state.pool.add_flags(p, flags::SEEN);
                let time = state.pool.get(p).commit_time();
                self.queue.add(p, time);
            }
            if c_uninteresting {
                // Keep the flag flowing through parents that were parsed
                // and queued earlier.
                state.pool.carry_flags(c, flags::UNINTERESTING);
                if self.queue.everybody_has_flag(&state.pool, flags::UNINTERESTING) {
                    return Ok(None);
                }
                if self.can_dispose {
                    state.dispose_body(c);
                }
                continue;
            }

            if self.filter.requires_body() {
                state.parse_body(c)?;
            }
            let mut selection = self.filter.include(state, c)?;
            if selection == Selection::Include {
                if let Some(tf) = &self.tree_rewrite {
                    if !tree_rewrite_include(state, tf, c)? {
                        selection = Selection::Skip;
                    }
                }
            }
            match selection {
                Selection::Include => return Ok(Some(c)),
                Selection::Skip => {
                    if self.can_dispose {
                        state.dispose_body(c);
                    }
                }
                Selection::Stop => return Ok(None),
            }
        }
    }
}

impl std::fmt::Debug for PendingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingGenerator")
            .field("date_ordered", &self.is_date_ordered())
            .field("can_dispose", &self.can_dispose)
            .finish()
    }
}
