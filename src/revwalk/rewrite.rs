//! Path-limited history simplification.
//!
//! Two halves implement it. The tree-rewrite filter diffs each commit's
//! tree against its parents under the active tree filter; a commit whose
//! filtered tree is unchanged against all parents (or, for a root
//! commit, matches nothing) is marked for rewrite and excluded from the
//! output. The rewrite generator then compresses chains of marked
//! commits out of the emitted commits' parent lists, splicing each edge
//! through to the nearest unmarked ancestor.
//!
//! Merge commits are never spliced through: an edge rewrite follows
//! single-parent chains only, and a marked root drops the edge entirely.

use crate::treewalk::{TreeFilter, TreeWalk};

use super::commit::{flags, CommitIx, WalkState};
use super::errors::RevWalkError;
use super::generator::{output, Generator};

/// Applies the tree filter to one commit, deciding emission.
///
/// Returns false when the commit's filtered tree is unchanged against
/// all parents; the commit is then flagged `REWRITE` so downstream edges
/// splice through it.
///
/// # Errors
/// Tree objects referenced by the commit or its parents must load and
/// parse.
pub(crate) fn tree_rewrite_include(
    state: &mut WalkState<'_>,
    tree_filter: &TreeFilter,
    c: CommitIx,
) -> Result<bool, RevWalkError> {
    let parents = state.pool.get(c).parents.clone();
    for &p in &parents {
        state.parse_headers(p)?;
    }

    let n = parents.len();
    let mut trees: Vec<_> = parents.iter().map(|&p| state.pool.get(p).tree_id()).collect();
    trees.push(state.pool.get(c).tree_id());

    let mut walk = TreeWalk::new(state.odb);
    walk.set_recursive(tree_filter.should_be_recursive());
    walk.set_filter(tree_filter.clone());
    walk.reset_trees(&trees)?;

    if n == 0 {
        // Root commit: interesting only if the filter matches anything.
        if walk.next()? {
            return Ok(true);
        }
        state.pool.add_flags(c, flags::REWRITE);
        return Ok(false);
    }

    let mut changed = vec![false; n];
    while walk.next()? {
        let my_mode = walk.raw_mode(n);
        for (i, slot) in changed.iter_mut().enumerate() {
            if walk.raw_mode(i) == my_mode && walk.id_equal(i, n) {
                continue;
            }
            *slot = true;
        }
    }

    if changed.iter().any(|&slot| slot) {
        Ok(true)
    } else {
        state.pool.add_flags(c, flags::REWRITE);
        Ok(false)
    }
}

/// Compresses rewrite-marked parent chains of emitted commits.
pub(crate) struct RewriteGenerator {
    source: Box<dyn Generator>,
    output_type: u32,
}

impl RewriteGenerator {
    pub(crate) fn new(source: Box<dyn Generator>) -> Self {
        let output_type = source.output_type() & !output::NEEDS_REWRITE;
        Self {
            source,
            output_type,
        }
    }

    /// Follows a parent edge through marked single-parent commits.
    ///
    /// Returns `None` when the chain ends in a marked root.
    fn rewrite_one(state: &WalkState<'_>, mut p: CommitIx) -> Option<CommitIx> {
        loop {
            let commit = state.pool.get(p);
            if commit.flags & flags::REWRITE == 0 {
                return Some(p);
            }
            match commit.parents.len() {
                0 => return None,
                1 => p = commit.parents[0],
                // A marked merge stays; splicing it would drop history.
                _ => return Some(p),
            }
        }
    }
}

impl Generator for RewriteGenerator {
    fn output_type(&self) -> u32 {
        self.output_type
    }

    fn next(&mut self, state: &mut WalkState<'_>) -> Result<Option<CommitIx>, RevWalkError> {
        let Some(c) = self.source.next(state)? else {
            return Ok(None);
        };

        let parents = state.pool.get(c).parents.clone();
        let mut rewritten: Vec<CommitIx> = Vec::with_capacity(parents.len());
        let mut changed = false;
        for p in parents {
            match Self::rewrite_one(state, p) {
                Some(np) => {
                    if np != p {
                        changed = true;
                    }
                    if !rewritten.contains(&np) {
                        rewritten.push(np);
                    } else {
                        changed = true;
                    }
                }
                None => changed = true,
            }
        }
        if changed {
            state.pool.get_mut(c).parents = rewritten;
        }
        Ok(Some(c))
    }
}
