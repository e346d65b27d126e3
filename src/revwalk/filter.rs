//! Commit filters.
//!
//! Filters select which commits the walk emits. They do not limit
//! traversal: a skipped commit's parents are still walked. Content
//! filters (author, committer) parse the commit body on demand; boolean
//! compositions short-circuit; `Stop` ends the walk cleanly.
//!
//! `MergeBase` is a sentinel: it is never evaluated per commit, it
//! switches the pipeline to merge-base generation at assembly time.

use std::fmt;
use std::sync::Arc;

use memchr::memmem;

use crate::odb::ObjectError;
use crate::treewalk::Selection;

use super::commit::{CommitIx, RevCommit, WalkState};
use super::errors::RevWalkError;

/// Application-defined commit predicate.
///
/// The commit's body is parsed before the predicate runs. Not shareable
/// across concurrent walkers unless stateless.
pub trait CustomRevFilter: fmt::Debug {
    /// Tests one commit.
    ///
    /// # Errors
    /// Implementations that read objects may surface `ObjectError`.
    fn include(&self, commit: &RevCommit) -> Result<Selection, ObjectError>;
}

/// A commit filter.
#[derive(Clone, Debug, Default)]
pub enum RevFilter {
    /// Accept every commit.
    #[default]
    All,
    /// Accept no commit (traversal still proceeds).
    None,
    /// Sentinel: produce merge bases of the start set instead of a
    /// normal walk.
    MergeBase,
    /// Accept commits whose author line contains the byte pattern.
    Author(Vec<u8>),
    /// Accept commits whose committer line contains the byte pattern.
    Committer(Vec<u8>),
    /// Accept commits at or after the given epoch seconds.
    CommitTimeAfter(i64),
    /// Accept commits at or before the given epoch seconds.
    CommitTimeBefore(i64),
    /// Both sub-filters must accept.
    And(Box<RevFilter>, Box<RevFilter>),
    /// Either sub-filter may accept.
    Or(Box<RevFilter>, Box<RevFilter>),
    /// Inverts the sub-filter's include/skip answer.
    Not(Box<RevFilter>),
    /// Application-defined predicate.
    Custom(Arc<dyn CustomRevFilter>),
}

impl RevFilter {
    /// Conjoins two filters.
    #[must_use]
    pub fn and(a: RevFilter, b: RevFilter) -> Self {
        Self::And(Box::new(a), Box::new(b))
    }

    /// Disjoins two filters.
    #[must_use]
    pub fn or(a: RevFilter, b: RevFilter) -> Self {
        Self::Or(Box::new(a), Box::new(b))
    }

    /// Negates a filter.
    #[must_use]
    pub fn not(a: RevFilter) -> Self {
        Self::Not(Box::new(a))
    }

    /// Returns true if evaluation needs the commit body.
    #[must_use]
    pub fn requires_body(&self) -> bool {
        match self {
            Self::Author(_) | Self::Committer(_) | Self::Custom(_) => true,
            Self::And(a, b) | Self::Or(a, b) => a.requires_body() || b.requires_body(),
            Self::Not(a) => a.requires_body(),
            _ => false,
        }
    }

    /// Tests one commit.
    ///
    /// The merge-base sentinel must not reach evaluation; assembly
    /// replaces the pipeline before the first test.
    pub(crate) fn include(
        &self,
        state: &mut WalkState<'_>,
        ix: CommitIx,
    ) -> Result<Selection, RevWalkError> {
        match self {
            Self::All => Ok(Selection::Include),
            Self::None => Ok(Selection::Skip),
            Self::MergeBase => Err(RevWalkError::illegal_state(
                "merge-base filter cannot be evaluated per commit",
            )),
            Self::Author(pattern) => {
                state.parse_body(ix)?;
                let found = state
                    .pool
                    .get(ix)
                    .author_line()
                    .is_some_and(|line| memmem::find(line, pattern).is_some());
                Ok(selection_of(found))
            }
            Self::Committer(pattern) => {
                state.parse_body(ix)?;
                let found = state
                    .pool
                    .get(ix)
                    .committer_line()
                    .is_some_and(|line| memmem::find(line, pattern).is_some());
                Ok(selection_of(found))
            }
            Self::CommitTimeAfter(when) => {
                Ok(selection_of(state.pool.get(ix).commit_time() >= *when))
            }
            Self::CommitTimeBefore(when) => {
                Ok(selection_of(state.pool.get(ix).commit_time() <= *when))
            }
            Self::And(a, b) => match a.include(state, ix)? {
                Selection::Include => b.include(state, ix),
                other => Ok(other),
            },
            Self::Or(a, b) => match a.include(state, ix)? {
                Selection::Skip => b.include(state, ix),
                other => Ok(other),
            },
            Self::Not(a) => Ok(match a.include(state, ix)? {
                Selection::Include => Selection::Skip,
                Selection::Skip => Selection::Include,
                Selection::Stop => Selection::Stop,
            }),
            Self::Custom(custom) => {
                state.parse_body(ix)?;
                custom.include(state.pool.get(ix)).map_err(Into::into)
            }
        }
    }
}

#[inline]
fn selection_of(included: bool) -> Selection {
    if included {
        Selection::Include
    } else {
        Selection::Skip
    }
}
