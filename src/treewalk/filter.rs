//! Tree entry filters.
//!
//! A filter is a predicate over the walker's current state. It answers
//! with a three-valued `Selection`: include the entry, skip it, or stop
//! the whole walk. Stop is control flow, not an error; the walker turns
//! it into a clean end-of-walk.
//!
//! Path-group filters precompile byte prefixes and test them against the
//! walker's current path without allocating. Boolean compositions
//! short-circuit.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::odb::ObjectError;

use super::walk::TreeWalk;

/// Outcome of a filter test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Deliver the current entry.
    Include,
    /// Skip the current entry and continue.
    Skip,
    /// End the walk cleanly; no further entry can be of interest.
    Stop,
}

/// Application-defined filter predicate.
///
/// Custom filters are not shareable across concurrent walkers; give each
/// walker its own instance unless the implementation is stateless.
pub trait CustomTreeFilter: fmt::Debug {
    /// Tests the walker's current entry.
    ///
    /// # Errors
    /// Implementations that read objects may surface `ObjectError`.
    fn include(&self, walk: &TreeWalk<'_>) -> Result<Selection, ObjectError>;

    /// Advisory: true if the filter only makes sense over full paths,
    /// asking the walker to enable recursive mode.
    fn should_be_recursive(&self) -> bool {
        false
    }
}

/// A tree entry filter.
///
/// `All` is the sentinel accepting every entry; it is the default.
#[derive(Clone, Debug, Default)]
pub enum TreeFilter {
    /// Accept every entry.
    #[default]
    All,
    /// Accept entries under any of a set of path prefixes.
    Paths(PathFilterGroup),
    /// Both sub-filters must accept.
    And(Box<TreeFilter>, Box<TreeFilter>),
    /// Either sub-filter may accept.
    Or(Box<TreeFilter>, Box<TreeFilter>),
    /// Inverts the sub-filter's include/skip answer.
    Not(Box<TreeFilter>),
    /// Application-defined predicate.
    Custom(Arc<dyn CustomTreeFilter>),
}

impl TreeFilter {
    /// Builds a path-group filter from textual paths.
    ///
    /// # Panics
    /// Panics if a path is empty after trailing-'/' normalization; that is
    /// a programming error in the caller.
    #[must_use]
    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        Self::Paths(PathFilterGroup::new(paths))
    }

    /// Conjoins two filters.
    #[must_use]
    pub fn and(a: TreeFilter, b: TreeFilter) -> Self {
        Self::And(Box::new(a), Box::new(b))
    }

    /// Disjoins two filters.
    #[must_use]
    pub fn or(a: TreeFilter, b: TreeFilter) -> Self {
        Self::Or(Box::new(a), Box::new(b))
    }

    /// Negates a filter.
    #[must_use]
    pub fn not(a: TreeFilter) -> Self {
        Self::Not(Box::new(a))
    }

    /// Returns true if this is the accept-everything sentinel.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Tests the walker's current entry.
    ///
    /// # Errors
    /// Only custom filters can fail; the built-in kinds never do.
    pub fn include(&self, walk: &TreeWalk<'_>) -> Result<Selection, ObjectError> {
        match self {
            Self::All => Ok(Selection::Include),
            Self::Paths(group) => Ok(group.include(walk)),
            Self::And(a, b) => match a.include(walk)? {
                Selection::Include => b.include(walk),
                other => Ok(other),
            },
            Self::Or(a, b) => match a.include(walk)? {
                Selection::Skip => b.include(walk),
                other => Ok(other),
            },
            Self::Not(a) => Ok(match a.include(walk)? {
                Selection::Include => Selection::Skip,
                Selection::Skip => Selection::Include,
                Selection::Stop => Selection::Stop,
            }),
            Self::Custom(custom) => custom.include(walk),
        }
    }

    /// Advisory: true if the walk should run in recursive mode for this
    /// filter to see the paths it targets.
    #[must_use]
    pub fn should_be_recursive(&self) -> bool {
        match self {
            Self::All => false,
            Self::Paths(group) => group.should_be_recursive(),
            Self::And(a, b) | Self::Or(a, b) => {
                a.should_be_recursive() || b.should_be_recursive()
            }
            Self::Not(a) => a.should_be_recursive(),
            Self::Custom(custom) => custom.should_be_recursive(),
        }
    }
}

/// Accepts entries equal to, or under, any of a set of paths.
///
/// Paths are byte prefixes matched at directory boundaries. The group
/// stops the walk once the walker's position has passed the largest path
/// for good.
#[derive(Clone, Debug)]
pub struct PathFilterGroup {
    paths: Vec<Vec<u8>>,
    max: Vec<u8>,
}

impl PathFilterGroup {
    /// Compiles a group from paths.
    ///
    /// Trailing '/' characters are stripped; paths must otherwise be
    /// non-empty and relative.
    ///
    /// # Panics
    /// Panics on an empty path; that is a programming error.
    #[must_use]
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        let mut compiled: Vec<Vec<u8>> = paths
            .into_iter()
            .map(|p| {
                let mut p = p.into();
                while p.last() == Some(&b'/') {
                    p.pop();
                }
                assert!(!p.is_empty(), "path filters require a non-empty path");
                assert_ne!(p[0], b'/', "path filters must be relative");
                p
            })
            .collect();
        assert!(!compiled.is_empty(), "path filter group requires a path");
        compiled.sort();
        compiled.dedup();
        let max = compiled.last().expect("non-empty group").clone();
        Self {
            paths: compiled,
            max,
        }
    }

    fn include(&self, walk: &TreeWalk<'_>) -> Selection {
        for path in &self.paths {
            if walk.is_path_prefix(path) == Ordering::Equal {
                return Selection::Include;
            }
        }
        // Past the largest path: nothing later in tree order can match.
        if walk.is_path_prefix(&self.max) == Ordering::Greater {
            return Selection::Stop;
        }
        Selection::Skip
    }

    fn should_be_recursive(&self) -> bool {
        self.paths.iter().any(|p| p.contains(&b'/'))
    }
}
