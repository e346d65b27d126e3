//! N-way tree walking.
//!
//! A `TreeWalk` drives one or more tree-entry iterators in parallel,
//! synchronized on the lexicographically smallest current path. Each step
//! emits one path together with every tree's contribution to it (mode and
//! object id, or a missing sentinel). Subtrees can be entered manually,
//! recursed into automatically, and optionally delivered again after
//! their children (post-order).
//!
//! Iterators come in three shapes: the canonical parser over raw tree
//! object bytes, the always-empty sentinel, and an adapter over a loaded
//! directory cache. All agree on Git's tree order, in which directory
//! names compare as if they ended with '/'.
//!
//! Walkers are single-threaded; run one per thread over a shared object
//! database.

pub mod dircache;
pub mod file_mode;
pub mod filter;
pub mod iter;
pub mod walk;

pub use dircache::{DirCache, DirCacheBuilder, DirCacheEntry, DirCacheError, DirCacheTree};
pub use file_mode::FileMode;
pub use filter::{CustomTreeFilter, PathFilterGroup, Selection, TreeFilter};
pub use iter::TreeIterator;
pub use walk::TreeWalk;
