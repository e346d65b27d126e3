//! Git object-database access with bounded memory.
//!
//! Three components compose the crate:
//! - `cache`: a bounded pool of fixed-size byte windows mapped over pack
//!   files, plus a separately bounded cache of inflated delta bases.
//!   Random-access reads are served through per-caller cursors that pin at
//!   most one window at a time.
//! - `treewalk`: an n-way merge walker over tree objects, synchronized on
//!   the minimum path, with optional recursion, post-order delivery, and
//!   byte-level path filters.
//! - `revwalk`: a lazy generator pipeline over the commit graph with
//!   time/topo/reverse/boundary ordering, commit filters, and
//!   path-restricted history with parent rewriting.
//!
//! Dataflow, leaves first: raw pack/loose bytes -> window cache -> object
//! inflation (`odb`) -> tree walker (tree objects) and revision walker
//! (commit objects). The revision walker optionally invokes the tree
//! walker through a tree-diff filter to implement path-limited history.
//!
//! # Concurrency
//! The window cache is safe to share across threads; all index mutations
//! are serialized on one mutex while pinned reads proceed lock-free.
//! Tree and revision walkers are single-threaded per instance; run one
//! walker per thread, sharing only the cache and object database.

pub mod cache;
pub mod odb;
pub mod revwalk;
pub mod treewalk;
