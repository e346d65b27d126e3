//! The n-way tree walker.
//!
//! Walks one or more tree iterators in parallel, synchronized on the
//! lexicographically smallest current path. Each `next` advances the
//! iterators that contributed the previous path, finds the new minimum,
//! applies the filter, and optionally recurses into subtrees.
//!
//! # Invariants
//! - Exactly one iterator index is `current_head` after a successful
//!   `next`; every iterator either carries `matches == current_head`
//!   (it contributes the current path), `matches == None`, or a
//!   transient self-tag left by `min`.
//! - On subtree entry every iterator is replaced at once: contributors by
//!   their child iterator, the rest by an empty sentinel; the shadowed
//!   iterator becomes the replacement's `parent`.
//! - `depth` is the number of entered subtrees; `exit_subtree` restores
//!   every slot to its parent and recomputes the head from the self-tags
//!   left by the terminal `min` of the exited level.
//!
//! A walker is single-threaded. Multiple walkers over one repository may
//! run in parallel threads; they share only the object database.

use std::cmp::Ordering;

use crate::odb::{ObjectDatabase, ObjectError, ObjectId};

use super::file_mode::FileMode;
use super::filter::{Selection, TreeFilter};
use super::iter::TreeIterator;

/// Walks one or more tree iterators in parallel.
pub struct TreeWalk<'a> {
    odb: &'a dyn ObjectDatabase,
    trees: Vec<TreeIterator>,
    filter: TreeFilter,
    recursive: bool,
    post_order: bool,
    depth: u32,
    advance: bool,
    post_children: bool,
    current_head: usize,
}

impl<'a> TreeWalk<'a> {
    /// Creates a walker with no trees; add them with `add_tree` or
    /// `reset_trees`.
    #[must_use]
    pub fn new(odb: &'a dyn ObjectDatabase) -> Self {
        Self {
            odb,
            trees: Vec::new(),
            filter: TreeFilter::All,
            recursive: false,
            post_order: false,
            depth: 0,
            advance: false,
            post_children: false,
            current_head: 0,
        }
    }

    /// Opens a walk positioned on exactly one path across the given trees.
    ///
    /// Returns `None` if no tree contains the path. The walk is already
    /// positioned; callers need not invoke `next` first.
    ///
    /// # Errors
    /// As `reset_trees`.
    pub fn for_path(
        odb: &'a dyn ObjectDatabase,
        path: &str,
        trees: &[ObjectId],
    ) -> Result<Option<Self>, ObjectError> {
        let filter = TreeFilter::paths([path.as_bytes().to_vec()]);
        let mut walk = Self::new(odb);
        walk.recursive = filter.should_be_recursive();
        walk.filter = filter;
        walk.reset_trees(trees)?;
        if walk.next()? {
            Ok(Some(walk))
        } else {
            Ok(None)
        }
    }

    /// The object database this walker reads from.
    #[must_use]
    pub fn odb(&self) -> &'a dyn ObjectDatabase {
        self.odb
    }

    /// Replaces the filter. The accept-everything sentinel is the default.
    pub fn set_filter(&mut self, filter: TreeFilter) {
        self.filter = filter;
    }

    /// Currently configured filter.
    #[must_use]
    pub fn filter(&self) -> &TreeFilter {
        &self.filter
    }

    /// Enables or disables automatic descent into subtrees.
    ///
    /// When enabled the caller never sees subtree nodes, only file-level
    /// entries in all relevant subtrees.
    pub fn set_recursive(&mut self, recursive: bool) {
        self.recursive = recursive;
    }

    /// Returns true if subtrees are entered automatically.
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Enables or disables delivery of subtrees after their children.
    pub fn set_post_order(&mut self, post_order: bool) {
        self.post_order = post_order;
    }

    /// Returns true if subtrees are delivered again after their children.
    #[must_use]
    pub fn is_post_order(&self) -> bool {
        self.post_order
    }

    /// Clears all trees so new iterators can be added.
    pub fn reset(&mut self) {
        self.trees.clear();
        self.advance = false;
        self.post_children = false;
        self.depth = 0;
        self.current_head = 0;
    }

    /// Resets the walker to run over the given tree objects.
    ///
    /// # Errors
    /// `Missing`, `WrongType`, `Corrupt`, or `Io` if a tree cannot be
    /// opened and parsed.
    pub fn reset_trees(&mut self, ids: &[ObjectId]) -> Result<(), ObjectError> {
        self.reset();
        for id in ids {
            self.add_tree(id)?;
        }
        Ok(())
    }

    /// Adds a tree object, returning its position within the walker.
    ///
    /// # Errors
    /// As `reset_trees`.
    pub fn add_tree(&mut self, id: &ObjectId) -> Result<usize, ObjectError> {
        let iter = TreeIterator::for_tree(self.odb, id)?;
        Ok(self.add_iterator(iter))
    }

    /// Adds an already created iterator, returning its position.
    ///
    /// The iterator should be fresh: no parent, positioned on its first
    /// entry.
    pub fn add_iterator(&mut self, mut iter: TreeIterator) -> usize {
        iter.matches = None;
        self.trees.push(iter);
        self.trees.len() - 1
    }

    /// Number of trees this walker iterates over.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Current recursion depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Advances to the next relevant entry.
    ///
    /// Returns `false` once all entries have been walked, or when the
    /// filter stops the walk.
    ///
    /// # Errors
    /// Object access and parse failures surface as `ObjectError`.
    pub fn next(&mut self) -> Result<bool, ObjectError> {
        if self.advance {
            self.advance = false;
            self.post_children = false;
            self.pop_entries_equal()?;
        }

        loop {
            let Some(head) = self.min() else {
                if self.depth > 0 {
                    self.exit_subtree();
                    if self.post_order {
                        self.advance = true;
                        self.post_children = true;
                        return Ok(true);
                    }
                    self.pop_entries_equal()?;
                    continue;
                }
                return Ok(false);
            };

            self.current_head = head;
            let filter = std::mem::take(&mut self.filter);
            let selection = filter.include(self);
            self.filter = filter;
            match selection? {
                Selection::Include => {}
                Selection::Skip => {
                    self.skip_entries_equal()?;
                    continue;
                }
                Selection::Stop => return Ok(false),
            }

            if self.recursive && FileMode::is_tree_bits(self.trees[head].mode) {
                self.enter_subtree()?;
                continue;
            }

            self.advance = true;
            return Ok(true);
        }
    }

    /// Object id contributed by the nth tree, or the zero id if that tree
    /// has no entry at the current path.
    #[must_use]
    pub fn object_id(&self, nth: usize) -> ObjectId {
        let t = &self.trees[nth];
        if t.matches == Some(self.current_head) {
            t.entry_object_id()
        } else {
            ObjectId::zero()
        }
    }

    /// Compares the current ids of two trees.
    ///
    /// Faster than extracting both ids; false whenever either tree does
    /// not contribute the current path.
    #[must_use]
    pub fn id_equal(&self, nth_a: usize, nth_b: usize) -> bool {
        let head = self.current_head;
        let a = &self.trees[nth_a];
        let b = &self.trees[nth_b];
        a.matches == Some(head) && b.matches == Some(head) && a.id_equal(b)
    }

    /// Raw mode bits contributed by the nth tree; 0 when the tree has no
    /// entry at the current path.
    #[must_use]
    pub fn raw_mode(&self, nth: usize) -> u32 {
        let t = &self.trees[nth];
        if t.matches == Some(self.current_head) {
            t.mode
        } else {
            0
        }
    }

    /// Classified mode contributed by the nth tree.
    #[must_use]
    pub fn file_mode(&self, nth: usize) -> FileMode {
        FileMode::from_bits(self.raw_mode(nth))
    }

    /// Current entry's full path bytes from the walk root.
    #[must_use]
    pub fn path_bytes(&self) -> &[u8] {
        self.trees[self.current_head].path_bytes()
    }

    /// Current entry's full path, lossily decoded.
    #[must_use]
    pub fn path_string(&self) -> String {
        String::from_utf8_lossy(self.path_bytes()).into_owned()
    }

    /// Current entry's name within its parent tree, lossily decoded.
    #[must_use]
    pub fn name_string(&self) -> String {
        let t = &self.trees[self.current_head];
        String::from_utf8_lossy(&t.path[t.path_offset..t.path_len]).into_owned()
    }

    /// Tests the supplied path against the current entry's path.
    ///
    /// `Less` if the walk has not reached `p`; `Equal` if `p` matches the
    /// current entry exactly or at a directory boundary; `Greater` if the
    /// walk has passed `p` and it can never match again. `p` must not end
    /// with '/'.
    #[must_use]
    pub fn is_path_prefix(&self, p: &[u8]) -> Ordering {
        let c = self.path_bytes();
        let mut ci = 0;
        while ci < c.len() && ci < p.len() {
            match c[ci].cmp(&p[ci]) {
                Ordering::Equal => ci += 1,
                other => return other,
            }
        }
        if ci < c.len() {
            // Out of pattern with current data left: a '/' boundary means
            // the current entry lies under the pattern directory.
            return if c[ci] == b'/' {
                Ordering::Equal
            } else {
                Ordering::Less
            };
        }
        if ci < p.len() {
            // Out of current with pattern left: a '/' boundary means the
            // pattern lies under the current subtree.
            return if p[ci] == b'/' {
                Ordering::Equal
            } else {
                Ordering::Less
            };
        }
        Ordering::Equal
    }

    /// Returns true if the current entry is a subtree that
    /// `enter_subtree` can descend into.
    #[must_use]
    pub fn is_subtree(&self) -> bool {
        FileMode::is_tree_bits(self.trees[self.current_head].mode)
    }

    /// Returns true if the current entry is a subtree delivered after its
    /// children were already processed.
    #[must_use]
    pub fn is_post_children(&self) -> bool {
        self.post_children && self.is_subtree()
    }

    /// Descends into the current subtree.
    ///
    /// Arranges for the subtree's children to be returned before the next
    /// sibling. Iterators that do not contribute the current path are
    /// replaced by empty sentinels so every slot stays aligned.
    ///
    /// # Errors
    /// `Missing`, `WrongType`, `Corrupt`, or `Io` if a subtree object
    /// cannot be loaded; the walker is unchanged on failure.
    pub fn enter_subtree(&mut self) -> Result<(), ObjectError> {
        let head = self.current_head;
        let mut children = Vec::with_capacity(self.trees.len());
        for t in &self.trees {
            let child = if t.matches == Some(head)
                && !t.eof()
                && FileMode::is_tree_bits(t.mode)
            {
                t.create_subtree_iterator(self.odb)?
            } else {
                TreeIterator::empty_child_of(t)
            };
            children.push(child);
        }

        self.depth += 1;
        self.advance = false;
        for (i, mut child) in children.into_iter().enumerate() {
            let shadowed = std::mem::replace(&mut self.trees[i], TreeIterator::empty());
            child.parent = Some(Box::new(shadowed));
            self.trees[i] = child;
        }
        Ok(())
    }

    /// Finds the iterator with the smallest current path, tagging ties.
    fn min(&mut self) -> Option<usize> {
        let mut min_ix: Option<usize> = None;
        for i in 0..self.trees.len() {
            if self.trees[i].eof() {
                continue;
            }
            match min_ix {
                None => {
                    self.trees[i].matches = Some(i);
                    min_ix = Some(i);
                }
                Some(m) => {
                    let cmp = self.trees[i].path_compare(&self.trees[m]);
                    if cmp < 0 {
                        self.trees[i].matches = Some(i);
                        min_ix = Some(i);
                    } else if cmp == 0 {
                        self.trees[i].matches = Some(m);
                    }
                }
            }
        }
        min_ix
    }

    /// Advances every iterator that contributed the current path.
    fn pop_entries_equal(&mut self) -> Result<(), ObjectError> {
        let head = self.current_head;
        for t in &mut self.trees {
            if t.matches == Some(head) {
                t.advance(1)?;
                t.matches = None;
            }
        }
        Ok(())
    }

    /// Skips every iterator that contributed the current path.
    fn skip_entries_equal(&mut self) -> Result<(), ObjectError> {
        let head = self.current_head;
        for t in &mut self.trees {
            if t.matches == Some(head) {
                t.skip()?;
                t.matches = None;
            }
        }
        Ok(())
    }

    /// Restores every slot to its parent iterator and recomputes the head
    /// from the self-tags left by the terminal `min` of the exited level.
    fn exit_subtree(&mut self) {
        self.depth -= 1;
        for t in &mut self.trees {
            let parent = t.parent.take().expect("depth > 0 implies parents");
            *t = *parent;
        }

        let mut min_ref: Option<usize> = None;
        for i in 0..self.trees.len() {
            if self.trees[i].matches != Some(i) {
                continue;
            }
            match min_ref {
                None => min_ref = Some(i),
                Some(m) => {
                    if self.trees[i].path_compare(&self.trees[m]) < 0 {
                        min_ref = Some(i);
                    }
                }
            }
        }
        debug_assert!(min_ref.is_some(), "subtree exit requires a tagged parent");
        self.current_head = min_ref.unwrap_or(0);
    }
}

impl std::fmt::Debug for TreeWalk<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalk")
            .field("trees", &self.trees.len())
            .field("depth", &self.depth)
            .field("recursive", &self.recursive)
            .finish()
    }
}
