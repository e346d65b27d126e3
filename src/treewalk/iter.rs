//! Tree-entry iterators.
//!
//! An iterator is an ordered cursor over the (mode, name, object id)
//! triples of one tree, stable in Git tree order. Three shapes share one
//! struct behind a kind enum:
//!
//! - the canonical parser, streaming `<octal-mode> SP <name> NUL <id>`
//!   records of a raw tree object;
//! - the empty sentinel, at EOF from construction;
//! - the directory-cache adapter, walking the flat sorted entry array and
//!   synthesizing subtree entries from the subtree arena.
//!
//! Shared state carries the current entry (path buffer, mode bits, id
//! slot), a `parent` back-reference restored on subtree exit, and the
//! walker-owned `matches` tag used during the n-way merge.
//!
//! # Invariants
//! - `path[..path_len]` is the current full path; `path_offset` marks
//!   where this iterator's own name component begins.
//! - `parent` is `Some` exactly when the iterator sits below the walk
//!   root (depth > 0 replacement).
//! - Canonical record names are non-empty, slash-free, NUL-free.

use std::sync::Arc;

use memchr::memchr;

use crate::odb::{ObjectDatabase, ObjectError, ObjectId, ObjectKind};

use super::dircache::DirCache;
use super::file_mode::FileMode;

/// Iterator shape and shape-specific cursor state.
#[derive(Debug)]
enum IterKind {
    Canonical(CanonicalState),
    Empty,
    DirCache(DirCacheState),
}

/// Cursor over one raw tree object.
#[derive(Debug)]
struct CanonicalState {
    /// Id of the tree being parsed, for corruption reports.
    tree_oid: ObjectId,
    /// Raw tree payload (no object header).
    data: Arc<Vec<u8>>,
    /// Offset of the current record.
    ptr: usize,
    /// Offset just past the current record.
    next_ptr: usize,
}

/// Cursor over one level of a directory cache.
#[derive(Debug)]
struct DirCacheState {
    cache: Arc<DirCache>,
    /// Arena index of the subtree this cursor walks.
    tree_ix: usize,
    /// First flat position of this subtree.
    tree_start: usize,
    /// One past the last flat position of this subtree.
    tree_end: usize,
    /// Current flat position.
    ptr: usize,
    /// Next child (by position within the node's child list) to consider.
    next_child_pos: usize,
    /// Arena index of the subtree occupying the current position, if any.
    current_subtree: Option<usize>,
}

/// An ordered cursor over one tree's entries.
#[derive(Debug)]
pub struct TreeIterator {
    kind: IterKind,
    /// Path buffer; `path[..path_len]` is the current entry's full path.
    pub(crate) path: Vec<u8>,
    /// Start of this iterator's name component within `path`.
    pub(crate) path_offset: usize,
    /// Total length of the current path.
    pub(crate) path_len: usize,
    /// Raw mode bits of the current entry.
    pub(crate) mode: u32,
    /// Object id slot for the current entry.
    pub(crate) oid: ObjectId,
    /// Iterator shadowed by this one during subtree descent.
    pub(crate) parent: Option<Box<TreeIterator>>,
    /// Merge tag: index of the head iterator this entry matches.
    pub(crate) matches: Option<usize>,
}

impl TreeIterator {
    /// Creates the empty sentinel at the walk root.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: IterKind::Empty,
            path: Vec::new(),
            path_offset: 0,
            path_len: 0,
            mode: 0,
            oid: ObjectId::zero(),
            parent: None,
            matches: None,
        }
    }

    /// Creates a canonical iterator over raw tree payload bytes.
    ///
    /// # Errors
    /// `ObjectError::Corrupt` if the first record is malformed.
    pub fn from_tree_bytes(tree_oid: ObjectId, data: Vec<u8>) -> Result<Self, ObjectError> {
        let mut iter = Self {
            kind: IterKind::Canonical(CanonicalState {
                tree_oid,
                data: Arc::new(data),
                ptr: 0,
                next_ptr: 0,
            }),
            path: Vec::new(),
            path_offset: 0,
            path_len: 0,
            mode: 0,
            oid: ObjectId::zero(),
            parent: None,
            matches: None,
        };
        if !iter.eof() {
            iter.parse_current()?;
        }
        Ok(iter)
    }

    /// Opens a tree object and creates a canonical iterator over it.
    ///
    /// # Errors
    /// `Missing` if the id is absent, `WrongType` if it is not a tree,
    /// `Corrupt` on a malformed payload, `Io` on read failure.
    pub fn for_tree(odb: &dyn ObjectDatabase, id: &ObjectId) -> Result<Self, ObjectError> {
        let data = odb.open_kind(id, ObjectKind::Tree)?;
        Self::from_tree_bytes(*id, data.bytes)
    }

    /// Creates an adapter over a loaded directory cache.
    #[must_use]
    pub fn for_dir_cache(cache: Arc<DirCache>) -> Self {
        let tree_end = cache.root_tree().entry_span();
        let mut iter = Self {
            kind: IterKind::DirCache(DirCacheState {
                cache,
                tree_ix: 0,
                tree_start: 0,
                tree_end,
                ptr: 0,
                next_child_pos: 0,
                current_subtree: None,
            }),
            path: Vec::new(),
            path_offset: 0,
            path_len: 0,
            mode: 0,
            oid: ObjectId::zero(),
            parent: None,
            matches: None,
        };
        if !iter.eof() {
            iter.parse_dir_cache_entry();
        }
        iter
    }

    /// Returns true if no current entry remains.
    #[must_use]
    pub fn eof(&self) -> bool {
        match &self.kind {
            IterKind::Canonical(c) => c.ptr >= c.data.len(),
            IterKind::Empty => true,
            IterKind::DirCache(d) => d.ptr >= d.tree_end,
        }
    }

    /// Returns true if positioned on the first entry.
    #[must_use]
    pub fn first(&self) -> bool {
        match &self.kind {
            IterKind::Canonical(c) => c.ptr == 0,
            IterKind::Empty => true,
            IterKind::DirCache(d) => d.ptr == d.tree_start,
        }
    }

    /// Advances by `delta` entries.
    ///
    /// # Errors
    /// `ObjectError::Corrupt` if a canonical record is malformed.
    pub fn advance(&mut self, delta: usize) -> Result<(), ObjectError> {
        for _ in 0..delta {
            if self.eof() {
                break;
            }
            match &mut self.kind {
                IterKind::Canonical(c) => c.ptr = c.next_ptr,
                IterKind::Empty => {}
                IterKind::DirCache(d) => {
                    // A subtree position covers its whole entry span.
                    match d.current_subtree {
                        Some(sub) => d.ptr += d.cache.tree(sub).entry_span(),
                        None => d.ptr += 1,
                    }
                }
            }
            if self.eof() {
                break;
            }
            self.parse_current()?;
        }
        Ok(())
    }

    /// Skips the current entry without descending into it.
    ///
    /// # Errors
    /// As `advance`.
    pub fn skip(&mut self) -> Result<(), ObjectError> {
        self.advance(1)
    }

    /// Current entry's object id, or the zero id for the empty sentinel.
    #[inline]
    #[must_use]
    pub fn entry_object_id(&self) -> ObjectId {
        self.oid
    }

    /// Current raw mode bits.
    #[inline]
    #[must_use]
    pub fn raw_mode(&self) -> u32 {
        self.mode
    }

    /// Current full path bytes.
    #[inline]
    #[must_use]
    pub fn path_bytes(&self) -> &[u8] {
        &self.path[..self.path_len]
    }

    /// Compares two iterators' current paths in Git tree order.
    ///
    /// Directory entries compare as if their path ended with '/'; files
    /// as if it ended with NUL. Returns the usual negative/zero/positive
    /// contract.
    #[must_use]
    pub fn path_compare(&self, other: &TreeIterator) -> i32 {
        let a = self.path_bytes();
        let b = other.path_bytes();
        let min = a.len().min(b.len());
        for i in 0..min {
            let cmp = i32::from(a[i]) - i32::from(b[i]);
            if cmp != 0 {
                return cmp;
            }
        }
        if a.len() > min {
            return i32::from(a[min]) - last_path_char(other.mode);
        }
        if b.len() > min {
            return last_path_char(self.mode) - i32::from(b[min]);
        }
        last_path_char(self.mode) - last_path_char(other.mode)
    }

    /// Returns true if both iterators' current ids are byte-equal.
    #[inline]
    #[must_use]
    pub fn id_equal(&self, other: &TreeIterator) -> bool {
        self.oid == other.oid
    }

    /// Creates the iterator for the current entry's subtree.
    ///
    /// The returned iterator has no parent link; the walker installs one
    /// when it swaps iterators on subtree entry.
    ///
    /// # Errors
    /// `WrongType` if the current entry is not a tree; canonical subtree
    /// loads surface `Missing`/`Corrupt`/`Io` from the database.
    pub fn create_subtree_iterator(
        &self,
        odb: &dyn ObjectDatabase,
    ) -> Result<TreeIterator, ObjectError> {
        match &self.kind {
            IterKind::Canonical(_) | IterKind::Empty => {
                if !FileMode::is_tree_bits(self.mode) {
                    return Err(ObjectError::WrongType {
                        oid: self.oid,
                        expected: ObjectKind::Tree,
                        actual: ObjectKind::Blob,
                    });
                }
                let data = odb.open_kind(&self.oid, ObjectKind::Tree)?;
                let mut child = TreeIterator::from_tree_bytes(self.oid, data.bytes)?;
                child.init_child_path(self);
                // Re-parse so the first entry lands after the new prefix.
                if !child.eof() {
                    child.rewind_first()?;
                }
                Ok(child)
            }
            IterKind::DirCache(d) => {
                let Some(sub) = d.current_subtree else {
                    return Err(ObjectError::WrongType {
                        oid: self.oid,
                        expected: ObjectKind::Tree,
                        actual: ObjectKind::Blob,
                    });
                };
                let node = d.cache.tree(sub);
                let mut child = TreeIterator {
                    kind: IterKind::DirCache(DirCacheState {
                        cache: Arc::clone(&d.cache),
                        tree_ix: sub,
                        tree_start: node.first_entry(),
                        tree_end: node.first_entry() + node.entry_span(),
                        ptr: d.ptr,
                        next_child_pos: 0,
                        current_subtree: None,
                    }),
                    path: Vec::new(),
                    path_offset: 0,
                    path_len: 0,
                    mode: 0,
                    oid: ObjectId::zero(),
                    parent: None,
                    matches: None,
                };
                child.init_child_path(self);
                if !child.eof() {
                    child.parse_dir_cache_entry();
                }
                Ok(child)
            }
        }
    }

    /// Creates the empty sentinel standing in for a tree with no
    /// contribution at the current subtree.
    #[must_use]
    pub fn empty_child_of(parent: &TreeIterator) -> TreeIterator {
        let mut child = TreeIterator::empty();
        child.init_child_path(parent);
        child.path_len = child.path_offset;
        child
    }

    /// Seeds the path buffer with the parent's current path plus '/'.
    fn init_child_path(&mut self, parent: &TreeIterator) {
        let mut path = Vec::with_capacity(parent.path_len + 16);
        path.extend_from_slice(parent.path_bytes());
        path.push(b'/');
        self.path_offset = path.len();
        self.path = path;
    }

    /// Re-parses the first canonical record after the prefix changed.
    fn rewind_first(&mut self) -> Result<(), ObjectError> {
        if let IterKind::Canonical(c) = &mut self.kind {
            c.ptr = 0;
            c.next_ptr = 0;
        }
        self.parse_current()
    }

    /// Parses the entry at the current position into the shared fields.
    fn parse_current(&mut self) -> Result<(), ObjectError> {
        match &self.kind {
            IterKind::Canonical(_) => self.parse_canonical_entry(),
            IterKind::Empty => Ok(()),
            IterKind::DirCache(_) => {
                self.parse_dir_cache_entry();
                Ok(())
            }
        }
    }

    /// Decodes one `<mode> SP <name> NUL <id>` record.
    fn parse_canonical_entry(&mut self) -> Result<(), ObjectError> {
        let IterKind::Canonical(c) = &mut self.kind else {
            unreachable!("canonical parse on canonical iterator");
        };
        let data = &c.data[c.ptr..];
        let tree_oid = c.tree_oid;

        let space = memchr(b' ', data)
            .ok_or(ObjectError::corrupt(tree_oid, "truncated mode field"))?;
        let mode = parse_octal_mode(&data[..space])
            .ok_or(ObjectError::corrupt(tree_oid, "invalid mode digits"))?;

        let after_space = &data[space + 1..];
        let nul = memchr(0, after_space)
            .ok_or(ObjectError::corrupt(tree_oid, "truncated entry name"))?;
        let name = &after_space[..nul];
        if name.is_empty() {
            return Err(ObjectError::corrupt(tree_oid, "empty entry name"));
        }
        if memchr(b'/', name).is_some() {
            return Err(ObjectError::corrupt(tree_oid, "entry name contains slash"));
        }

        let oid_start = space + 1 + nul + 1;
        let oid_end = oid_start + ObjectId::RAW_LEN;
        if data.len() < oid_end {
            return Err(ObjectError::corrupt(tree_oid, "truncated object id"));
        }
        let oid = ObjectId::from_slice(&data[oid_start..oid_end]);
        let next_ptr = c.ptr + oid_end;
        let name_range = (c.ptr + space + 1, c.ptr + space + 1 + nul);
        c.next_ptr = next_ptr;

        let data = Arc::clone(&c.data);
        self.mode = mode;
        self.oid = oid;
        self.path.truncate(self.path_offset);
        self.path.extend_from_slice(&data[name_range.0..name_range.1]);
        self.path_len = self.path.len();
        Ok(())
    }

    /// Loads the current directory-cache position, synthesizing a subtree
    /// entry when the position opens one.
    fn parse_dir_cache_entry(&mut self) {
        let IterKind::DirCache(d) = &mut self.kind else {
            unreachable!("dircache parse on dircache iterator");
        };
        let node = d.cache.tree(d.tree_ix);

        if d.next_child_pos < node.children().len() {
            let child_ix = node.children()[d.next_child_pos];
            let child = d.cache.tree(child_ix);
            if child.first_entry() == d.ptr {
                // The current position is the first file of this subtree;
                // present the subtree instead.
                d.current_subtree = Some(child_ix);
                d.next_child_pos += 1;
                let name = child.name().to_vec();
                let oid = child.object_id();
                self.mode = FileMode::TREE_BITS;
                self.oid = oid;
                self.path.truncate(self.path_offset);
                self.path.extend_from_slice(&name);
                self.path_len = self.path.len();
                return;
            }
        }

        d.current_subtree = None;
        let entry = d.cache.entry(d.ptr);
        let mode = entry.raw_mode();
        let oid = entry.oid();
        let name = entry.path()[self.path_offset..].to_vec();
        self.mode = mode;
        self.oid = oid;
        self.path.truncate(self.path_offset);
        self.path.extend_from_slice(&name);
        self.path_len = self.path.len();
    }
}

/// Virtual terminator byte: directories end with '/', files with NUL.
#[inline]
fn last_path_char(mode: u32) -> i32 {
    if FileMode::is_tree_bits(mode) {
        i32::from(b'/')
    } else {
        0
    }
}

/// Parses ASCII octal mode digits. Seven digits bound the value well
/// below `u32::MAX`, so shift-add needs no overflow checks.
#[inline]
fn parse_octal_mode(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 7 {
        return None;
    }
    let mut mode: u32 = 0;
    for &b in bytes {
        let digit = b.wrapping_sub(b'0');
        if digit > 7 {
            return None;
        }
        mode = (mode << 3) | u32::from(digit);
    }
    Some(mode)
}
