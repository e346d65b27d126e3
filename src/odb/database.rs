//! Object-database interface and the in-memory implementation.
//!
//! `ObjectDatabase` is the trait seam the walkers consume objects through.
//! `MemoryObjectDatabase` backs tests and small tools; production stores
//! (loose directories, pack readers) implement the same trait.

use std::fmt;

use ahash::AHashMap;

use super::errors::ObjectError;
use super::object_id::ObjectId;

/// Kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Commit object.
    Commit,
    /// Tree object.
    Tree,
    /// Blob object.
    Blob,
    /// Annotated tag object.
    Tag,
}

impl ObjectKind {
    /// Returns the canonical on-disk header name for this kind.
    #[must_use]
    pub const fn header_name(self) -> &'static [u8] {
        match self {
            Self::Commit => b"commit",
            Self::Tree => b"tree",
            Self::Blob => b"blob",
            Self::Tag => b"tag",
        }
    }

    /// Parses an on-disk header name.
    #[must_use]
    pub fn from_header_name(name: &[u8]) -> Option<Self> {
        match name {
            b"commit" => Some(Self::Commit),
            b"tree" => Some(Self::Tree),
            b"blob" => Some(Self::Blob),
            b"tag" => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header names are valid ASCII by construction.
        f.write_str(std::str::from_utf8(self.header_name()).unwrap_or("?"))
    }
}

/// An opened object: kind plus fully inflated payload.
///
/// The payload excludes the `<kind> <size>\0` storage header; `size` is
/// simply `bytes.len()`.
#[derive(Clone, Debug)]
pub struct ObjectData {
    /// Object kind.
    pub kind: ObjectKind,
    /// Inflated payload bytes.
    pub bytes: Vec<u8>,
}

impl ObjectData {
    /// Returns the payload size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Content-addressed object storage.
///
/// Implementations must be usable from multiple walkers concurrently;
/// `open` and `has_object` take `&self`.
pub trait ObjectDatabase {
    /// Opens an object, returning its kind and inflated payload.
    ///
    /// # Errors
    /// Returns `ObjectError::Missing` if the id is not present, `Corrupt`
    /// if storage is malformed, or `Io` on read failure.
    fn open(&self, id: &ObjectId) -> Result<ObjectData, ObjectError>;

    /// Returns true if the id is present.
    fn has_object(&self, id: &ObjectId) -> bool;

    /// Opens an object and checks its kind.
    ///
    /// # Errors
    /// `ObjectError::WrongType` if the object exists but is not `kind`;
    /// otherwise as `open`.
    fn open_kind(&self, id: &ObjectId, kind: ObjectKind) -> Result<ObjectData, ObjectError> {
        let data = self.open(id)?;
        if data.kind != kind {
            return Err(ObjectError::WrongType {
                oid: *id,
                expected: kind,
                actual: data.kind,
            });
        }
        Ok(data)
    }
}

/// In-memory object database.
///
/// Primarily for tests: ids are supplied by the caller rather than
/// computed, so fixtures can use readable synthetic ids.
#[derive(Debug, Default)]
pub struct MemoryObjectDatabase {
    objects: AHashMap<ObjectId, ObjectData>,
}

impl MemoryObjectDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object under the given id, replacing any prior value.
    pub fn insert(&mut self, id: ObjectId, kind: ObjectKind, bytes: Vec<u8>) {
        self.objects.insert(id, ObjectData { kind, bytes });
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no objects are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectDatabase for MemoryObjectDatabase {
    fn open(&self, id: &ObjectId) -> Result<ObjectData, ObjectError> {
        self.objects
            .get(id)
            .cloned()
            .ok_or(ObjectError::Missing(*id))
    }

    fn has_object(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }
}
