//! Error types for object access.
//!
//! One enum covers the failure modes every object consumer shares:
//! an id that is not present, an id that names the wrong kind of object,
//! a payload that does not parse, and plain I/O failure. Low-level I/O
//! errors are preserved as the source; parser failures are wrapped with
//! the offending id.

use std::fmt;
use std::io;

use super::database::ObjectKind;
use super::object_id::ObjectId;

/// Errors from opening, reading, or parsing objects.
#[derive(Debug)]
#[non_exhaustive]
pub enum ObjectError {
    /// The id is not present in the database.
    Missing(ObjectId),
    /// The id is present but names a different kind of object.
    WrongType {
        oid: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },
    /// The object payload failed to parse.
    Corrupt {
        oid: ObjectId,
        detail: &'static str,
    },
    /// Reading or opening backing storage failed.
    Io(io::Error),
}

impl ObjectError {
    /// Wraps a parser failure with the offending id.
    #[inline]
    pub const fn corrupt(oid: ObjectId, detail: &'static str) -> Self {
        Self::Corrupt { oid, detail }
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(oid) => write!(f, "missing object {oid}"),
            Self::WrongType {
                oid,
                expected,
                actual,
            } => write!(f, "object {oid} is a {actual}, expected {expected}"),
            Self::Corrupt { oid, detail } => write!(f, "corrupt object {oid}: {detail}"),
            Self::Io(err) => write!(f, "object I/O error: {err}"),
        }
    }
}

impl std::error::Error for ObjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ObjectError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
