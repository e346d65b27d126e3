//! Tree entry modes.
//!
//! Git uses a subset of Unix mode bits; the high four bits encode the
//! object type. Classification is mask-based so historical non-canonical
//! blob modes (100664, 100600) are handled by the type bits and the
//! executable bit rather than exact matching. Mode 0 is the missing-entry
//! sentinel reported by the walker for trees that do not contain the
//! current path.

use crate::odb::ObjectKind;

/// Type bits mask.
const S_IFMT: u32 = 0o170000;

/// Classified mode of a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Subdirectory (mode 040000).
    Tree,
    /// Regular file (mode 100644 or similar without the execute bit).
    RegularFile,
    /// Executable file (mode 100755 or similar with the execute bit).
    ExecutableFile,
    /// Symbolic link (mode 120000).
    Symlink,
    /// Submodule link (mode 160000).
    Gitlink,
    /// No entry at the current path (raw mode 0).
    Missing,
}

impl FileMode {
    /// Canonical mode bits for trees.
    pub const TREE_BITS: u32 = 0o040000;
    /// Canonical mode bits for regular files.
    pub const REGULAR_FILE_BITS: u32 = 0o100644;
    /// Canonical mode bits for executable files.
    pub const EXECUTABLE_FILE_BITS: u32 = 0o100755;
    /// Canonical mode bits for symlinks.
    pub const SYMLINK_BITS: u32 = 0o120000;
    /// Canonical mode bits for gitlinks.
    pub const GITLINK_BITS: u32 = 0o160000;

    /// Classifies raw mode bits.
    #[must_use]
    pub const fn from_bits(mode: u32) -> Self {
        if mode == 0 {
            return Self::Missing;
        }
        match mode & S_IFMT {
            0o040000 => Self::Tree,
            0o120000 => Self::Symlink,
            0o160000 => Self::Gitlink,
            0o100000 => {
                if (mode & 0o100) != 0 {
                    Self::ExecutableFile
                } else {
                    Self::RegularFile
                }
            }
            _ => Self::Missing,
        }
    }

    /// Returns the canonical bit pattern for this mode.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Tree => Self::TREE_BITS,
            Self::RegularFile => Self::REGULAR_FILE_BITS,
            Self::ExecutableFile => Self::EXECUTABLE_FILE_BITS,
            Self::Symlink => Self::SYMLINK_BITS,
            Self::Gitlink => Self::GITLINK_BITS,
            Self::Missing => 0,
        }
    }

    /// Returns true if raw mode bits denote a tree.
    #[inline]
    #[must_use]
    pub const fn is_tree_bits(mode: u32) -> bool {
        mode & S_IFMT == 0o040000
    }

    /// Returns the object kind a tree entry of this mode points at.
    ///
    /// `Missing` has no referent; gitlinks point at commits in another
    /// repository.
    #[must_use]
    pub const fn object_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Tree => Some(ObjectKind::Tree),
            Self::RegularFile | Self::ExecutableFile | Self::Symlink => Some(ObjectKind::Blob),
            Self::Gitlink => Some(ObjectKind::Commit),
            Self::Missing => None,
        }
    }
}
