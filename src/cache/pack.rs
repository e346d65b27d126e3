//! Pack file descriptors consumed by the window cache.
//!
//! A `PackSource` exposes the minimal surface the cache needs: a length,
//! a stable hash to impose a deterministic order among descriptors, open
//! and close hooks for the backing file handle, and two read paths
//! (pread into a heap buffer, or mmap of a byte range).
//!
//! # Invariants
//! - `stable_hash` never changes for a given descriptor.
//! - `read_at` and `map_at` are only called between a successful
//!   `cache_open` and the matching `cache_close`.
//! - Pack contents are immutable while open.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use memmap2::{Mmap, MmapOptions};

/// Provider of windowed byte access over one pack file.
pub trait PackSource: Send + Sync {
    /// Total length of the pack in bytes.
    fn length(&self) -> u64;

    /// Stable integer used to order descriptors deterministically.
    fn stable_hash(&self) -> u32;

    /// Opens the backing file handle.
    ///
    /// Called by the cache when the first window for this pack loads.
    ///
    /// # Errors
    /// `io::Error` if the file cannot be opened; the cache rolls its
    /// open count back to zero on any failure.
    fn cache_open(&self) -> io::Result<()>;

    /// Releases the backing file handle.
    ///
    /// Called when the pack's last window leaves the cache.
    fn cache_close(&self);

    /// Reads `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Errors
    /// `io::Error` on short or failed reads.
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> io::Result<()>;

    /// Memory-maps `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// `io::Error` if the mapping fails.
    fn map_at(&self, offset: u64, len: usize) -> io::Result<Mmap>;
}

/// File-backed pack source.
///
/// The file handle is opened lazily in `cache_open` and dropped in
/// `cache_close`, so an idle pack holds no descriptor.
#[derive(Debug)]
pub struct FilePack {
    path: PathBuf,
    length: u64,
    hash: u32,
    file: Mutex<Option<File>>,
}

/// Process-local counter mixed into pack hashes so two packs with equal
/// paths still order deterministically.
static PACK_SEQ: AtomicU32 = AtomicU32::new(1);

impl FilePack {
    /// Creates a descriptor for a pack file on disk.
    ///
    /// The length is captured once at creation; packs are immutable while
    /// served by the cache.
    ///
    /// # Errors
    /// `io::Error` if the file's metadata cannot be read.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let length = path.metadata()?.len();
        let hash = hash_path(&path).wrapping_mul(31) ^ PACK_SEQ.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            path,
            length,
            hash,
            file: Mutex::new(None),
        })
    }

    /// Returns the pack's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackSource for FilePack {
    fn length(&self) -> u64 {
        self.length
    }

    fn stable_hash(&self) -> u32 {
        self.hash
    }

    fn cache_open(&self) -> io::Result<()> {
        let mut guard = self.file.lock().expect("pack handle lock poisoned");
        if guard.is_none() {
            *guard = Some(File::open(&self.path)?);
        }
        Ok(())
    }

    fn cache_close(&self) {
        let mut guard = self.file.lock().expect("pack handle lock poisoned");
        *guard = None;
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> io::Result<()> {
        let guard = self.file.lock().expect("pack handle lock poisoned");
        let file = guard
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "pack not open"))?;
        read_exact_at(file, offset, dst)
    }

    fn map_at(&self, offset: u64, len: usize) -> io::Result<Mmap> {
        let guard = self.file.lock().expect("pack handle lock poisoned");
        let file = guard
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "pack not open"))?;
        // SAFETY: pack files are immutable for the lifetime of the cache;
        // the mapping never observes concurrent mutation.
        unsafe { MmapOptions::new().offset(offset).len(len).map(file) }
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, offset: u64, dst: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(dst, offset)
}

#[cfg(not(unix))]
fn read_exact_at(file: &File, offset: u64, dst: &mut [u8]) -> io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    let mut f = file.try_clone()?;
    f.seek(SeekFrom::Start(offset))?;
    f.read_exact(dst)
}

/// FNV-1a over the path bytes; stability matters, distribution does not.
fn hash_path(path: &Path) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in path.to_string_lossy().as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
