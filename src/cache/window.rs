//! Byte windows over pack files.
//!
//! A window is an immutable view of the contiguous byte region
//! `[id * W, id * W + size)` of one pack, where `W` is the cache's global
//! window size. The payload is either a memory mapping or a heap buffer
//! filled by pread, selected by configuration. Cloning a window clones an
//! `Arc` over the payload; the bytes are released back to the OS when the
//! last clone drops.

use std::sync::Arc;

use memmap2::Mmap;

/// Window payload storage.
#[derive(Debug)]
enum WindowBytes {
    /// Memory-mapped region.
    Mapped(Mmap),
    /// Heap buffer filled by positional reads.
    Heap(Box<[u8]>),
}

impl WindowBytes {
    #[inline]
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Heap(buf) => buf,
        }
    }
}

/// An immutable byte window over one pack.
///
/// Cheap to clone; clones share the payload. A clone held by a cursor
/// keeps the bytes valid regardless of what the cache index does.
#[derive(Clone, Debug)]
pub struct ByteWindow {
    start: u64,
    bytes: Arc<WindowBytes>,
}

impl ByteWindow {
    /// Wraps a memory mapping covering `[start, start + map.len())`.
    #[must_use]
    pub fn mapped(start: u64, map: Mmap) -> Self {
        Self {
            start,
            bytes: Arc::new(WindowBytes::Mapped(map)),
        }
    }

    /// Wraps a heap buffer covering `[start, start + buf.len())`.
    #[must_use]
    pub fn heap(start: u64, buf: Box<[u8]>) -> Self {
        Self {
            start,
            bytes: Arc::new(WindowBytes::Heap(buf)),
        }
    }

    /// Absolute pack offset of the first byte.
    #[inline]
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Window size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.as_slice().len()
    }

    /// Absolute pack offset one past the last byte.
    #[inline]
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.size() as u64
    }

    /// Returns true if `position` falls inside this window.
    #[inline]
    #[must_use]
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position < self.end()
    }

    /// Copies bytes starting at absolute `position` into `dst`.
    ///
    /// Returns the number of bytes copied, bounded by the window end.
    /// Returns 0 if `position` is outside the window.
    pub fn copy(&self, position: u64, dst: &mut [u8]) -> usize {
        if !self.contains(position) {
            return 0;
        }
        let data = self.bytes.as_slice();
        let off = (position - self.start) as usize;
        let n = dst.len().min(data.len() - off);
        dst[..n].copy_from_slice(&data[off..off + n]);
        n
    }

    /// Returns the window bytes from absolute `position` to the end.
    ///
    /// Returns an empty slice if `position` is outside the window.
    #[must_use]
    pub fn slice_from(&self, position: u64) -> &[u8] {
        if !self.contains(position) {
            return &[];
        }
        &self.bytes.as_slice()[(position - self.start) as usize..]
    }

    /// Returns true if only the cache index references this payload.
    ///
    /// A window with outstanding cursor clones is pinned; the advise-drop
    /// path must not clear it.
    #[must_use]
    pub(crate) fn unpinned(&self) -> bool {
        Arc::strong_count(&self.bytes) == 1
    }
}
