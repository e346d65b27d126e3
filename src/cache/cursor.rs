//! Per-caller window pins.
//!
//! A cursor pins at most one window: the clone it holds keeps that
//! window's bytes valid while the caller decodes through it, without
//! blocking the cache index from evicting the window under pressure.
//! Cursor state is single-threaded; one cursor belongs to one caller.

use std::io;
use std::sync::Arc;

use flate2::{Decompress, FlushDecompress, Status};

use super::pack::PackSource;
use super::window::ByteWindow;
use super::window_cache::WindowCache;

/// Scratch buffer size for streaming inflation.
const INFLATE_BUF_BYTES: usize = 16 * 1024;

/// A caller's pin over exactly one window.
#[derive(Default)]
pub struct WindowCursor {
    window: Option<ByteWindow>,
    pack_key: usize,
}

impl WindowCursor {
    /// Creates an unpinned cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the cursor currently pins a window.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.window.is_some()
    }

    /// Drops the pin, making the window eligible for reclamation again.
    pub fn release(&mut self) {
        self.window = None;
        self.pack_key = 0;
    }

    /// Installs a pin. Called by the cache on a successful `get`.
    pub(crate) fn pin(&mut self, window: ByteWindow, pack_key: usize) {
        self.window = Some(window);
        self.pack_key = pack_key;
    }

    /// Returns the pinned window if it belongs to `pack_key` and covers
    /// `position`.
    fn pinned_at(&self, pack_key: usize, position: u64) -> Option<&ByteWindow> {
        match &self.window {
            Some(w) if self.pack_key == pack_key && w.contains(position) => Some(w),
            _ => None,
        }
    }

    /// Copies up to `dst.len()` bytes from `position` of `pack`.
    ///
    /// Re-pins as the copy crosses window boundaries. Returns the number
    /// of bytes copied, which is short only at end of pack.
    ///
    /// # Errors
    /// `io::Error` if a needed window cannot be loaded.
    pub fn copy(
        &mut self,
        cache: &WindowCache,
        pack: &Arc<dyn PackSource>,
        mut position: u64,
        dst: &mut [u8],
    ) -> io::Result<usize> {
        let key = WindowCache::pack_key(pack);
        let length = pack.length();
        let mut copied = 0;

        while copied < dst.len() && position < length {
            if self.pinned_at(key, position).is_none() {
                cache.get(self, pack, position)?;
            }
            let window = self.window.as_ref().expect("get pinned a window");
            let n = window.copy(position, &mut dst[copied..]);
            debug_assert!(n > 0, "pinned window must cover position");
            position += n as u64;
            copied += n;
        }
        Ok(copied)
    }

    /// Inflates one zlib stream starting at `position` of `pack`.
    ///
    /// Output is appended to `out`; returns the number of bytes produced.
    /// The stream may span any number of windows.
    ///
    /// # Errors
    /// `io::Error` with `InvalidData` if the stream is corrupt or runs
    /// past the end of the pack, or the window-load error otherwise.
    pub fn inflate(
        &mut self,
        cache: &WindowCache,
        pack: &Arc<dyn PackSource>,
        mut position: u64,
        out: &mut Vec<u8>,
    ) -> io::Result<usize> {
        let key = WindowCache::pack_key(pack);
        let length = pack.length();
        let mut de = Decompress::new(true);
        let mut buf = [0u8; INFLATE_BUF_BYTES];
        let start_len = out.len();

        loop {
            if position >= length {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "zlib stream runs past end of pack",
                ));
            }
            if self.pinned_at(key, position).is_none() {
                cache.get(self, pack, position)?;
            }
            let window = self.window.as_ref().expect("get pinned a window");
            let input = window.slice_from(position);

            let before_in = de.total_in();
            let before_out = de.total_out();
            let status = de
                .decompress(input, &mut buf, FlushDecompress::None)
                .map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "corrupt zlib stream")
                })?;
            let consumed = (de.total_in() - before_in) as usize;
            let produced = (de.total_out() - before_out) as usize;
            position += consumed as u64;
            out.extend_from_slice(&buf[..produced]);

            match status {
                Status::StreamEnd => return Ok(out.len() - start_len),
                Status::Ok | Status::BufError => {
                    // The pinned window always supplies input and the
                    // scratch buffer always has space; zero progress
                    // means the stream is broken.
                    if consumed == 0 && produced == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "stalled zlib stream",
                        ));
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for WindowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCursor")
            .field("pinned", &self.window.is_some())
            .finish()
    }
}
