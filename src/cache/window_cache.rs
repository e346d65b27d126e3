//! The bounded window cache.
//!
//! Windows are kept in a dense array sorted by `(provider hash, window id)`
//! where `id = offset >> log2(window_size)`. Lookup is binary search;
//! insertion reuses the search's insertion point. Every mutation of the
//! index, the per-pack open counts, and the configuration runs under one
//! mutex; reads through an already-pinned window bypass the lock entirely.
//!
//! Eviction per miss, in order:
//! 1. Drain the advise-drop queue. Each advised window still present in
//!    the index and not pinned by a cursor is removed and its pack's open
//!    count decremented, closing the pack at zero unless it is the pack
//!    about to be read.
//! 2. LRU pressure: while the window count or resident byte bound would be
//!    exceeded, evict the window with the smallest `last_accessed` stamp
//!    (linear scan; the working set is a few hundred windows).
//!
//! # Invariants
//! - `resident_bytes` equals the sum of live window sizes and never
//!   exceeds `packed_git_limit` after `get` returns.
//! - A pack with a zero open count has no live windows in the index.
//! - Windows are installed strictly after `cache_open` succeeds, so a
//!   failed open has no index entry to roll back; only the open count is
//!   restored.

use std::io;
use std::sync::{Arc, Mutex, OnceLock};

use ahash::AHashMap;
use crossbeam_queue::SegQueue;

use super::config::{ConfigError, WindowCacheConfig};
use super::cursor::WindowCursor;
use super::delta_base::DeltaBaseCache;
use super::pack::PackSource;
use super::window::ByteWindow;

/// Identity of a pack descriptor while it is alive.
pub(crate) type PackKey = usize;

/// One live window in the sorted index.
struct WindowEntry {
    pack: Arc<dyn PackSource>,
    key: PackKey,
    hash: u32,
    id: u64,
    window: ByteWindow,
    last_accessed: u64,
}

/// Mutex-protected cache state.
struct CacheState {
    config: WindowCacheConfig,
    shift: u32,
    windows: Vec<WindowEntry>,
    open_counts: AHashMap<PackKey, u32>,
    resident_bytes: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    drained: u64,
}

/// Snapshot of cache counters and occupancy.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowCacheStats {
    /// Live windows in the index.
    pub open_windows: usize,
    /// Sum of live window sizes in bytes.
    pub resident_bytes: usize,
    /// Packs with a non-zero open count.
    pub open_packs: usize,
    /// Lookups served from the index.
    pub hits: u64,
    /// Lookups that loaded a window.
    pub misses: u64,
    /// Windows removed by LRU pressure.
    pub evictions: u64,
    /// Windows removed by the advise-drop drain.
    pub drained: u64,
}

/// Bounded pool of byte windows over pack files.
///
/// Prefer one cache per repository handle; `WindowCache::global()` is the
/// process-wide compatibility shim for callers that expect a singleton.
pub struct WindowCache {
    state: Mutex<CacheState>,
    advised: SegQueue<(PackKey, u64)>,
    delta_bases: Mutex<DeltaBaseCache>,
}

static GLOBAL: OnceLock<WindowCache> = OnceLock::new();

impl WindowCache {
    /// Creates a cache with the given configuration.
    ///
    /// # Errors
    /// `ConfigError` if the configuration is invalid.
    pub fn new(config: WindowCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(CacheState {
                shift: config.window_size_shift(),
                config,
                windows: Vec::new(),
                open_counts: AHashMap::new(),
                resident_bytes: 0,
                clock: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                drained: 0,
            }),
            advised: SegQueue::new(),
            delta_bases: Mutex::new(DeltaBaseCache::new(config.delta_base_cache_limit)),
        })
    }

    /// Returns the process-wide cache with default configuration.
    pub fn global() -> &'static WindowCache {
        GLOBAL.get_or_init(|| {
            WindowCache::new(WindowCacheConfig::default()).expect("default config is valid")
        })
    }

    /// Identity key for a pack descriptor.
    #[inline]
    pub(crate) fn pack_key(pack: &Arc<dyn PackSource>) -> PackKey {
        Arc::as_ptr(pack) as *const () as usize
    }

    /// Applies a new configuration immediately.
    ///
    /// A window-size or mmap-mode change evicts every window; a lowered
    /// byte limit prunes to fit before returning. The delta-base limit is
    /// forwarded to the delta-base cache.
    ///
    /// # Errors
    /// `ConfigError` if the configuration is invalid; the cache is
    /// untouched in that case.
    pub fn reconfigure(&self, config: WindowCacheConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let mut state = self.state.lock().expect("window cache lock poisoned");

        let geometry_changed = config.window_size_shift() != state.shift
            || config.packed_git_mmap != state.config.packed_git_mmap;
        let limit_lowered = config.packed_git_limit < state.config.packed_git_limit;

        state.config = config;
        state.shift = config.window_size_shift();

        if geometry_changed {
            // No existing window is usable under the new geometry.
            while let Some(entry) = state.windows.pop() {
                state.resident_bytes -= entry.window.size();
                Self::close_one(&mut state, entry.key, &entry.pack, None);
            }
        } else if limit_lowered {
            Self::release_memory(&mut state, &self.advised, None, 0);
        }
        drop(state);

        self.delta_bases
            .lock()
            .expect("delta base lock poisoned")
            .reconfigure(config.delta_base_cache_limit);
        Ok(())
    }

    /// Pins into `cursor` the window of `pack` containing `position`.
    ///
    /// On miss the window is loaded, evicting others first if the cache
    /// is at its bounds.
    ///
    /// # Errors
    /// `io::Error` if the pack cannot be opened or the window cannot be
    /// read. On open failure the pack's open count is restored to zero.
    pub fn get(
        &self,
        cursor: &mut WindowCursor,
        pack: &Arc<dyn PackSource>,
        position: u64,
    ) -> io::Result<()> {
        let key = Self::pack_key(pack);
        let mut state = self.state.lock().expect("window cache lock poisoned");
        let id = position >> state.shift;
        let hash = pack.stable_hash();

        if let Ok(idx) = Self::find(&state.windows, hash, id, key) {
            state.clock = state.clock.wrapping_add(1);
            let stamp = state.clock;
            let entry = &mut state.windows[idx];
            entry.last_accessed = stamp;
            cursor.pin(entry.window.clone(), key);
            state.hits += 1;
            return Ok(());
        }
        state.misses += 1;

        // Reserve an open count for the window about to be created.
        let count = state.open_counts.entry(key).or_insert(0);
        *count += 1;
        if *count == 1 {
            if let Err(err) = pack.cache_open() {
                state.open_counts.remove(&key);
                return Err(err);
            }
            // cache_open may itself have populated the target window;
            // retry the search so we do not map it twice.
            if let Ok(idx) = Self::find(&state.windows, hash, id, key) {
                *state.open_counts.get_mut(&key).expect("reserved above") -= 1;
                state.clock = state.clock.wrapping_add(1);
                let stamp = state.clock;
                let entry = &mut state.windows[idx];
                entry.last_accessed = stamp;
                cursor.pin(entry.window.clone(), key);
                return Ok(());
            }
        }

        let start = id << state.shift;
        let length = pack.length();
        if start >= length {
            Self::unreserve(&mut state, key, pack);
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "window offset past end of pack",
            ));
        }
        let window_size = state.config.packed_git_window_size as u64;
        let size = window_size.min(length - start) as usize;

        Self::release_memory(&mut state, &self.advised, Some(key), size);

        let window = match Self::load_window(pack, state.config.packed_git_mmap, start, size) {
            Ok(window) => window,
            Err(err) => {
                Self::unreserve(&mut state, key, pack);
                return Err(err);
            }
        };

        state.clock = state.clock.wrapping_add(1);
        let stamp = state.clock;
        let insert_at = match Self::find(&state.windows, hash, id, key) {
            Ok(_) => unreachable!("window installed while lock held"),
            Err(at) => at,
        };
        cursor.pin(window.clone(), key);
        state.resident_bytes += size;
        state.windows.insert(
            insert_at,
            WindowEntry {
                pack: Arc::clone(pack),
                key,
                hash,
                id,
                window,
                last_accessed: stamp,
            },
        );
        Ok(())
    }

    /// Drops all windows of `pack` and forces its logical close.
    pub fn purge(&self, pack: &Arc<dyn PackSource>) {
        let key = Self::pack_key(pack);
        let mut state = self.state.lock().expect("window cache lock poisoned");

        let mut removed_bytes = 0;
        state.windows.retain(|entry| {
            if entry.key == key {
                removed_bytes += entry.window.size();
                false
            } else {
                true
            }
        });
        state.resident_bytes -= removed_bytes;

        if state.open_counts.remove(&key).unwrap_or(0) > 0 {
            pack.cache_close();
        }
    }

    /// Marks a window as reclaimable under external memory pressure.
    ///
    /// The advice is processed at the next `get`; a window pinned by a
    /// cursor at drain time is left alone.
    pub fn advise_drop(&self, pack: &Arc<dyn PackSource>, position: u64) {
        self.advised.push((Self::pack_key(pack), position));
    }

    /// Returns a snapshot of counters and occupancy.
    pub fn stats(&self) -> WindowCacheStats {
        let state = self.state.lock().expect("window cache lock poisoned");
        WindowCacheStats {
            open_windows: state.windows.len(),
            resident_bytes: state.resident_bytes,
            open_packs: state.open_counts.values().filter(|&&c| c > 0).count(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            drained: state.drained,
        }
    }

    /// Looks up a cached delta base for `(pack, offset)`.
    pub fn cached_base(&self, pack: &Arc<dyn PackSource>, offset: u64) -> Option<Arc<[u8]>> {
        self.delta_bases
            .lock()
            .expect("delta base lock poisoned")
            .get(pack.stable_hash(), offset)
    }

    /// Stores an inflated delta base for `(pack, offset)`.
    pub fn store_base(&self, pack: &Arc<dyn PackSource>, offset: u64, bytes: Arc<[u8]>) {
        self.delta_bases
            .lock()
            .expect("delta base lock poisoned")
            .store(pack.stable_hash(), offset, bytes);
    }

    /// Drops cached delta bases belonging to `pack`.
    pub fn purge_bases(&self, pack: &Arc<dyn PackSource>) {
        self.delta_bases
            .lock()
            .expect("delta base lock poisoned")
            .purge(pack.stable_hash());
    }

    /// Binary search over the sorted index.
    ///
    /// `Ok` carries the matching entry's position; `Err` carries the
    /// insertion point. Packs with colliding hashes are disambiguated by
    /// probing the run of equal `(hash, id)` keys.
    fn find(windows: &[WindowEntry], hash: u32, id: u64, key: PackKey) -> Result<usize, usize> {
        let mut idx = match windows.binary_search_by(|e| (e.hash, e.id).cmp(&(hash, id))) {
            Ok(idx) => idx,
            Err(at) => return Err(at),
        };
        while idx > 0 && windows[idx - 1].hash == hash && windows[idx - 1].id == id {
            idx -= 1;
        }
        while idx < windows.len() && windows[idx].hash == hash && windows[idx].id == id {
            if windows[idx].key == key {
                return Ok(idx);
            }
            idx += 1;
        }
        Err(idx)
    }

    /// Loads one window's bytes from the pack.
    fn load_window(
        pack: &Arc<dyn PackSource>,
        mmap: bool,
        start: u64,
        size: usize,
    ) -> io::Result<ByteWindow> {
        if mmap {
            Ok(ByteWindow::mapped(start, pack.map_at(start, size)?))
        } else {
            let mut buf = vec![0u8; size].into_boxed_slice();
            pack.read_at(start, &mut buf)?;
            Ok(ByteWindow::heap(start, buf))
        }
    }

    /// Reduces memory until the configured bounds admit `will_add` more
    /// bytes: advise-drop drain first, then LRU pressure.
    fn release_memory(
        state: &mut CacheState,
        advised: &SegQueue<(PackKey, u64)>,
        will_read: Option<PackKey>,
        will_add: usize,
    ) {
        while let Some((key, position)) = advised.pop() {
            let id = position >> state.shift;
            let Some(idx) = state
                .windows
                .iter()
                .position(|e| e.key == key && e.id == id)
            else {
                continue; // already evicted by other controls
            };
            if !state.windows[idx].window.unpinned() {
                continue; // strongly referenced by a cursor
            }
            Self::remove_at(state, idx, will_read);
            state.drained += 1;
        }

        let max_windows = state.config.packed_git_limit / state.config.packed_git_window_size;
        let max_bytes = state.config.packed_git_limit;
        while state.windows.len() >= max_windows
            || (!state.windows.is_empty() && state.resident_bytes + will_add > max_bytes)
        {
            let mut oldest = 0;
            for k in 1..state.windows.len() {
                if state.windows[k].last_accessed < state.windows[oldest].last_accessed {
                    oldest = k;
                }
            }
            Self::remove_at(state, oldest, will_read);
            state.evictions += 1;
        }
    }

    /// Removes the index entry at `idx`, fixing byte and open counts.
    fn remove_at(state: &mut CacheState, idx: usize, will_read: Option<PackKey>) {
        let entry = state.windows.remove(idx);
        state.resident_bytes -= entry.window.size();
        Self::close_one(state, entry.key, &entry.pack, will_read);
    }

    /// Decrements a pack's open count, closing it at zero unless it is
    /// the pack about to be read.
    fn close_one(
        state: &mut CacheState,
        key: PackKey,
        pack: &Arc<dyn PackSource>,
        will_read: Option<PackKey>,
    ) {
        let count = state.open_counts.entry(key).or_insert(0);
        *count = count.saturating_sub(1);
        if *count == 0 {
            state.open_counts.remove(&key);
            if will_read != Some(key) {
                pack.cache_close();
            }
        }
    }

    /// Rolls back the open-count reservation of a failed window load.
    fn unreserve(state: &mut CacheState, key: PackKey, pack: &Arc<dyn PackSource>) {
        Self::close_one(state, key, pack, None);
    }
}

impl std::fmt::Debug for WindowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("WindowCache")
            .field("open_windows", &stats.open_windows)
            .field("resident_bytes", &stats.resident_bytes)
            .finish()
    }
}
