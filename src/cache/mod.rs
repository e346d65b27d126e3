//! Bounded window cache over pack files.
//!
//! The cache keeps at most `packed_git_limit` bytes of pack data resident
//! as fixed-size windows, each covering `[id * W, id * W + size)` of one
//! pack. Callers read through `WindowCursor`s, which pin at most one
//! window at a time; a pinned window's bytes stay valid even if the cache
//! index drops the window under pressure.
//!
//! Eviction has two drivers, applied in order on every miss: draining the
//! advise-drop queue (externally signalled memory pressure), then an LRU
//! scan while the byte or window-count bound would be exceeded.
//!
//! A separate, independently bounded cache holds fully inflated delta-base
//! payloads keyed by pack and offset.

pub mod config;
pub mod cursor;
pub mod delta_base;
pub mod pack;
pub mod window;
pub mod window_cache;

pub use config::{ConfigError, WindowCacheConfig};
pub use cursor::WindowCursor;
pub use delta_base::DeltaBaseCache;
pub use pack::{FilePack, PackSource};
pub use window::ByteWindow;
pub use window_cache::{WindowCache, WindowCacheStats};
