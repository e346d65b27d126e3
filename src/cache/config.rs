//! Window cache configuration.
//!
//! A new configuration is applied immediately by `WindowCache::reconfigure`:
//! a lowered byte limit prunes the cache to fit, while a window-size or
//! mmap-mode change evicts every window, since none are reusable under the
//! new geometry. Invalid values are rejected here, at reconfigure time,
//! never later.

use std::fmt;

use serde::{Deserialize, Serialize};

const KB: usize = 1024;
const MB: usize = 1024 * KB;

/// Minimum window size in bytes.
const MIN_WINDOW_SIZE: usize = 4 * KB;

/// Configuration for the window cache and delta-base cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCacheConfig {
    /// Maximum bytes held resident across all windows.
    pub packed_git_limit: usize,
    /// Bytes per window; a power of two, at least 4096.
    pub packed_git_window_size: usize,
    /// Memory-map windows instead of reading into heap buffers.
    pub packed_git_mmap: bool,
    /// Byte limit for the inflated delta-base cache.
    pub delta_base_cache_limit: usize,
}

impl Default for WindowCacheConfig {
    fn default() -> Self {
        Self {
            packed_git_limit: 10 * MB,
            packed_git_window_size: 8 * KB,
            packed_git_mmap: false,
            delta_base_cache_limit: 10 * MB,
        }
    }
}

impl WindowCacheConfig {
    /// Checks the configuration, returning the first violated constraint.
    ///
    /// # Errors
    /// `ConfigError` if the window size is not a power of two at least
    /// 4096, or the byte limit is below the window size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ws = self.packed_git_window_size;
        if ws < MIN_WINDOW_SIZE {
            return Err(ConfigError::WindowSizeTooSmall {
                size: ws,
                min: MIN_WINDOW_SIZE,
            });
        }
        if !ws.is_power_of_two() {
            return Err(ConfigError::WindowSizeNotPowerOfTwo { size: ws });
        }
        if self.packed_git_limit < ws {
            return Err(ConfigError::LimitBelowWindowSize {
                limit: self.packed_git_limit,
                window_size: ws,
            });
        }
        Ok(())
    }

    /// Returns `log2(packed_git_window_size)`.
    ///
    /// Only meaningful after `validate` has accepted the configuration.
    #[inline]
    #[must_use]
    pub fn window_size_shift(&self) -> u32 {
        self.packed_git_window_size.trailing_zeros()
    }
}

/// Rejected window cache configuration.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Window size below the 4 KiB floor.
    WindowSizeTooSmall { size: usize, min: usize },
    /// Window size is not a power of two.
    WindowSizeNotPowerOfTwo { size: usize },
    /// Byte limit smaller than a single window.
    LimitBelowWindowSize { limit: usize, window_size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowSizeTooSmall { size, min } => {
                write!(f, "window size too small: {size} bytes (min: {min})")
            }
            Self::WindowSizeNotPowerOfTwo { size } => {
                write!(f, "window size must be a power of two: {size}")
            }
            Self::LimitBelowWindowSize { limit, window_size } => {
                write!(
                    f,
                    "byte limit {limit} below window size {window_size}"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
