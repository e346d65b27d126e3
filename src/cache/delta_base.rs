//! Bounded cache of inflated delta-base payloads.
//!
//! Delta chains repeatedly re-inflate the same base objects; this cache
//! keeps recently used bases fully inflated, keyed by `(pack, offset)`.
//! It is LRU-ordered with a hard byte limit and shares no storage with
//! the window array. The cache is not thread-safe on its own; the window
//! cache wraps it in a mutex.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;

/// Cache key: the pack's stable hash plus the entry's pack offset.
type BaseKey = (u32, u64);

/// LRU cache of inflated delta bases with a byte limit.
#[derive(Debug)]
pub struct DeltaBaseCache {
    max_bytes: usize,
    resident_bytes: usize,
    entries: AHashMap<BaseKey, Arc<[u8]>>,
    recency: VecDeque<BaseKey>,
}

impl DeltaBaseCache {
    /// Creates a cache bounded by `max_bytes`.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            resident_bytes: 0,
            entries: AHashMap::new(),
            recency: VecDeque::new(),
        }
    }

    /// Returns the resident payload bytes.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    /// Looks up a base, refreshing its recency on hit.
    pub fn get(&mut self, pack_hash: u32, offset: u64) -> Option<Arc<[u8]>> {
        let key = (pack_hash, offset);
        let bytes = self.entries.get(&key)?.clone();
        self.touch(key);
        Some(bytes)
    }

    /// Stores a base, evicting least-recently-used entries to fit.
    ///
    /// Payloads larger than the whole limit are not cached.
    pub fn store(&mut self, pack_hash: u32, offset: u64, bytes: Arc<[u8]>) {
        if bytes.len() > self.max_bytes {
            return;
        }
        let key = (pack_hash, offset);
        if let Some(old) = self.entries.insert(key, bytes.clone()) {
            self.resident_bytes -= old.len();
        } else {
            self.recency.push_back(key);
        }
        self.resident_bytes += bytes.len();
        self.touch(key);
        self.evict_to(self.max_bytes);
    }

    /// Drops every base belonging to the given pack.
    pub fn purge(&mut self, pack_hash: u32) {
        self.recency.retain(|key| key.0 != pack_hash);
        let mut removed = 0;
        self.entries.retain(|key, bytes| {
            if key.0 == pack_hash {
                removed += bytes.len();
                false
            } else {
                true
            }
        });
        self.resident_bytes -= removed;
    }

    /// Applies a new byte limit immediately.
    pub fn reconfigure(&mut self, max_bytes: usize) {
        self.max_bytes = max_bytes;
        self.evict_to(max_bytes);
    }

    /// Moves `key` to the most-recent position.
    fn touch(&mut self, key: BaseKey) {
        if let Some(pos) = self.recency.iter().position(|k| *k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key);
    }

    fn evict_to(&mut self, limit: usize) {
        while self.resident_bytes > limit {
            let Some(key) = self.recency.pop_front() else {
                break;
            };
            if let Some(bytes) = self.entries.remove(&key) {
                self.resident_bytes -= bytes.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(len: usize, fill: u8) -> Arc<[u8]> {
        vec![fill; len].into()
    }

    #[test]
    fn store_and_get() {
        let mut cache = DeltaBaseCache::new(1024);
        cache.store(1, 100, base(10, 0xaa));
        let hit = cache.get(1, 100).unwrap();
        assert_eq!(hit.len(), 10);
        assert!(cache.get(1, 101).is_none());
        assert!(cache.get(2, 100).is_none());
    }

    #[test]
    fn byte_limit_evicts_lru() {
        let mut cache = DeltaBaseCache::new(100);
        cache.store(1, 0, base(40, 1));
        cache.store(1, 1, base(40, 2));
        // Refresh offset 0 so offset 1 is the LRU victim.
        cache.get(1, 0);
        cache.store(1, 2, base(40, 3));

        assert!(cache.get(1, 0).is_some());
        assert!(cache.get(1, 1).is_none());
        assert!(cache.get(1, 2).is_some());
        assert!(cache.resident_bytes() <= 100);
    }

    #[test]
    fn oversize_payload_not_cached() {
        let mut cache = DeltaBaseCache::new(16);
        cache.store(1, 0, base(17, 0));
        assert!(cache.get(1, 0).is_none());
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn purge_drops_only_matching_pack() {
        let mut cache = DeltaBaseCache::new(1024);
        cache.store(1, 0, base(8, 1));
        cache.store(2, 0, base(8, 2));
        cache.purge(1);
        assert!(cache.get(1, 0).is_none());
        assert!(cache.get(2, 0).is_some());
        assert_eq!(cache.resident_bytes(), 8);
    }

    #[test]
    fn reconfigure_lower_limit_prunes() {
        let mut cache = DeltaBaseCache::new(1024);
        for i in 0..8 {
            cache.store(1, i, base(100, i as u8));
        }
        cache.reconfigure(250);
        assert!(cache.resident_bytes() <= 250);
        // Most recent entries survive.
        assert!(cache.get(1, 7).is_some());
    }

    #[test]
    fn replacing_entry_updates_bytes() {
        let mut cache = DeltaBaseCache::new(1024);
        cache.store(1, 0, base(100, 1));
        cache.store(1, 0, base(50, 2));
        assert_eq!(cache.resident_bytes(), 50);
        assert_eq!(cache.get(1, 0).unwrap().len(), 50);
    }
}
