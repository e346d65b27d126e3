//! Window cache behavior against real files on disk.
//!
//! Covers the literal pressure scenario (16 KiB limit, 8 KiB windows,
//! three window loads from a 24 KiB pack), cursor reads across window
//! boundaries under both read modes, streaming inflation through the
//! cache, and the delta-base side cache.

use std::io::Write;
use std::sync::Arc;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use packwalk_rs::cache::{FilePack, PackSource, WindowCache, WindowCacheConfig, WindowCursor};

fn config(limit: usize, window: usize) -> WindowCacheConfig {
    WindowCacheConfig {
        packed_git_limit: limit,
        packed_git_window_size: window,
        packed_git_mmap: false,
        delta_base_cache_limit: 64 * 1024,
    }
}

fn pack_with_bytes(data: &[u8]) -> (NamedTempFile, Arc<dyn PackSource>) {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(data).unwrap();
    let pack: Arc<dyn PackSource> = Arc::new(FilePack::open(tmp.path()).unwrap());
    (tmp, pack)
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn pressure_scenario_evicts_oldest_window() {
    let cache = WindowCache::new(config(16 * 1024, 8 * 1024)).unwrap();
    let data = patterned(24 * 1024);
    let (_tmp, pack) = pack_with_bytes(&data);
    let mut cursor = WindowCursor::new();

    for offset in [0u64, 8192, 16384] {
        cache.get(&mut cursor, &pack, offset).unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.open_windows, 2);
    assert_eq!(stats.resident_bytes, 16384);
    assert_eq!(stats.evictions, 1);

    // The pinned window from the last get still reads valid bytes.
    let mut buf = [0u8; 8];
    let n = cursor.copy(&cache, &pack, 16384, &mut buf).unwrap();
    assert_eq!(n, 8);
    assert_eq!(&buf[..], &data[16384..16392]);
}

#[test]
fn cursor_copy_spans_windows_in_both_modes() {
    let data = patterned(40 * 1024);
    for mmap in [false, true] {
        let mut cfg = config(64 * 1024, 8 * 1024);
        cfg.packed_git_mmap = mmap;
        let cache = WindowCache::new(cfg).unwrap();
        let (_tmp, pack) = pack_with_bytes(&data);
        let mut cursor = WindowCursor::new();

        // Read a span crossing three window boundaries.
        let start = 8 * 1024 - 100;
        let mut buf = vec![0u8; 2 * 8 * 1024 + 200];
        let n = cursor.copy(&cache, &pack, start as u64, &mut buf).unwrap();
        assert_eq!(n, buf.len());
        assert_eq!(&buf[..], &data[start..start + buf.len()]);
    }
}

#[test]
fn inflate_streams_across_windows() {
    // A compressed stream starting mid-pack and spanning windows.
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&payload).unwrap();
    let stream = enc.finish().unwrap();

    let lead = 5000usize;
    let mut data = patterned(lead);
    data.extend_from_slice(&stream);
    data.extend_from_slice(&patterned(3000));

    let cache = WindowCache::new(config(32 * 1024, 4 * 1024)).unwrap();
    let (_tmp, pack) = pack_with_bytes(&data);
    let mut cursor = WindowCursor::new();

    let mut out = Vec::new();
    let produced = cursor
        .inflate(&cache, &pack, lead as u64, &mut out)
        .unwrap();
    assert_eq!(produced, payload.len());
    assert_eq!(out, payload);
}

#[test]
fn inflate_rejects_garbage() {
    let data = patterned(16 * 1024);
    let cache = WindowCache::new(config(32 * 1024, 4 * 1024)).unwrap();
    let (_tmp, pack) = pack_with_bytes(&data);
    let mut cursor = WindowCursor::new();

    let mut out = Vec::new();
    // The patterned bytes at offset 1 are not a zlib stream.
    assert!(cursor.inflate(&cache, &pack, 1, &mut out).is_err());
}

#[test]
fn delta_base_cache_round_trip() {
    let cache = WindowCache::new(config(32 * 1024, 8 * 1024)).unwrap();
    let (_tmp, pack) = pack_with_bytes(&patterned(8 * 1024));

    assert!(cache.cached_base(&pack, 100).is_none());
    let base: Arc<[u8]> = vec![9u8; 512].into();
    cache.store_base(&pack, 100, base);
    let hit = cache.cached_base(&pack, 100).unwrap();
    assert_eq!(hit.len(), 512);

    cache.purge_bases(&pack);
    assert!(cache.cached_base(&pack, 100).is_none());
}

#[test]
fn reconfigure_applies_immediately() {
    let cache = WindowCache::new(config(64 * 1024, 8 * 1024)).unwrap();
    let (_tmp, pack) = pack_with_bytes(&patterned(64 * 1024));
    let mut cursor = WindowCursor::new();
    for i in 0..8u64 {
        cache.get(&mut cursor, &pack, i * 8192).unwrap();
    }
    cursor.release();
    assert_eq!(cache.stats().resident_bytes, 64 * 1024);

    // Lowering the limit prunes at once.
    cache.reconfigure(config(32 * 1024, 8 * 1024)).unwrap();
    assert!(cache.stats().resident_bytes <= 32 * 1024);

    // Changing window geometry drops everything.
    cache.reconfigure(config(32 * 1024, 16 * 1024)).unwrap();
    assert_eq!(cache.stats().open_windows, 0);

    // Invalid configurations are rejected up front.
    assert!(cache.reconfigure(config(1024, 8 * 1024)).is_err());
    assert!(cache
        .reconfigure(WindowCacheConfig {
            packed_git_window_size: 12 * 1024,
            ..config(64 * 1024, 8 * 1024)
        })
        .is_err());
}

#[test]
fn purge_forces_logical_close() {
    let cache = WindowCache::new(config(64 * 1024, 8 * 1024)).unwrap();
    let (_tmp, pack) = pack_with_bytes(&patterned(32 * 1024));
    let mut cursor = WindowCursor::new();
    for i in 0..4u64 {
        cache.get(&mut cursor, &pack, i * 8192).unwrap();
    }
    cursor.release();

    cache.purge(&pack);
    let stats = cache.stats();
    assert_eq!(stats.open_windows, 0);
    assert_eq!(stats.open_packs, 0);

    // The pack can be read again after a purge.
    cache.get(&mut cursor, &pack, 0).unwrap();
    assert_eq!(cache.stats().open_windows, 1);
}

#[test]
fn global_cache_shim_is_usable() {
    let cache = WindowCache::global();
    let (_tmp, pack) = pack_with_bytes(&patterned(8 * 1024));
    let mut cursor = WindowCursor::new();
    let mut buf = [0u8; 16];
    let n = cursor.copy(cache, &pack, 0, &mut buf).unwrap();
    assert_eq!(n, 16);
    cursor.release();
    cache.purge(&pack);
}
