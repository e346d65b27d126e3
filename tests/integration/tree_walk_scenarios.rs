//! Tree walker scenarios across iterator shapes.
//!
//! Exercises diffs between canonical tree objects and a loaded directory
//! cache, recursion round-trips, and filter pruning over a deeper tree.

use std::sync::Arc;

use packwalk_rs::odb::{MemoryObjectDatabase, ObjectId, ObjectKind};
use packwalk_rs::treewalk::{
    DirCache, DirCacheEntry, FileMode, TreeFilter, TreeIterator, TreeWalk,
};

fn oid(fill: u8) -> ObjectId {
    ObjectId::from_raw([fill; 20])
}

fn record(mode: &str, name: &str, id: &ObjectId) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(mode.as_bytes());
    out.push(b' ');
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(id.as_bytes());
    out
}

fn insert_tree(db: &mut MemoryObjectDatabase, id: ObjectId, records: Vec<Vec<u8>>) {
    db.insert(id, ObjectKind::Tree, records.concat());
}

/// Builds a three-level tree: a, d/e/f, d/g, z.
fn deep_tree(db: &mut MemoryObjectDatabase) -> ObjectId {
    let e = oid(0x20);
    insert_tree(db, e, vec![record("100644", "f", &oid(1))]);
    let d = oid(0x21);
    insert_tree(
        db,
        d,
        vec![record("40000", "e", &e), record("100644", "g", &oid(2))],
    );
    let root = oid(0x22);
    insert_tree(
        db,
        root,
        vec![
            record("100644", "a", &oid(3)),
            record("40000", "d", &d),
            record("100644", "z", &oid(4)),
        ],
    );
    root
}

#[test]
fn recursive_walk_yields_flat_path_set() {
    let mut db = MemoryObjectDatabase::new();
    let root = deep_tree(&mut db);

    let mut walk = TreeWalk::new(&db);
    walk.set_recursive(true);
    walk.reset_trees(&[root]).unwrap();

    let mut paths = Vec::new();
    while walk.next().unwrap() {
        paths.push(walk.path_string());
    }
    assert_eq!(paths, ["a", "d/e/f", "d/g", "z"]);
}

#[test]
fn index_vs_tree_diff() {
    // The index and the committed tree disagree on d/g and z only.
    let mut db = MemoryObjectDatabase::new();
    let root = deep_tree(&mut db);

    let mut builder = DirCache::builder();
    builder
        .add(DirCacheEntry::new("a", FileMode::REGULAR_FILE_BITS, oid(3)))
        .unwrap();
    builder
        .add(DirCacheEntry::new(
            "d/e/f",
            FileMode::REGULAR_FILE_BITS,
            oid(1),
        ))
        .unwrap();
    builder
        .add(DirCacheEntry::new(
            "d/g",
            FileMode::REGULAR_FILE_BITS,
            oid(0x55),
        ))
        .unwrap();
    // "z" deleted from the index.
    let index = Arc::new(builder.finish().unwrap());

    let mut walk = TreeWalk::new(&db);
    walk.set_recursive(true);
    walk.reset();
    walk.add_tree(&root).unwrap();
    walk.add_iterator(TreeIterator::for_dir_cache(index));

    let mut changed = Vec::new();
    while walk.next().unwrap() {
        if !walk.id_equal(0, 1) {
            changed.push((walk.path_string(), walk.raw_mode(0), walk.raw_mode(1)));
        }
    }
    assert_eq!(changed.len(), 2);
    assert_eq!(changed[0].0, "d/g");
    assert!(changed[0].1 != 0 && changed[0].2 != 0);
    assert_eq!(changed[1].0, "z");
    assert_eq!(changed[1].2, 0);
}

#[test]
fn dircache_walk_matches_equivalent_tree() {
    // A dircache iterator and a canonical iterator over equivalent
    // content agree on every path and id.
    let mut db = MemoryObjectDatabase::new();
    let sub = oid(0x30);
    insert_tree(&mut db, sub, vec![record("100644", "x", &oid(7))]);
    let root = oid(0x31);
    insert_tree(
        &mut db,
        root,
        vec![record("100644", "a", &oid(6)), record("40000", "d", &sub)],
    );

    let mut builder = DirCache::builder();
    builder
        .add(DirCacheEntry::new("a", FileMode::REGULAR_FILE_BITS, oid(6)))
        .unwrap();
    builder
        .add(DirCacheEntry::new(
            "d/x",
            FileMode::REGULAR_FILE_BITS,
            oid(7),
        ))
        .unwrap();
    let index = Arc::new(builder.finish().unwrap());

    let mut walk = TreeWalk::new(&db);
    walk.set_recursive(true);
    walk.add_tree(&root).unwrap();
    walk.add_iterator(TreeIterator::for_dir_cache(index));

    while walk.next().unwrap() {
        assert!(
            walk.id_equal(0, 1),
            "mismatch at {}",
            walk.path_string()
        );
    }
}

#[test]
fn filter_skips_unrelated_branches() {
    let mut db = MemoryObjectDatabase::new();
    let root = deep_tree(&mut db);

    let mut walk = TreeWalk::new(&db);
    let filter = TreeFilter::paths(["d/e"]);
    walk.set_recursive(filter.should_be_recursive());
    walk.set_filter(filter);
    walk.reset_trees(&[root]).unwrap();

    let mut paths = Vec::new();
    while walk.next().unwrap() {
        paths.push(walk.path_string());
    }
    assert_eq!(paths, ["d/e/f"]);
}
