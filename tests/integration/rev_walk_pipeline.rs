//! Revision pipeline scenarios over synthetic commit graphs.
//!
//! Builds commit graphs in a memory object database and checks the
//! interaction of sort options, uninteresting caps, boundary emission,
//! and path-limited history rewriting.

use packwalk_rs::odb::{MemoryObjectDatabase, ObjectId, ObjectKind};
use packwalk_rs::revwalk::{RevFilter, RevSort, RevWalk, RevWalkError};
use packwalk_rs::treewalk::TreeFilter;

fn oid(fill: u8) -> ObjectId {
    ObjectId::from_raw([fill; 20])
}

fn tree_with_file(db: &mut MemoryObjectDatabase, id: ObjectId, name: &str, blob: ObjectId) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"100644 ");
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(blob.as_bytes());
    db.insert(id, ObjectKind::Tree, bytes);
}

struct GraphBuilder {
    db: MemoryObjectDatabase,
    next: u8,
}

impl GraphBuilder {
    fn new() -> Self {
        let mut db = MemoryObjectDatabase::new();
        tree_with_file(&mut db, oid(0xee), "f", oid(0xef));
        Self { db, next: 1 }
    }

    fn commit(&mut self, time: i64, parents: &[ObjectId]) -> ObjectId {
        self.commit_with_tree(oid(0xee), time, parents)
    }

    fn commit_with_tree(&mut self, tree: ObjectId, time: i64, parents: &[ObjectId]) -> ObjectId {
        let id = oid(self.next);
        self.next += 1;
        let mut payload = Vec::new();
        payload.extend_from_slice(b"tree ");
        payload.extend_from_slice(tree.to_hex().as_bytes());
        payload.push(b'\n');
        for p in parents {
            payload.extend_from_slice(b"parent ");
            payload.extend_from_slice(p.to_hex().as_bytes());
            payload.push(b'\n');
        }
        payload.extend_from_slice(
            format!("author A U Thor <a@example.com> {time} +0000\n").as_bytes(),
        );
        payload.extend_from_slice(
            format!("committer C O Mitter <c@example.com> {time} +0000\n").as_bytes(),
        );
        payload.extend_from_slice(b"\nmsg\n");
        self.db.insert(id, ObjectKind::Commit, payload);
        id
    }
}

fn collect(walk: &mut RevWalk<'_>) -> Vec<ObjectId> {
    let mut out = Vec::new();
    while let Some(c) = walk.next().unwrap() {
        out.push(c.id());
    }
    out
}

/// Diamond with side branches:
///
/// ```text
///       m (600)
///      / \
///  l2(500) r (300)
///     |    |
///  l1(400) |
///      \  /
///      base (200)
///        |
///      root (100)
/// ```
fn diamond(g: &mut GraphBuilder) -> (ObjectId, ObjectId, ObjectId, ObjectId, ObjectId, ObjectId) {
    let root = g.commit(100, &[]);
    let base = g.commit(200, &[root]);
    let l1 = g.commit(400, &[base]);
    let l2 = g.commit(500, &[l1]);
    let r = g.commit(300, &[base]);
    let m = g.commit(600, &[l2, r]);
    (root, base, l1, l2, r, m)
}

#[test]
fn date_order_walks_whole_diamond() {
    let mut g = GraphBuilder::new();
    let (root, base, l1, l2, r, m) = diamond(&mut g);

    let mut walk = RevWalk::new(&g.db);
    walk.sort(RevSort::CommitTimeDesc);
    walk.mark_start(m).unwrap();
    assert_eq!(collect(&mut walk), vec![m, l2, l1, r, base, root]);
}

#[test]
fn topo_reverse_combination() {
    let mut g = GraphBuilder::new();
    let (root, base, _l1, _l2, _r, m) = diamond(&mut g);

    let mut walk = RevWalk::new(&g.db);
    walk.sort(RevSort::Topo);
    walk.sort_add(RevSort::CommitTimeDesc, true);
    walk.sort_add(RevSort::Reverse, true);
    walk.mark_start(m).unwrap();
    let ids = collect(&mut walk);

    // Reversed topological order: every parent precedes its children.
    assert_eq!(ids.first(), Some(&root));
    assert_eq!(ids.last(), Some(&m));
    let pos = |id: ObjectId| ids.iter().position(|&x| x == id).unwrap();
    assert!(pos(base) < pos(m));
    assert!(pos(root) < pos(base));
}

#[test]
fn uninteresting_branch_with_boundary() {
    let mut g = GraphBuilder::new();
    let (_root, base, l1, l2, r, m) = diamond(&mut g);

    let mut walk = RevWalk::new(&g.db);
    walk.sort(RevSort::CommitTimeDesc);
    walk.sort_add(RevSort::Boundary, true);
    walk.mark_start(m).unwrap();
    walk.mark_uninteresting(r).unwrap();

    let mut interesting = Vec::new();
    let mut boundary = Vec::new();
    while let Some(c) = walk.next().unwrap() {
        if c.is_boundary() {
            boundary.push(c.id());
        } else {
            interesting.push(c.id());
        }
    }

    // base and root sit behind the uninteresting side branch.
    assert_eq!(interesting, vec![m, l2, l1]);
    // Every boundary commit is uninteresting and the parent of an
    // emitted interesting commit.
    for b in &boundary {
        assert!([r, base].contains(b));
    }
    assert!(boundary.contains(&r));
}

#[test]
fn rev_filter_composition_over_graph() {
    let mut g = GraphBuilder::new();
    let (root, base, l1, l2, r, m) = diamond(&mut g);

    let mut walk = RevWalk::new(&g.db);
    walk.sort(RevSort::CommitTimeDesc);
    walk.set_rev_filter(RevFilter::CommitTimeAfter(350));
    walk.mark_start(m).unwrap();
    let ids = collect(&mut walk);
    assert_eq!(ids, vec![m, l2, l1]);
    assert!(!ids.contains(&r) && !ids.contains(&base) && !ids.contains(&root));
}

#[test]
fn merge_base_with_tree_filter_is_illegal_state() {
    let mut g = GraphBuilder::new();
    let (_root, _base, _l1, l2, r, _m) = diamond(&mut g);

    let mut walk = RevWalk::new(&g.db);
    walk.set_rev_filter(RevFilter::MergeBase);
    walk.set_tree_filter(TreeFilter::paths(["f"]));
    walk.mark_start(l2).unwrap();
    walk.mark_start(r).unwrap();
    assert!(matches!(
        walk.next(),
        Err(RevWalkError::IllegalState { .. })
    ));
}

#[test]
fn merge_base_across_diamond() {
    let mut g = GraphBuilder::new();
    let (_root, base, _l1, l2, r, _m) = diamond(&mut g);

    let mut walk = RevWalk::new(&g.db);
    walk.set_rev_filter(RevFilter::MergeBase);
    walk.mark_start(l2).unwrap();
    walk.mark_start(r).unwrap();
    assert_eq!(collect(&mut walk), vec![base]);
}

#[test]
fn path_limited_walk_skips_untouching_commits() {
    let mut g = GraphBuilder::new();

    let blob_a = oid(0xd0);
    let blob_b = oid(0xd1);
    let t1 = oid(0xc1);
    let t2 = oid(0xc2);
    tree_with_file(&mut g.db, t1, "doc", blob_a);
    tree_with_file(&mut g.db, t2, "doc", blob_b);

    // doc changes at c1 and c3; c2 keeps the same tree as c1.
    let c1 = g.commit_with_tree(t1, 100, &[]);
    let c2 = g.commit_with_tree(t1, 200, &[c1]);
    let c3 = g.commit_with_tree(t2, 300, &[c2]);

    let mut walk = RevWalk::new(&g.db);
    walk.sort(RevSort::CommitTimeDesc);
    walk.set_tree_filter(TreeFilter::paths(["doc"]));
    walk.mark_start(c3).unwrap();

    let ids = collect(&mut walk);
    assert_eq!(ids, vec![c3, c1]);
    // The surviving edge splices around the rewritten commit.
    assert_eq!(walk.parent_ids(&c3).unwrap(), vec![c1]);
}
