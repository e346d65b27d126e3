//! The revision walker.
//!
//! `RevWalk` holds the commit pool, the pre-assembly pending queue, and
//! the walk configuration. The first `next` call assembles the concrete
//! generator pipeline from the configuration (see the ordered phases
//! below); until then starts, filters, and sort options may be adjusted
//! freely. Assembly failure leaves the walker unassembled so the caller
//! can correct the configuration and retry.
//!
//! Assembly phases, in order:
//! 1. Merge-base special case (rejects a non-trivial tree filter).
//! 2. Boundary coercion: dropped again when no uninteresting commit was
//!    supplied, since no boundary can exist.
//! 3. Queue choice: start-order keeps the insertion FIFO; commit-time
//!    ordering wraps it in the date queue.
//! 4. Tree filter fusion: conjoins the commit filter with the
//!    tree-rewrite filter and declares rewrite output bits.
//! 5. The pending producer.
//! 6. Rewrite: full FIFO buffering, then parent-chain compression.
//! 7. Topological sort when requested and not already provided.
//! 8. Reverse: full LIFO buffering.
//! 9. Boundary emission.

use crate::odb::{ObjectDatabase, ObjectId};
use crate::treewalk::TreeFilter;

use super::boundary::BoundaryGenerator;
use super::commit::{flags, RevCommit, WalkState};
use super::errors::RevWalkError;
use super::filter::RevFilter;
use super::generator::{output, BufferGenerator, BufferOrder, Generator};
use super::merge_base::MergeBaseGenerator;
use super::pending::PendingGenerator;
use super::queue::RevQueue;
use super::rewrite::RewriteGenerator;
use super::sort::{RevSort, RevSortSet};
use super::topo::TopoSortGenerator;

/// Walks the commit graph from a starting set.
pub struct RevWalk<'a> {
    state: WalkState<'a>,
    queue: RevQueue,
    pending: Option<Box<dyn Generator>>,
    sorting: RevSortSet,
    rev_filter: RevFilter,
    tree_filter: TreeFilter,
}

impl<'a> RevWalk<'a> {
    /// Creates a walker over the given object database.
    #[must_use]
    pub fn new(odb: &'a dyn ObjectDatabase) -> Self {
        Self {
            state: WalkState::new(odb),
            queue: RevQueue::fifo(),
            pending: None,
            sorting: RevSortSet::new(),
            rev_filter: RevFilter::All,
            tree_filter: TreeFilter::All,
        }
    }

    /// Marks a commit as a traversal start point.
    ///
    /// # Errors
    /// `IllegalState` once the walk has begun; object errors if the
    /// commit cannot be parsed.
    pub fn mark_start(&mut self, id: ObjectId) -> Result<(), RevWalkError> {
        self.assert_not_started("mark_start")?;
        let ix = self.state.pool.lookup(id);
        self.state.parse_headers(ix)?;
        if self.state.pool.flags(ix) & flags::SEEN != 0 {
            return Ok(());
        }
        self.state.pool.add_flags(ix, flags::SEEN);
        self.queue.add_unordered(ix);
        Ok(())
    }

    /// Marks a commit, and everything reachable from it, uninteresting.
    ///
    /// The flag propagates transitively along parent edges as traversal
    /// proceeds; ancestors already parsed are marked immediately.
    ///
    /// # Errors
    /// As `mark_start`.
    pub fn mark_uninteresting(&mut self, id: ObjectId) -> Result<(), RevWalkError> {
        self.assert_not_started("mark_uninteresting")?;
        let ix = self.state.pool.lookup(id);
        self.state.parse_headers(ix)?;
        self.state.pool.add_flags(ix, flags::UNINTERESTING);
        self.state.pool.carry_flags(ix, flags::UNINTERESTING);
        if self.state.pool.flags(ix) & flags::SEEN == 0 {
            self.state.pool.add_flags(ix, flags::SEEN);
            self.queue.add_unordered(ix);
        }
        Ok(())
    }

    /// Replaces the sort option set with a single option.
    pub fn sort(&mut self, sort: RevSort) {
        self.sorting.replace(sort);
    }

    /// Adds or removes one sort option.
    pub fn sort_add(&mut self, sort: RevSort, enabled: bool) {
        self.sorting.set(sort, enabled);
    }

    /// Currently configured sort options.
    #[must_use]
    pub fn sorting(&self) -> RevSortSet {
        self.sorting
    }

    /// Replaces the commit filter.
    pub fn set_rev_filter(&mut self, filter: RevFilter) {
        self.rev_filter = filter;
    }

    /// Replaces the tree filter used for path-limited history.
    pub fn set_tree_filter(&mut self, filter: TreeFilter) {
        self.tree_filter = filter;
    }

    /// Produces the next commit, or `None` at end of walk.
    ///
    /// The first call assembles the generator pipeline from the current
    /// configuration.
    ///
    /// # Errors
    /// `IllegalState` for invalid configurations (merge-base with a tree
    /// filter); object errors from parsing.
    pub fn next(&mut self) -> Result<Option<&RevCommit>, RevWalkError> {
        if self.pending.is_none() {
            let pipeline = self.assemble()?;
            self.pending = Some(pipeline);
        }
        let mut generator = self.pending.take().expect("assembled above");
        let result = generator.next(&mut self.state);
        self.pending = Some(generator);
        match result? {
            Some(ix) => Ok(Some(self.state.pool.get(ix))),
            None => Ok(None),
        }
    }

    /// Resolves the parent ids of a pooled commit.
    ///
    /// Returns `None` if this walker has not parsed the commit. For
    /// emitted commits of a path-limited walk the list reflects any
    /// rewritten edges.
    #[must_use]
    pub fn parent_ids(&self, id: &ObjectId) -> Option<Vec<ObjectId>> {
        let commit = self.pooled(id)?;
        Some(
            commit
                .parents
                .iter()
                .map(|&p| self.state.pool.get(p).id())
                .collect(),
        )
    }

    /// Returns a pooled commit by id, if this walker has seen it.
    #[must_use]
    pub fn pooled(&self, id: &ObjectId) -> Option<&RevCommit> {
        // The pool interns lazily; only report commits with parsed data.
        let ix = *self.state.pool.by_id_ref().get(id)?;
        let commit = self.state.pool.get(ix);
        (commit.flags & flags::PARSED != 0).then_some(commit)
    }

    /// Discards walk progress so marks can be applied afresh.
    ///
    /// Parsed commit data is retained; walker flags, queues, and the
    /// assembled pipeline are cleared.
    pub fn reset(&mut self) {
        self.pending = None;
        self.queue = RevQueue::fifo();
        self.state.pool.reset_walk_flags();
    }

    fn assert_not_started(&self, op: &str) -> Result<(), RevWalkError> {
        if self.pending.is_some() {
            return Err(RevWalkError::illegal_state(format!(
                "{op} is not permitted after the walk has begun"
            )));
        }
        Ok(())
    }

    /// Builds the concrete pipeline; see the module docs for the phases.
    fn assemble(&mut self) -> Result<Box<dyn Generator>, RevWalkError> {
        if matches!(self.rev_filter, RevFilter::MergeBase) {
            if !self.tree_filter.is_all() {
                return Err(RevWalkError::illegal_state(
                    "cannot combine a tree filter with the merge-base filter",
                ));
            }
            let starts = std::mem::replace(&mut self.queue, RevQueue::Empty);
            let mut generator = MergeBaseGenerator::new();
            generator.init(starts, &mut self.state)?;
            return Ok(Box::new(generator));
        }

        let mut boundary = self.sorting.contains(RevSort::Boundary);
        if boundary
            && !self
                .queue
                .anybody_has_flag(&self.state.pool, flags::UNINTERESTING)
        {
            // Without uninteresting commits no boundary can exist; skip
            // the extra stage entirely.
            boundary = false;
        }

        let starts = std::mem::replace(&mut self.queue, RevQueue::Empty);
        let queue = if self.sorting.contains(RevSort::StartOrder) {
            RevQueue::fifo_from(starts)
        } else if self.sorting.contains(RevSort::CommitTimeDesc) {
            RevQueue::date_from(starts, &self.state.pool)
        } else {
            starts
        };

        let mut pending_output = 0;
        if matches!(queue, RevQueue::Date(_)) {
            pending_output |= output::SORT_COMMIT_TIME_DESC;
        }
        if queue.anybody_has_flag(&self.state.pool, flags::UNINTERESTING) {
            pending_output |= output::HAS_UNINTERESTING;
        }
        let tree_rewrite = if self.tree_filter.is_all() {
            None
        } else {
            pending_output |= output::HAS_REWRITE | output::NEEDS_REWRITE;
            Some(self.tree_filter.clone())
        };

        let mut generator: Box<dyn Generator> = Box::new(PendingGenerator::new(
            queue,
            self.rev_filter.clone(),
            tree_rewrite,
            // The boundary stage may deliver uninteresting commits; the
            // producer must not dispose of them early.
            !boundary,
            pending_output,
        ));

        if generator.output_type() & output::NEEDS_REWRITE != 0 {
            generator = Box::new(BufferGenerator::new(BufferOrder::Fifo, generator));
            generator = Box::new(RewriteGenerator::new(generator));
        }
        if self.sorting.contains(RevSort::Topo)
            && generator.output_type() & output::SORT_TOPO == 0
        {
            generator = Box::new(TopoSortGenerator::new(generator));
        }
        if self.sorting.contains(RevSort::Reverse) {
            generator = Box::new(BufferGenerator::new(BufferOrder::Lifo, generator));
        }
        if boundary {
            generator = Box::new(BoundaryGenerator::new(generator));
        }
        Ok(generator)
    }
}

impl std::fmt::Debug for RevWalk<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevWalk")
            .field("assembled", &self.pending.is_some())
            .field("sorting", &self.sorting)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::odb::{MemoryObjectDatabase, ObjectKind};
    use crate::treewalk::TreeFilter;

    use super::super::commit::commit_payload;
    use super::*;

    fn oid(fill: u8) -> ObjectId {
        ObjectId::from_raw([fill; 20])
    }

    struct GraphBuilder {
        db: MemoryObjectDatabase,
        next: u8,
    }

    impl GraphBuilder {
        fn new() -> Self {
            Self {
                db: MemoryObjectDatabase::new(),
                next: 1,
            }
        }

        fn commit(&mut self, time: i64, parents: &[ObjectId]) -> ObjectId {
            self.commit_with_tree(oid(0xee), time, parents)
        }

        fn commit_with_tree(
            &mut self,
            tree: ObjectId,
            time: i64,
            parents: &[ObjectId],
        ) -> ObjectId {
            let id = oid(self.next);
            self.next += 1;
            self.db
                .insert(id, ObjectKind::Commit, commit_payload(&tree, parents, time));
            id
        }
    }

    fn collect_ids(walk: &mut RevWalk<'_>) -> Vec<ObjectId> {
        let mut out = Vec::new();
        while let Some(c) = walk.next().unwrap() {
            out.push(c.id());
        }
        out
    }

    #[test]
    fn linear_history_date_order() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);
        let c = g.commit(300, &[b]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.mark_start(c).unwrap();
        assert_eq!(collect_ids(&mut walk), vec![c, b, a]);
    }

    #[test]
    fn commit_times_non_increasing() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(250, &[a]);
        let c = g.commit(200, &[a]);
        let d = g.commit(300, &[b, c]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.mark_start(d).unwrap();

        let mut last = i64::MAX;
        while let Some(commit) = walk.next().unwrap() {
            assert!(commit.commit_time() <= last);
            last = commit.commit_time();
        }
    }

    #[test]
    fn uninteresting_caps_reachability() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);
        let c = g.commit(300, &[b]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.mark_start(c).unwrap();
        walk.mark_uninteresting(b).unwrap();
        assert_eq!(collect_ids(&mut walk), vec![c]);
    }

    #[test]
    fn no_commit_emitted_twice_across_merges() {
        let mut g = GraphBuilder::new();
        let root = g.commit(10, &[]);
        let l = g.commit(20, &[root]);
        let r = g.commit(30, &[root]);
        let m = g.commit(40, &[l, r]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.mark_start(m).unwrap();
        let ids = collect_ids(&mut walk);
        assert_eq!(ids.len(), 4);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn start_order_preserves_insertion() {
        let mut g = GraphBuilder::new();
        let a = g.commit(500, &[]);
        let b = g.commit(100, &[]);
        let c = g.commit(300, &[]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::StartOrder);
        for id in [a, b, c] {
            walk.mark_start(id).unwrap();
        }
        assert_eq!(collect_ids(&mut walk), vec![a, b, c]);
    }

    #[test]
    fn topo_emits_children_before_parents() {
        let mut g = GraphBuilder::new();
        let root = g.commit(10, &[]);
        // Clock skew: the left branch is dated after its child.
        let l1 = g.commit(400, &[root]);
        let l2 = g.commit(300, &[l1]);
        let r1 = g.commit(200, &[root]);
        let m = g.commit(500, &[l2, r1]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::Topo);
        walk.sort_add(RevSort::CommitTimeDesc, true);
        walk.mark_start(m).unwrap();
        let ids = collect_ids(&mut walk);

        let pos = |id: ObjectId| ids.iter().position(|&x| x == id).unwrap();
        assert!(pos(m) < pos(l2));
        assert!(pos(l2) < pos(l1));
        assert!(pos(l1) < pos(root));
        assert!(pos(r1) < pos(root));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn reverse_inverts_order() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);
        let c = g.commit(300, &[b]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.sort_add(RevSort::Reverse, true);
        walk.mark_start(c).unwrap();
        assert_eq!(collect_ids(&mut walk), vec![a, b, c]);
    }

    #[test]
    fn boundary_emits_uninteresting_parents() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);
        let c = g.commit(300, &[b]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.sort_add(RevSort::Boundary, true);
        walk.mark_start(c).unwrap();
        walk.mark_uninteresting(b).unwrap();

        let mut interesting = Vec::new();
        let mut boundary = Vec::new();
        while let Some(commit) = walk.next().unwrap() {
            if commit.is_boundary() {
                assert!(commit.is_uninteresting());
                boundary.push(commit.id());
            } else {
                interesting.push(commit.id());
            }
        }
        assert_eq!(interesting, vec![c]);
        assert_eq!(boundary, vec![b]);
    }

    #[test]
    fn boundary_disabled_without_uninteresting() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::Boundary);
        walk.mark_start(b).unwrap();
        let ids = collect_ids(&mut walk);
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn merge_base_of_two_branches() {
        let mut g = GraphBuilder::new();
        let root = g.commit(10, &[]);
        let base = g.commit(20, &[root]);
        let l = g.commit(30, &[base]);
        let r = g.commit(40, &[base]);

        let mut walk = RevWalk::new(&g.db);
        walk.set_rev_filter(RevFilter::MergeBase);
        walk.mark_start(l).unwrap();
        walk.mark_start(r).unwrap();
        let ids = collect_ids(&mut walk);
        assert_eq!(ids, vec![base]);
    }

    #[test]
    fn merge_base_rejects_tree_filter() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);

        let mut walk = RevWalk::new(&g.db);
        walk.set_rev_filter(RevFilter::MergeBase);
        walk.set_tree_filter(TreeFilter::paths(["some/path"]));
        walk.mark_start(a).unwrap();
        let err = walk.next().unwrap_err();
        assert!(matches!(err, RevWalkError::IllegalState { .. }));

        // The start generator was not replaced; fixing the filter lets
        // the walk proceed.
        walk.set_tree_filter(TreeFilter::All);
        assert!(walk.next().unwrap().is_some());
    }

    #[test]
    fn author_filter_selects_commits() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);

        let mut walk = RevWalk::new(&g.db);
        walk.mark_start(b).unwrap();
        walk.set_rev_filter(RevFilter::Author(b"U Thor".to_vec()));
        assert_eq!(collect_ids(&mut walk).len(), 2);

        let mut walk = RevWalk::new(&g.db);
        walk.mark_start(b).unwrap();
        walk.set_rev_filter(RevFilter::Author(b"nobody".to_vec()));
        assert!(collect_ids(&mut walk).is_empty());
    }

    #[test]
    fn reset_allows_remarking() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);

        let mut walk = RevWalk::new(&g.db);
        walk.mark_start(b).unwrap();
        assert_eq!(collect_ids(&mut walk).len(), 2);

        walk.reset();
        walk.mark_start(a).unwrap();
        assert_eq!(collect_ids(&mut walk), vec![a]);
    }

    #[test]
    fn marks_rejected_after_walk_begins() {
        let mut g = GraphBuilder::new();
        let a = g.commit(100, &[]);
        let b = g.commit(200, &[a]);

        let mut walk = RevWalk::new(&g.db);
        walk.mark_start(b).unwrap();
        let _ = walk.next().unwrap();
        assert!(matches!(
            walk.mark_start(a),
            Err(RevWalkError::IllegalState { .. })
        ));
    }

    // Path-limited history: commits not touching the path are rewritten
    // out, and surviving parent edges splice through them.
    #[test]
    fn tree_filter_rewrites_history() {
        let mut g = GraphBuilder::new();

        // Tree objects: t1 has file "f" -> blob1; t2 has "f" -> blob2;
        // "other" differs in both but is outside the filter.
        let blob1 = oid(0xf1);
        let blob2 = oid(0xf2);
        let make_tree = |db: &mut MemoryObjectDatabase, id: ObjectId, f: &ObjectId, o: u8| {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(b"100644 f\0");
            bytes.extend_from_slice(f.as_bytes());
            bytes.extend_from_slice(b"100644 other\0");
            bytes.extend_from_slice(oid(o).as_bytes());
            db.insert(id, ObjectKind::Tree, bytes);
        };
        let t1 = oid(0xa1);
        let t2 = oid(0xa2);
        let t3 = oid(0xa3);
        make_tree(&mut g.db, t1, &blob1, 0x10);
        make_tree(&mut g.db, t2, &blob1, 0x11); // only "other" changed
        make_tree(&mut g.db, t3, &blob2, 0x11); // "f" changed

        let c1 = g.commit_with_tree(t1, 100, &[]);
        let c2 = g.commit_with_tree(t2, 200, &[c1]);
        let c3 = g.commit_with_tree(t3, 300, &[c2]);

        let mut walk = RevWalk::new(&g.db);
        walk.sort(RevSort::CommitTimeDesc);
        walk.set_tree_filter(TreeFilter::paths(["f"]));
        walk.mark_start(c3).unwrap();

        // c2 did not change "f" and is rewritten out; c3's parent edge
        // splices through to c1.
        let first = walk.next().unwrap().unwrap().id();
        assert_eq!(first, c3);
        assert_eq!(walk.parent_ids(&first).unwrap(), vec![c1]);

        let second = walk.next().unwrap().unwrap().id();
        assert_eq!(second, c1);
        assert!(walk.next().unwrap().is_none());
    }
}
