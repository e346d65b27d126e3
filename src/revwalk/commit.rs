//! Commit nodes, the per-walker intern pool, and commit parsing.
//!
//! Commits live in a repository-local pool keyed by object id; parent
//! edges are pool indices resolved lazily as headers parse. Each node
//! carries a 32-bit flag word with walker state.
//!
//! Parsing is two-phase. Header parsing extracts the tree id, parent ids,
//! and committer timestamp, which is everything traversal needs. Body
//! parsing
//! additionally retains the author line, committer line, and message for
//! content filters, and can be disposed again to bound memory.
//!
//! # Commit Object Format
//! ```text
//! tree <hex-oid>\n
//! parent <hex-oid>\n   (zero or more)
//! author <name> <email> <timestamp> <tz>\n
//! committer <name> <email> <timestamp> <tz>\n
//! (further headers ignored)
//! \n
//! <message>
//! ```
//!
//! The committer timestamp is taken from the tail of the committer line
//! (second-to-last space-separated field) so names and emails containing
//! spaces parse correctly.

use ahash::AHashMap;
use memchr::memchr;

use crate::odb::{ObjectDatabase, ObjectError, ObjectId, ObjectKind};

use super::errors::RevWalkError;

/// Index of a commit within the walker's pool.
pub(crate) type CommitIx = u32;

/// Walker-state flag bits.
pub(crate) mod flags {
    /// Headers (tree, parents, commit time) are parsed.
    pub const PARSED: u32 = 1 << 0;
    /// Body (author, committer, message) is retained.
    pub const BODY: u32 = 1 << 1;
    /// The commit entered the pending queue once.
    pub const SEEN: u32 = 1 << 2;
    /// Reachable from the uninteresting set.
    pub const UNINTERESTING: u32 = 1 << 3;
    /// Tree unchanged against all parents under the active tree filter;
    /// parent edges of children splice through this commit.
    pub const REWRITE: u32 = 1 << 4;
    /// Scratch bit for single-pass generator bookkeeping.
    pub const TEMP_MARK: u32 = 1 << 5;
    /// Held back by the topological sorter until all children emitted.
    pub const TOPO_DELAY: u32 = 1 << 6;
    /// Emitted as an uninteresting commit on the boundary.
    pub const BOUNDARY: u32 = 1 << 7;
    /// Ancestry of an already-emitted merge base.
    pub const MERGE_BASE: u32 = 1 << 8;
    /// First bit available for merge-base branch coloring.
    pub const FIRST_BRANCH: u32 = 9;
    /// Number of branch coloring bits available.
    pub const BRANCH_BITS: u32 = 32 - FIRST_BRANCH;
}

/// Retained body text for content filters.
#[derive(Clone, Debug)]
pub(crate) struct CommitBody {
    pub(crate) author: Vec<u8>,
    pub(crate) committer: Vec<u8>,
    pub(crate) message: Vec<u8>,
}

/// One commit node in the walker's pool.
#[derive(Debug)]
pub struct RevCommit {
    id: ObjectId,
    pub(crate) flags: u32,
    pub(crate) commit_time: i64,
    pub(crate) tree_id: ObjectId,
    pub(crate) parents: Vec<CommitIx>,
    pub(crate) in_degree: u32,
    pub(crate) body: Option<CommitBody>,
}

impl RevCommit {
    fn unparsed(id: ObjectId) -> Self {
        Self {
            id,
            flags: 0,
            commit_time: 0,
            tree_id: ObjectId::zero(),
            parents: Vec::new(),
            in_degree: 0,
            body: None,
        }
    }

    /// The commit's object id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Committer timestamp in seconds since the epoch.
    #[inline]
    #[must_use]
    pub fn commit_time(&self) -> i64 {
        self.commit_time
    }

    /// Id of the commit's root tree.
    #[inline]
    #[must_use]
    pub fn tree_id(&self) -> ObjectId {
        self.tree_id
    }

    /// Number of parent commits.
    #[inline]
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// True if the commit was emitted as a boundary commit.
    #[inline]
    #[must_use]
    pub fn is_boundary(&self) -> bool {
        self.flags & flags::BOUNDARY != 0
    }

    /// True if the commit is reachable from the uninteresting set.
    #[inline]
    #[must_use]
    pub fn is_uninteresting(&self) -> bool {
        self.flags & flags::UNINTERESTING != 0
    }

    /// Raw author line, if the body is retained.
    #[must_use]
    pub fn author_line(&self) -> Option<&[u8]> {
        self.body.as_ref().map(|b| b.author.as_slice())
    }

    /// Raw committer line, if the body is retained.
    #[must_use]
    pub fn committer_line(&self) -> Option<&[u8]> {
        self.body.as_ref().map(|b| b.committer.as_slice())
    }

    /// Commit message, if the body is retained.
    #[must_use]
    pub fn message(&self) -> Option<&[u8]> {
        self.body.as_ref().map(|b| b.message.as_slice())
    }
}

/// Per-walker intern table of commits.
#[derive(Debug, Default)]
pub(crate) struct CommitPool {
    commits: Vec<RevCommit>,
    by_id: AHashMap<ObjectId, CommitIx>,
}

impl CommitPool {
    /// Interns an id, creating an unparsed node on first sight.
    pub(crate) fn lookup(&mut self, id: ObjectId) -> CommitIx {
        if let Some(&ix) = self.by_id.get(&id) {
            return ix;
        }
        let ix = self.commits.len() as CommitIx;
        self.commits.push(RevCommit::unparsed(id));
        self.by_id.insert(id, ix);
        ix
    }

    /// Returns the node at `ix`.
    #[inline]
    pub(crate) fn get(&self, ix: CommitIx) -> &RevCommit {
        &self.commits[ix as usize]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, ix: CommitIx) -> &mut RevCommit {
        &mut self.commits[ix as usize]
    }

    #[inline]
    pub(crate) fn flags(&self, ix: CommitIx) -> u32 {
        self.get(ix).flags
    }

    #[inline]
    pub(crate) fn add_flags(&mut self, ix: CommitIx, bits: u32) {
        self.get_mut(ix).flags |= bits;
    }

    #[inline]
    pub(crate) fn clear_flags(&mut self, ix: CommitIx, bits: u32) {
        self.get_mut(ix).flags &= !bits;
    }

    /// Read-only view of the id intern table.
    #[inline]
    pub(crate) fn by_id_ref(&self) -> &AHashMap<ObjectId, CommitIx> {
        &self.by_id
    }

    /// Clears walker state on every pooled commit, keeping parsed data.
    pub(crate) fn reset_walk_flags(&mut self) {
        for commit in &mut self.commits {
            commit.flags &= flags::PARSED | flags::BODY;
            commit.in_degree = 0;
        }
    }

    /// Sets `bits` on every ancestor of `start` reachable through parsed
    /// parent edges, stopping where the bits are already present.
    pub(crate) fn carry_flags(&mut self, start: CommitIx, bits: u32) {
        let mut stack = vec![start];
        while let Some(ix) = stack.pop() {
            let parents = self.get(ix).parents.clone();
            for p in parents {
                if self.flags(p) & bits == bits {
                    continue;
                }
                self.add_flags(p, bits);
                stack.push(p);
            }
        }
    }
}

/// The walker's shared mutable state: object access plus the commit pool.
pub(crate) struct WalkState<'a> {
    pub(crate) odb: &'a dyn ObjectDatabase,
    pub(crate) pool: CommitPool,
}

impl<'a> WalkState<'a> {
    pub(crate) fn new(odb: &'a dyn ObjectDatabase) -> Self {
        Self {
            odb,
            pool: CommitPool::default(),
        }
    }

    /// Parses tree id, parents, and commit time; idempotent.
    ///
    /// # Errors
    /// `Missing`, `WrongType`, `Corrupt`, or `Io` through `RevWalkError`.
    pub(crate) fn parse_headers(&mut self, ix: CommitIx) -> Result<(), RevWalkError> {
        if self.pool.flags(ix) & flags::PARSED != 0 {
            return Ok(());
        }
        let id = self.pool.get(ix).id();
        let data = self.odb.open_kind(&id, ObjectKind::Commit)?;
        let parsed = parse_commit_headers(&id, &data.bytes)?;

        let parent_ixs: Vec<CommitIx> = parsed
            .parents
            .iter()
            .map(|pid| self.pool.lookup(*pid))
            .collect();
        let commit = self.pool.get_mut(ix);
        commit.tree_id = parsed.tree_id;
        commit.parents = parent_ixs;
        commit.commit_time = parsed.commit_time;
        commit.flags |= flags::PARSED;
        Ok(())
    }

    /// Retains author, committer, and message; idempotent.
    ///
    /// # Errors
    /// As `parse_headers`.
    pub(crate) fn parse_body(&mut self, ix: CommitIx) -> Result<(), RevWalkError> {
        self.parse_headers(ix)?;
        if self.pool.flags(ix) & flags::BODY != 0 {
            return Ok(());
        }
        let id = self.pool.get(ix).id();
        let data = self.odb.open_kind(&id, ObjectKind::Commit)?;
        let body = parse_commit_body(&id, &data.bytes)?;
        let commit = self.pool.get_mut(ix);
        commit.body = Some(body);
        commit.flags |= flags::BODY;
        Ok(())
    }

    /// Drops a retained body to bound memory.
    pub(crate) fn dispose_body(&mut self, ix: CommitIx) {
        let commit = self.pool.get_mut(ix);
        commit.body = None;
        commit.flags &= !flags::BODY;
    }
}

/// Parsed commit headers.
#[derive(Debug)]
struct ParsedHeaders {
    tree_id: ObjectId,
    parents: Vec<ObjectId>,
    commit_time: i64,
}

/// Parses the header section of a commit payload.
fn parse_commit_headers(oid: &ObjectId, data: &[u8]) -> Result<ParsedHeaders, ObjectError> {
    let mut pos = 0;

    let tree_id = parse_id_line(oid, data, &mut pos, b"tree ")?;

    let mut parents = Vec::new();
    while data[pos..].starts_with(b"parent ") {
        parents.push(parse_id_line(oid, data, &mut pos, b"parent ")?);
    }

    skip_line(oid, data, &mut pos, b"author ")?;
    let committer = read_line(oid, data, &mut pos, b"committer ")?;
    let commit_time = committer_timestamp(oid, committer)?;

    Ok(ParsedHeaders {
        tree_id,
        parents,
        commit_time,
    })
}

/// Parses the body section: author/committer lines and the message.
fn parse_commit_body(oid: &ObjectId, data: &[u8]) -> Result<CommitBody, ObjectError> {
    let mut pos = 0;
    parse_id_line(oid, data, &mut pos, b"tree ")?;
    while data[pos..].starts_with(b"parent ") {
        parse_id_line(oid, data, &mut pos, b"parent ")?;
    }
    let author = read_line(oid, data, &mut pos, b"author ")?.to_vec();
    let committer = read_line(oid, data, &mut pos, b"committer ")?.to_vec();

    // The message starts after the first blank line; intervening headers
    // (encoding, gpgsig continuation lines) are not retained.
    let message = match find_blank_line(&data[pos..]) {
        Some(off) => data[pos + off..].to_vec(),
        None => Vec::new(),
    };
    Ok(CommitBody {
        author,
        committer,
        message,
    })
}

/// Parses `<prefix><40-hex>\n`, advancing `pos`.
fn parse_id_line(
    oid: &ObjectId,
    data: &[u8],
    pos: &mut usize,
    prefix: &[u8],
) -> Result<ObjectId, ObjectError> {
    if !data[*pos..].starts_with(prefix) {
        return Err(ObjectError::corrupt(*oid, "missing expected header line"));
    }
    *pos += prefix.len();
    let hex_len = ObjectId::HEX_LEN;
    if data.len() < *pos + hex_len + 1 {
        return Err(ObjectError::corrupt(*oid, "truncated id header"));
    }
    let id = ObjectId::from_hex(&data[*pos..*pos + hex_len])
        .ok_or(ObjectError::corrupt(*oid, "invalid hex in id header"))?;
    *pos += hex_len;
    if data[*pos] != b'\n' {
        return Err(ObjectError::corrupt(*oid, "id header missing newline"));
    }
    *pos += 1;
    Ok(id)
}

/// Returns the line body after `prefix`, advancing `pos` past the line.
fn read_line<'d>(
    oid: &ObjectId,
    data: &'d [u8],
    pos: &mut usize,
    prefix: &[u8],
) -> Result<&'d [u8], ObjectError> {
    if !data[*pos..].starts_with(prefix) {
        return Err(ObjectError::corrupt(*oid, "missing expected header line"));
    }
    let start = *pos + prefix.len();
    let nl = memchr(b'\n', &data[start..])
        .ok_or(ObjectError::corrupt(*oid, "header line missing newline"))?;
    *pos = start + nl + 1;
    Ok(&data[start..start + nl])
}

fn skip_line(
    oid: &ObjectId,
    data: &[u8],
    pos: &mut usize,
    prefix: &[u8],
) -> Result<(), ObjectError> {
    read_line(oid, data, pos, prefix).map(|_| ())
}

/// Extracts the timestamp: the second-to-last space-separated field.
fn committer_timestamp(oid: &ObjectId, line: &[u8]) -> Result<i64, ObjectError> {
    let last_space = line
        .iter()
        .rposition(|&b| b == b' ')
        .ok_or(ObjectError::corrupt(*oid, "malformed committer line"))?;
    let ts_start = line[..last_space]
        .iter()
        .rposition(|&b| b == b' ')
        .ok_or(ObjectError::corrupt(*oid, "malformed committer line"))?
        + 1;
    let field = &line[ts_start..last_space];
    if field.is_empty() || field.len() > 19 {
        return Err(ObjectError::corrupt(*oid, "invalid committer timestamp"));
    }
    let mut value: i64 = 0;
    for &b in field {
        let digit = b.wrapping_sub(b'0');
        if digit > 9 {
            return Err(ObjectError::corrupt(*oid, "invalid committer timestamp"));
        }
        value = value * 10 + i64::from(digit);
    }
    Ok(value)
}

/// Offset just past the first blank line, if any.
fn find_blank_line(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") {
        return Some(1);
    }
    let mut pos = 0;
    while let Some(nl) = memchr(b'\n', &data[pos..]) {
        let line_end = pos + nl;
        if data.get(line_end + 1) == Some(&b'\n') {
            return Some(line_end + 2);
        }
        pos = line_end + 1;
    }
    None
}

/// Builds a synthetic commit payload for tests.
#[cfg(test)]
pub(crate) fn commit_payload(tree: &ObjectId, parents: &[ObjectId], time: i64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"tree ");
    out.extend_from_slice(tree.to_hex().as_bytes());
    out.push(b'\n');
    for p in parents {
        out.extend_from_slice(b"parent ");
        out.extend_from_slice(p.to_hex().as_bytes());
        out.push(b'\n');
    }
    out.extend_from_slice(format!("author A U Thor <a@example.com> {time} +0000\n").as_bytes());
    out.extend_from_slice(
        format!("committer C O Mitter <c@example.com> {time} +0000\n").as_bytes(),
    );
    out.extend_from_slice(b"\nsubject line\n");
    out
}
