//! Tree nodes and the invalidation propagator.
//!
//! Each node carries two atomic counters: `generation`, bumped on every
//! structural or content change, and `valid_at`, the generation at which the
//! cached hash was committed. A node's hash is valid iff the two are equal.
//! This encoding makes invalidation a single atomic increment and lets the
//! hash engine commit optimistically: a commit stores `valid_at = snapshot`,
//! which is a no-op validity-wise if the generation has moved past the
//! snapshot in the meantime.
//!
//! The parent link is a `Weak` back-reference used only for upward climbs;
//! ownership flows strictly downward through `children`.

use crate::tree::path::TreePath;
use crate::types::{Digest, NodeKind};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// One namespace entry (file or directory).
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) name: RwLock<String>,
    pub(crate) parent: RwLock<Weak<Node>>,
    /// Children keyed by entry name. `BTreeMap` keeps the byte-wise
    /// lexicographic order the directory hash encoding requires.
    pub(crate) children: RwLock<BTreeMap<String, Arc<Node>>>,
    /// Last-known content digest; files only. `None` means stale or never
    /// fetched, and forces a provider call on the next recompute.
    pub(crate) content_digest: RwLock<Option<Digest>>,
    /// Cached Merkle digest. Trusted only while the node is valid. Writers
    /// hold this lock across the generation check and the `valid_at` store,
    /// so the pair stays coherent.
    pub(crate) node_hash: RwLock<Option<Digest>>,
    pub(crate) generation: AtomicU64,
    pub(crate) valid_at: AtomicU64,
}

impl Node {
    /// Create the root directory node of a tree.
    pub(crate) fn new_root() -> Arc<Node> {
        Arc::new(Node {
            kind: NodeKind::Directory,
            name: RwLock::new(String::new()),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(BTreeMap::new()),
            content_digest: RwLock::new(None),
            node_hash: RwLock::new(None),
            generation: AtomicU64::new(1),
            valid_at: AtomicU64::new(0),
        })
    }

    /// Create a detached node; the caller attaches it under a parent.
    pub(crate) fn new_detached(kind: NodeKind, name: String) -> Arc<Node> {
        Arc::new(Node {
            kind,
            name: RwLock::new(name),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(BTreeMap::new()),
            content_digest: RwLock::new(None),
            node_hash: RwLock::new(None),
            generation: AtomicU64::new(1),
            valid_at: AtomicU64::new(0),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Current generation stamp.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// True iff the cached hash is consistent with current state.
    pub fn is_valid(&self) -> bool {
        self.valid_at.load(Ordering::Acquire) == self.generation.load(Ordering::Acquire)
    }

    /// Strong reference to the parent, if this node is attached and not root.
    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.read().upgrade()
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<Arc<Node>> {
        self.children.read().get(name).cloned()
    }

    /// Snapshot of children in name order.
    pub fn children_snapshot(&self) -> Vec<(String, Arc<Node>)> {
        self.children
            .read()
            .iter()
            .map(|(n, c)| (n.clone(), c.clone()))
            .collect()
    }

    /// Cached hash, or `None` if the node is invalid. Reading the hash and
    /// checking validity under the same read lock keeps the pair coherent
    /// with concurrent commits.
    pub fn cached_hash(&self) -> Option<Digest> {
        let guard = self.node_hash.read();
        if self.is_valid() {
            *guard
        } else {
            None
        }
    }

    /// Last-known content digest (files).
    pub fn content_digest(&self) -> Option<Digest> {
        *self.content_digest.read()
    }

    /// Bump the generation, invalidating any cached hash. Must not fail.
    pub(crate) fn touch(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Commit a recomputed hash against a generation snapshot. Returns false
    /// (discarding the result) if the node changed during recomputation. For
    /// files, a freshly fetched content digest is committed in the same
    /// critical section.
    pub(crate) fn commit_hash(
        &self,
        snapshot: u64,
        hash: Digest,
        content: Option<Digest>,
    ) -> bool {
        let mut guard = self.node_hash.write();
        if self.generation.load(Ordering::Acquire) != snapshot {
            return false;
        }
        if let Some(content) = content {
            *self.content_digest.write() = Some(content);
        }
        *guard = Some(hash);
        self.valid_at.store(snapshot, Ordering::Release);
        true
    }

    /// Commit a directory hash. In addition to the node's own snapshot,
    /// every combined child is re-verified against the generation it was
    /// read at. A child touched after its hash was read would not bump this
    /// node's generation (the climb stops at an invalid parent), so the
    /// child witnesses are what keep a commit from embedding a stale child
    /// digest. The checks and the store share the `node_hash` write lock,
    /// which the invalidation climb's parent check also takes.
    pub(crate) fn commit_dir_hash(
        &self,
        snapshot: u64,
        hash: Digest,
        children: &[(Arc<Node>, u64)],
    ) -> bool {
        let mut guard = self.node_hash.write();
        if self.generation.load(Ordering::Acquire) != snapshot {
            return false;
        }
        if children.iter().any(|(child, seen)| child.generation() != *seen) {
            return false;
        }
        *guard = Some(hash);
        self.valid_at.store(snapshot, Ordering::Release);
        true
    }

    /// Relative path of this node from the tree root, built by climbing
    /// parent links.
    pub fn path(self: &Arc<Node>) -> TreePath {
        let mut names = Vec::new();
        let mut cur = self.clone();
        while let Some(parent) = cur.parent() {
            names.push(cur.name());
            cur = parent;
        }
        names.reverse();
        // Names were normalized on insert, so this cannot fail.
        TreePath::from_segments(names).unwrap_or_else(|_| TreePath::root())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("name", &*self.name.read())
            .field("generation", &self.generation())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Mark `node` invalid and climb its ancestor chain, stopping at the first
/// ancestor that is already invalid (all of its ancestors are then invalid
/// too, by upward monotonicity). The climb is an explicit loop holding at
/// most one lock at a time.
///
/// Each parent's check-and-touch happens under that parent's `node_hash`
/// read lock. An in-flight directory commit holds the write lock across its
/// child re-verification and its validity store, so the two cannot
/// interleave: either the commit sees this invalidation's generation bump
/// and aborts, or the climb sees the committed validity and touches the
/// parent.
///
/// Used for both content changes (the mutated file) and structural changes
/// (the directory whose child set changed).
pub(crate) fn invalidate_upward(node: &Arc<Node>) {
    node.touch();
    let mut cur = node.clone();
    loop {
        let Some(parent) = cur.parent() else {
            break;
        };
        let guard = parent.node_hash.read();
        if !parent.is_valid() {
            break;
        }
        parent.touch();
        drop(guard);
        cur = parent;
    }
}

/// Conservatively invalidate an entire subtree, then climb from its root.
/// Used when an ordering fault leaves the tree possibly out of step with the
/// underlying namespace: every cached hash below `node` is distrusted.
pub(crate) fn invalidate_subtree(node: &Arc<Node>) {
    let mut stack = vec![node.clone()];
    while let Some(cur) = stack.pop() {
        cur.touch();
        for (_, child) in cur.children_snapshot() {
            stack.push(child);
        }
    }
    invalidate_upward(node);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(parent: &Arc<Node>, child: &Arc<Node>) {
        *child.parent.write() = Arc::downgrade(parent);
        parent
            .children
            .write()
            .insert(child.name(), child.clone());
    }

    fn force_valid(node: &Arc<Node>) {
        let gen = node.generation();
        assert!(node.commit_hash(gen, [0u8; 32], None));
    }

    #[test]
    fn test_new_node_is_invalid() {
        let root = Node::new_root();
        assert!(!root.is_valid());
        assert!(root.cached_hash().is_none());
    }

    #[test]
    fn test_commit_then_touch_invalidates() {
        let root = Node::new_root();
        force_valid(&root);
        assert!(root.is_valid());
        root.touch();
        assert!(!root.is_valid());
        assert!(root.cached_hash().is_none());
    }

    #[test]
    fn test_stale_commit_is_discarded() {
        let root = Node::new_root();
        let gen = root.generation();
        root.touch();
        assert!(!root.commit_hash(gen, [1u8; 32], None));
        assert!(!root.is_valid());
    }

    #[test]
    fn test_dir_commit_refused_when_child_moved_on() {
        let root = Node::new_root();
        let file = Node::new_detached(NodeKind::File, "a".into());
        attach(&root, &file);
        force_valid(&file);

        let snapshot = root.generation();
        let seen = file.generation();
        // Child invalidated after its hash was read but before the parent
        // commit. The climb stops at the invalid root without touching it,
        // so only the child witness can catch this.
        file.touch();
        assert!(!root.commit_dir_hash(snapshot, [1u8; 32], &[(file.clone(), seen)]));
        assert!(!root.is_valid());

        // With a fresh witness the commit goes through.
        force_valid(&file);
        let seen = file.generation();
        assert!(root.commit_dir_hash(root.generation(), [1u8; 32], &[(file, seen)]));
        assert!(root.is_valid());
    }

    #[test]
    fn test_climb_stops_at_invalid_ancestor() {
        let root = Node::new_root();
        let dir = Node::new_detached(NodeKind::Directory, "d".into());
        let file = Node::new_detached(NodeKind::File, "a".into());
        attach(&root, &dir);
        attach(&dir, &file);
        force_valid(&file);
        force_valid(&dir);
        // Root left invalid: the climb must stop at it without touching it.
        let root_gen = root.generation();
        invalidate_upward(&file);
        assert!(!file.is_valid());
        assert!(!dir.is_valid());
        assert_eq!(root.generation(), root_gen);
    }

    #[test]
    fn test_climb_is_amortized() {
        let root = Node::new_root();
        let dir = Node::new_detached(NodeKind::Directory, "d".into());
        let file = Node::new_detached(NodeKind::File, "a".into());
        attach(&root, &dir);
        attach(&dir, &file);
        force_valid(&file);
        force_valid(&dir);
        force_valid(&root);

        let dir_gen = dir.generation();
        let root_gen = root.generation();
        for _ in 0..10 {
            invalidate_upward(&file);
        }
        // Ancestors transitioned valid -> invalid exactly once.
        assert_eq!(dir.generation(), dir_gen + 1);
        assert_eq!(root.generation(), root_gen + 1);
    }

    #[test]
    fn test_path_from_parent_links() {
        let root = Node::new_root();
        let dir = Node::new_detached(NodeKind::Directory, "d".into());
        let file = Node::new_detached(NodeKind::File, "b".into());
        attach(&root, &dir);
        attach(&dir, &file);
        assert_eq!(file.path().to_string(), "/d/b");
        assert_eq!(root.path().to_string(), "/");
    }
}
