//! Namespace Merkle tree.
//!
//! Mirrors a directory hierarchy in memory: nodes own their children, carry
//! cached Merkle digests with per-node validity, and are mutated through
//! path-addressed operations. Locking is per node (the affected parent's
//! child map), never tree-wide; renames additionally serialize against each
//! other so the into-own-subtree check stays sound.

pub mod diff;
pub mod hasher;
pub mod node;
pub mod path;

pub use node::Node;
pub use path::TreePath;

use crate::error::TreeError;
use crate::tree::node::invalidate_upward;
use crate::types::{Digest, NodeKind};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// A namespace tree with an owned root. Independent trees are fully
/// isolated; nothing is shared module-globally.
pub struct Tree {
    root: Arc<Node>,
    /// Renames take this so two concurrent renames cannot braid a cycle.
    /// Inserts, removes, and queries never touch it.
    rename_lock: Mutex<()>,
}

impl Tree {
    /// Create a tree containing only an empty root directory.
    pub fn new() -> Self {
        Self {
            root: Node::new_root(),
            rename_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> Arc<Node> {
        self.root.clone()
    }

    /// Resolve a path to its node. Fails with `NotFound` if any segment is
    /// absent.
    pub fn lookup(&self, path: &TreePath) -> Result<Arc<Node>, TreeError> {
        let mut cur = self.root.clone();
        for segment in path.segments() {
            let next = cur
                .child(segment)
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
            cur = next;
        }
        Ok(cur)
    }

    /// Insert a new entry. The parent directory must already exist.
    pub fn insert(&self, path: &TreePath, kind: NodeKind) -> Result<Arc<Node>, TreeError> {
        let Some(parent_path) = path.parent() else {
            return Err(TreeError::AlreadyExists(path.to_string()));
        };
        let name = path.file_name().expect("non-root path has a file name");
        let parent = match self.lookup(&parent_path) {
            Ok(parent) => parent,
            Err(TreeError::NotFound(_)) => {
                return Err(TreeError::ParentMissing(path.to_string()));
            }
            Err(e) => return Err(e),
        };
        if parent.kind() != NodeKind::Directory {
            return Err(TreeError::NotADirectory(parent_path.to_string()));
        }

        let child = Node::new_detached(kind, name.to_string());
        {
            let mut children = parent.children.write();
            if children.contains_key(name) {
                return Err(TreeError::AlreadyExists(path.to_string()));
            }
            *child.parent.write() = Arc::downgrade(&parent);
            children.insert(name.to_string(), child.clone());
        }
        invalidate_upward(&parent);
        trace!(path = %path, ?kind, "inserted entry");
        Ok(child)
    }

    /// Detach an entry and its subtree from the tree. Returns the detached
    /// node so callers can inspect it before dropping ownership.
    pub fn remove(&self, path: &TreePath) -> Result<Arc<Node>, TreeError> {
        let Some(parent_path) = path.parent() else {
            return Err(TreeError::InvalidPath("cannot remove the root".to_string()));
        };
        let name = path.file_name().expect("non-root path has a file name");
        let parent = self.lookup(&parent_path)?;

        let detached = {
            let mut children = parent.children.write();
            children
                .remove(name)
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?
        };
        *detached.parent.write() = std::sync::Weak::new();
        invalidate_upward(&parent);
        trace!(path = %path, "removed entry");
        Ok(detached)
    }

    /// Record a file's content digest and invalidate its ancestor chain.
    pub fn set_content(&self, path: &TreePath, digest: Digest) -> Result<(), TreeError> {
        let node = self.lookup(path)?;
        if node.kind() != NodeKind::File {
            return Err(TreeError::NotAFile(path.to_string()));
        }
        *node.content_digest.write() = Some(digest);
        invalidate_upward(&node);
        Ok(())
    }

    /// Mark a file's content digest stale; the next recompute re-queries the
    /// content hash provider.
    pub fn mark_content_stale(&self, path: &TreePath) -> Result<(), TreeError> {
        let node = self.lookup(path)?;
        if node.kind() != NodeKind::File {
            return Err(TreeError::NotAFile(path.to_string()));
        }
        *node.content_digest.write() = None;
        invalidate_upward(&node);
        Ok(())
    }

    /// Move an entry to a new parent and/or name. Structural on both
    /// endpoints: both parent chains are invalidated, but the moved
    /// subtree's own hashes are untouched (its content did not change).
    pub fn rename(&self, from: &TreePath, to: &TreePath) -> Result<(), TreeError> {
        if from == to {
            return Ok(());
        }
        if from.is_root() {
            return Err(TreeError::InvalidPath("cannot move the root".to_string()));
        }
        let Some(to_parent_path) = to.parent() else {
            return Err(TreeError::AlreadyExists(to.to_string()));
        };
        let to_name = to.file_name().expect("non-root path has a file name");
        let from_parent_path = from.parent().expect("non-root path has a parent");
        let from_name = from.file_name().expect("non-root path has a file name");

        let _serial = self.rename_lock.lock();

        let node = self.lookup(from)?;
        let old_parent = self.lookup(&from_parent_path)?;
        let new_parent = match self.lookup(&to_parent_path) {
            Ok(parent) => parent,
            Err(TreeError::NotFound(_)) => {
                return Err(TreeError::ParentMissing(to.to_string()));
            }
            Err(e) => return Err(e),
        };
        if new_parent.kind() != NodeKind::Directory {
            return Err(TreeError::NotADirectory(to_parent_path.to_string()));
        }

        // A directory may not move beneath itself. Climbing from the new
        // parent is safe here: other renames are excluded by the serial
        // lock, and insert/remove cannot introduce a cycle.
        if node.kind() == NodeKind::Directory {
            let mut anc = Some(new_parent.clone());
            while let Some(cur) = anc {
                if Arc::ptr_eq(&cur, &node) {
                    return Err(TreeError::MoveIntoSelf(from.to_string()));
                }
                anc = cur.parent();
            }
        }

        if Arc::ptr_eq(&old_parent, &new_parent) {
            let mut children = old_parent.children.write();
            match children.get(from_name) {
                Some(present) if Arc::ptr_eq(present, &node) => {}
                _ => return Err(TreeError::NotFound(from.to_string())),
            }
            if children.contains_key(to_name) {
                return Err(TreeError::AlreadyExists(to.to_string()));
            }
            // Checks passed; the relink itself cannot fail, so the change
            // is atomic under the held lock.
            let detached = children.remove(from_name).expect("presence checked above");
            *detached.name.write() = to_name.to_string();
            children.insert(to_name.to_string(), detached);
        } else {
            // Two distinct parents: acquire child-map locks in address
            // order so concurrent renames cannot deadlock.
            let (first, second) = if Arc::as_ptr(&old_parent) < Arc::as_ptr(&new_parent) {
                (old_parent.clone(), new_parent.clone())
            } else {
                (new_parent.clone(), old_parent.clone())
            };
            let guard_first = first.children.write();
            let guard_second = second.children.write();
            let (mut old_children, mut new_children) = if Arc::ptr_eq(&first, &old_parent) {
                (guard_first, guard_second)
            } else {
                (guard_second, guard_first)
            };
            match old_children.get(from_name) {
                Some(present) if Arc::ptr_eq(present, &node) => {}
                _ => return Err(TreeError::NotFound(from.to_string())),
            }
            if new_children.contains_key(to_name) {
                return Err(TreeError::AlreadyExists(to.to_string()));
            }
            let detached = old_children
                .remove(from_name)
                .expect("presence checked above");
            *detached.name.write() = to_name.to_string();
            *detached.parent.write() = Arc::downgrade(&new_parent);
            new_children.insert(to_name.to_string(), detached);
        }

        invalidate_upward(&old_parent);
        invalidate_upward(&new_parent);
        trace!(from = %from, to = %to, "moved entry");
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the relative paths of a node and all its descendants. Callers
/// use this before a detach, while parent links still resolve.
pub fn subtree_paths(node: &Arc<Node>) -> Vec<TreePath> {
    let mut out = Vec::new();
    let base = node.path();
    let mut stack = vec![(node.clone(), base)];
    while let Some((cur, path)) = stack.pop() {
        for (name, child) in cur.children_snapshot() {
            stack.push((child, path.join(&name)));
        }
        out.push(path);
    }
    out
}
