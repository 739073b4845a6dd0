//! Hash-guided structural diff.
//!
//! Compares two nodes (typically the roots of two trees) and returns the set
//! of relative paths at which they differ. Subtrees with equal hashes are
//! skipped in O(1); a subtree present on only one side is reported as a
//! single path prefix rather than enumerated leaf by leaf.

use crate::error::TreeError;
use crate::tree::hasher::HashEngine;
use crate::tree::node::Node;
use crate::types::NodeKind;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Path label for a difference at the comparison root.
const HERE: &str = ".";

fn child_path(prefix: &str, name: &str) -> String {
    if prefix == HERE {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Diff two subtrees by hash. The result is symmetric: `diff(a, b)` and
/// `diff(b, a)` report the same path set. Hashing the compared nodes may
/// recompute and cache invalid regions as a side effect.
pub fn diff(
    engine: &HashEngine,
    a: &Arc<Node>,
    b: &Arc<Node>,
) -> Result<BTreeSet<String>, TreeError> {
    let mut out = BTreeSet::new();
    let mut stack: Vec<(Arc<Node>, Arc<Node>, String)> =
        vec![(a.clone(), b.clone(), HERE.to_string())];

    while let Some((left, right, prefix)) = stack.pop() {
        if engine.hash(&left)? == engine.hash(&right)? {
            continue;
        }
        if left.kind() != right.kind()
            || (left.kind() == NodeKind::File && right.kind() == NodeKind::File)
        {
            out.insert(prefix);
            continue;
        }

        // Both directories with differing hashes: walk the merged child
        // name sets in lockstep (both snapshots are name-sorted).
        let left_children = left.children_snapshot();
        let right_children = right.children_snapshot();
        let mut li = left_children.into_iter().peekable();
        let mut ri = right_children.into_iter().peekable();
        loop {
            match (li.peek(), ri.peek()) {
                (Some((ln, _)), Some((rn, _))) => {
                    if ln < rn {
                        let (name, _) = li.next().unwrap();
                        out.insert(child_path(&prefix, &name));
                    } else if rn < ln {
                        let (name, _) = ri.next().unwrap();
                        out.insert(child_path(&prefix, &name));
                    } else {
                        let (name, lc) = li.next().unwrap();
                        let (_, rc) = ri.next().unwrap();
                        stack.push((lc, rc, child_path(&prefix, &name)));
                    }
                }
                (Some(_), None) => {
                    let (name, _) = li.next().unwrap();
                    out.insert(child_path(&prefix, &name));
                }
                (None, Some(_)) => {
                    let (name, _) = ri.next().unwrap();
                    out.insert(child_path(&prefix, &name));
                }
                (None, None) => break,
            }
        }
    }

    Ok(out)
}
