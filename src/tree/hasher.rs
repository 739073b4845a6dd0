//! Node hash computation.
//!
//! The digest algorithm sits behind [`DigestAlgorithm`] so it can be swapped
//! without touching tree logic; BLAKE3 is the default. Node payloads use an
//! unambiguous encoding: a type tag separates file from directory digests,
//! and every child name/hash pair is length-prefixed. Plain concatenation is
//! not acceptable here, since distinct child sequences can concatenate to
//! the same byte string (name `ab` + hash `c...` vs name `a` + hash `bc...`).
//!
//! [`HashEngine`] performs the lazy recompute: an explicit post-order stack
//! over the invalid region, optimistic commits gated on per-node generation
//! snapshots, and a bounded retry loop. No structural lock is held across a
//! content-provider call.

use crate::error::TreeError;
use crate::provider::ContentHashProvider;
use crate::tree::node::Node;
use crate::types::{Digest, NodeKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Payload tag for file nodes.
const FILE_TAG: &[u8] = b"file";
/// Payload tag for directory nodes.
const DIR_TAG: &[u8] = b"dir";

/// Single-capability seam over the underlying digest function.
pub trait DigestAlgorithm: Send + Sync {
    fn digest(&self, payload: &[u8]) -> Digest;
}

/// Default algorithm: BLAKE3.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Algorithm;

impl DigestAlgorithm for Blake3Algorithm {
    fn digest(&self, payload: &[u8]) -> Digest {
        *blake3::hash(payload).as_bytes()
    }
}

/// Encode a file node payload: tag, then the length-prefixed content digest.
pub fn encode_file(content: &Digest) -> Vec<u8> {
    let mut payload = Vec::with_capacity(FILE_TAG.len() + 8 + content.len());
    payload.extend_from_slice(FILE_TAG);
    payload.extend_from_slice(&(content.len() as u64).to_be_bytes());
    payload.extend_from_slice(content);
    payload
}

/// Encode a directory node payload: tag, child count, then each child as a
/// length-prefixed name followed by a length-prefixed hash. Children must
/// already be sorted by name (byte-wise lexicographic). The empty directory
/// encodes to the tag plus a zero count, a fixed sentinel distinct from any
/// real child combination.
pub fn encode_directory(children: &[(String, Digest)]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(DIR_TAG);
    payload.extend_from_slice(&(children.len() as u64).to_be_bytes());
    for (name, hash) in children {
        let name_bytes = name.as_bytes();
        payload.extend_from_slice(&(name_bytes.len() as u64).to_be_bytes());
        payload.extend_from_slice(name_bytes);
        payload.extend_from_slice(&(hash.len() as u64).to_be_bytes());
        payload.extend_from_slice(hash);
    }
    payload
}

/// One step of the iterative post-order walk.
enum Step {
    /// First visit: hash a file in place, or schedule a directory's children.
    Enter(Arc<Node>),
    /// Second visit of a directory, with the generation snapshot taken at
    /// `Enter` time: combine child hashes and commit.
    Combine(Arc<Node>, u64),
}

/// Lazy, memoizing hash engine over a namespace tree.
pub struct HashEngine {
    algo: Arc<dyn DigestAlgorithm>,
    provider: Arc<dyn ContentHashProvider>,
    retry_budget: usize,
}

impl HashEngine {
    pub fn new(
        algo: Arc<dyn DigestAlgorithm>,
        provider: Arc<dyn ContentHashProvider>,
        retry_budget: usize,
    ) -> Self {
        Self {
            algo,
            provider,
            retry_budget,
        }
    }

    /// Return the node's Merkle digest, recomputing the invalid region on
    /// demand. O(1) when the node is valid; otherwise O(invalid subtree),
    /// since valid descendants short-circuit on their cached hash.
    pub fn hash(&self, node: &Arc<Node>) -> Result<Digest, TreeError> {
        if let Some(digest) = node.cached_hash() {
            return Ok(digest);
        }
        for attempt in 1..=self.retry_budget {
            if let Some(digest) = self.try_hash(node)? {
                return Ok(digest);
            }
            debug!(
                path = %node.path(),
                attempt,
                "recompute interrupted by concurrent mutation, retrying"
            );
        }
        Err(TreeError::RetryBudgetExceeded {
            path: node.path().to_string(),
            attempts: self.retry_budget,
        })
    }

    /// One optimistic recompute pass. Returns `Ok(None)` when a concurrent
    /// mutation raised a visited node's generation and the pass must be
    /// retried from the top of the affected subtree.
    fn try_hash(&self, node: &Arc<Node>) -> Result<Option<Digest>, TreeError> {
        let mut stack = vec![Step::Enter(node.clone())];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(n) => {
                    if n.cached_hash().is_some() {
                        continue;
                    }
                    match n.kind() {
                        NodeKind::File => {
                            if !self.hash_file(&n)? {
                                return Ok(None);
                            }
                        }
                        NodeKind::Directory => {
                            let snapshot = n.generation();
                            stack.push(Step::Combine(n.clone(), snapshot));
                            for (_, child) in n.children_snapshot() {
                                stack.push(Step::Enter(child));
                            }
                        }
                    }
                }
                Step::Combine(n, snapshot) => {
                    // Re-read children under the lock: every child must have
                    // come out of the recompute still valid, else a mutation
                    // landed mid-pass. Each child's generation is recorded
                    // before its hash and re-verified at commit, so a child
                    // that moves on mid-combination forces a retry.
                    let mut pairs: Vec<(String, Digest)> = Vec::new();
                    let mut witnesses: Vec<(Arc<Node>, u64)> = Vec::new();
                    {
                        let children = n.children.read();
                        for (name, child) in children.iter() {
                            let seen = child.generation();
                            let Some(digest) = child.cached_hash() else {
                                return Ok(None);
                            };
                            pairs.push((name.clone(), digest));
                            witnesses.push((child.clone(), seen));
                        }
                    }
                    let digest = self.algo.digest(&encode_directory(&pairs));
                    if !n.commit_dir_hash(snapshot, digest, &witnesses) {
                        return Ok(None);
                    }
                    trace!(path = %n.path(), "directory hash committed");
                }
            }
        }
        Ok(node.cached_hash())
    }

    /// Hash one file node. The provider call happens with no lock held; the
    /// fetched content digest and node hash commit together under the
    /// generation check. Returns false if the commit lost the race.
    fn hash_file(&self, node: &Arc<Node>) -> Result<bool, TreeError> {
        let snapshot = node.generation();
        let (content, fetched) = match node.content_digest() {
            Some(digest) => (digest, None),
            None => {
                let path = node.path();
                let digest = self.provider.content_digest(&path).map_err(|source| {
                    TreeError::ContentHashUnavailable {
                        path: path.to_string(),
                        source,
                    }
                })?;
                (digest, Some(digest))
            }
        };
        let digest = self.algo.digest(&encode_file(&content));
        Ok(node.commit_hash(snapshot, digest, fetched))
    }

    /// Recompute a subtree's digest from scratch, trusting no cached hash or
    /// validity bit and writing nothing back. Used by the trust audit.
    /// Advisory under concurrent mutation: the result reflects some
    /// interleaving of in-flight changes.
    pub fn recompute_unchecked(&self, node: &Arc<Node>) -> Result<Digest, TreeError> {
        let mut computed: HashMap<usize, Digest> = HashMap::new();
        let mut stack = vec![Step::Enter(node.clone())];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(n) => match n.kind() {
                    NodeKind::File => {
                        let content = match n.content_digest() {
                            Some(digest) => digest,
                            None => {
                                let path = n.path();
                                self.provider.content_digest(&path).map_err(|source| {
                                    TreeError::ContentHashUnavailable {
                                        path: path.to_string(),
                                        source,
                                    }
                                })?
                            }
                        };
                        let digest = self.algo.digest(&encode_file(&content));
                        computed.insert(Arc::as_ptr(&n) as usize, digest);
                    }
                    NodeKind::Directory => {
                        stack.push(Step::Combine(n.clone(), 0));
                        for (_, child) in n.children_snapshot() {
                            stack.push(Step::Enter(child));
                        }
                    }
                },
                Step::Combine(n, _) => {
                    let pairs: Vec<(String, Digest)> = n
                        .children_snapshot()
                        .into_iter()
                        .filter_map(|(name, child)| {
                            computed
                                .get(&(Arc::as_ptr(&child) as usize))
                                .map(|d| (name, *d))
                        })
                        .collect();
                    let digest = self.algo.digest(&encode_directory(&pairs));
                    computed.insert(Arc::as_ptr(&n) as usize, digest);
                }
            }
        }
        computed
            .get(&(Arc::as_ptr(node) as usize))
            .copied()
            .ok_or_else(|| TreeError::NotFound(node.path().to_string()))
    }
}
