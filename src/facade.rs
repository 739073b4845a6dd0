//! Query/mutation façade.
//!
//! [`StateCache`] is the boundary the mutation intercept and the query
//! surface call into. Mutation events flow through [`StateCache::apply`]
//! into the tree and the invalidation climb; hash and diff queries trigger
//! lazy recomputation. Queries mutate cached hash/validity state by design:
//! repeated queries against an unchanged tree are idempotent and become
//! cheaper.

use crate::config::CacheConfig;
use crate::error::TreeError;
use crate::ignore::IgnoreList;
use crate::provider::ContentHashProvider;
use crate::store::{AttrStore, MemoryAttrStore, SledAttrStore, StoredAttr};
use crate::tree::diff;
use crate::tree::hasher::{Blake3Algorithm, DigestAlgorithm, HashEngine};
use crate::tree::node::invalidate_subtree;
use crate::tree::{subtree_paths, Tree, TreePath};
use crate::types::{digest_hex, Digest, NodeKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Default number of optimistic recompute attempts before a query gives up.
pub const DEFAULT_RETRY_BUDGET: usize = 8;

/// One namespace mutation, as delivered by the external intercept. Events
/// for a given path arrive in namespace order, and a Create is never
/// delivered before its parent's Create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    Create { path: TreePath, kind: NodeKind },
    Write { path: TreePath },
    Delete { path: TreePath },
    Rename { from: TreePath, to: TreePath },
}

/// Incremental Merkle cache over one namespace tree.
pub struct StateCache {
    tree: Tree,
    engine: HashEngine,
    attrs: Arc<dyn AttrStore>,
    ignore: IgnoreList,
}

/// Builder for [`StateCache`], defaulting to BLAKE3, an in-memory attribute
/// store, built-in ignore rules, and the default retry budget.
pub struct StateCacheBuilder {
    provider: Arc<dyn ContentHashProvider>,
    algo: Arc<dyn DigestAlgorithm>,
    attrs: Arc<dyn AttrStore>,
    ignore: IgnoreList,
    retry_budget: usize,
}

impl StateCacheBuilder {
    pub fn new(provider: Arc<dyn ContentHashProvider>) -> Self {
        Self {
            provider,
            algo: Arc::new(Blake3Algorithm),
            attrs: Arc::new(MemoryAttrStore::new()),
            ignore: IgnoreList::builtin(),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_algorithm(mut self, algo: Arc<dyn DigestAlgorithm>) -> Self {
        self.algo = algo;
        self
    }

    pub fn with_attr_store(mut self, attrs: Arc<dyn AttrStore>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreList) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_retry_budget(mut self, retry_budget: usize) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn build(self) -> StateCache {
        StateCache {
            tree: Tree::new(),
            engine: HashEngine::new(self.algo, self.provider, self.retry_budget),
            attrs: self.attrs,
            ignore: self.ignore,
        }
    }
}

impl StateCache {
    /// Cache with all defaults; see [`StateCacheBuilder`].
    pub fn new(provider: Arc<dyn ContentHashProvider>) -> Self {
        StateCacheBuilder::new(provider).build()
    }

    pub fn builder(provider: Arc<dyn ContentHashProvider>) -> StateCacheBuilder {
        StateCacheBuilder::new(provider)
    }

    /// Build from configuration: attribute persistence and ignore patterns
    /// come from the config, everything else from the builder defaults.
    pub fn from_config(
        config: &CacheConfig,
        provider: Arc<dyn ContentHashProvider>,
    ) -> Result<Self, TreeError> {
        let mut builder = StateCacheBuilder::new(provider)
            .with_ignore(IgnoreList::from_patterns(&config.ignore_patterns))
            .with_retry_budget(config.retry_budget);
        if let Some(path) = &config.attr_store_path {
            builder = builder.with_attr_store(Arc::new(SledAttrStore::open(path)?));
        }
        Ok(builder.build())
    }

    /// The underlying tree, for direct lookups and inspection.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn ignore(&self) -> &IgnoreList {
        &self.ignore
    }

    /// Apply one mutation event.
    #[instrument(skip(self))]
    pub fn apply(&self, event: MutationEvent) -> Result<(), TreeError> {
        match event {
            MutationEvent::Create { path, kind } => {
                if self.ignore.should_ignore(&path) {
                    debug!(path = %path, "create suppressed by ignore rules");
                    return Ok(());
                }
                match self.tree.insert(&path, kind) {
                    Ok(_) => {
                        self.stale_ancestor_attrs(&path);
                        Ok(())
                    }
                    Err(e @ (TreeError::ParentMissing(_) | TreeError::AlreadyExists(_))) => {
                        // The intercept guarantees parent-before-child
                        // ordering, so this is an internal consistency
                        // fault. Distrust the nearest intact region rather
                        // than apply the event incorrectly.
                        warn!(path = %path, error = %e, "ordering fault applying create");
                        self.invalidate_existing_ancestor(&path);
                        Err(e)
                    }
                    Err(e) => Err(e),
                }
            }
            MutationEvent::Write { path } => {
                self.tree.mark_content_stale(&path)?;
                self.stale_ancestor_attrs(&path);
                Ok(())
            }
            MutationEvent::Delete { path } => {
                let node = self.tree.lookup(&path)?;
                let stale_paths = subtree_paths(&node);
                drop(node);
                self.tree.remove(&path)?;
                self.forget_attrs(&stale_paths);
                self.stale_ancestor_attrs(&path);
                Ok(())
            }
            MutationEvent::Rename { from, to } => {
                let node = self.tree.lookup(&from)?;
                let stale_paths = subtree_paths(&node);
                drop(node);
                self.tree.rename(&from, &to)?;
                self.forget_attrs(&stale_paths);
                self.stale_ancestor_attrs(&from);
                self.stale_ancestor_attrs(&to);
                Ok(())
            }
        }
    }

    /// Record a file's content digest, as supplied by the intercept.
    pub fn set_content(&self, path: &TreePath, digest: Digest) -> Result<(), TreeError> {
        self.tree.set_content(path, digest)?;
        self.stale_ancestor_attrs(path);
        Ok(())
    }

    /// Merkle digest at a path, recomputing lazily as needed. The committed
    /// result is mirrored into the attribute store.
    #[instrument(skip(self), fields(path = %path))]
    pub fn hash_at(&self, path: &TreePath) -> Result<Digest, TreeError> {
        let node = self.tree.lookup(path)?;
        let digest = self.engine.hash(&node)?;
        self.attrs.set(
            path,
            StoredAttr {
                hash: digest,
                valid: true,
            },
        )?;
        Ok(digest)
    }

    /// Merkle digest of the whole tree.
    pub fn root_hash(&self) -> Result<Digest, TreeError> {
        self.hash_at(&TreePath::root())
    }

    /// Paths at which two subtrees of this cache differ.
    pub fn diff_paths(
        &self,
        a: &TreePath,
        b: &TreePath,
    ) -> Result<BTreeSet<String>, TreeError> {
        let node_a = self.tree.lookup(a)?;
        let node_b = self.tree.lookup(b)?;
        diff::diff(&self.engine, &node_a, &node_b)
    }

    /// Paths at which this cache's tree differs from another cache's tree.
    /// Each side is brought up to date by its own engine (and thus its own
    /// content provider) before the structural comparison.
    pub fn diff_roots(&self, other: &StateCache) -> Result<BTreeSet<String>, TreeError> {
        self.root_hash()?;
        other.root_hash()?;
        diff::diff(&self.engine, &self.tree.root(), &other.tree.root())
    }

    /// Audit a stored attribute against a from-scratch recomputation. A
    /// valid stored hash that no longer matches indicates out-of-band
    /// tampering with the store; it is reported, never auto-repaired.
    pub fn audit(&self, path: &TreePath) -> Result<(), TreeError> {
        let Some(attr) = self.attrs.get(path)? else {
            return Ok(());
        };
        if !attr.valid {
            return Ok(());
        }
        let node = self.tree.lookup(path)?;
        let computed = self.engine.recompute_unchecked(&node)?;
        if computed != attr.hash {
            warn!(
                path = %path,
                stored = %digest_hex(&attr.hash),
                computed = %digest_hex(&computed),
                "trust violation: stored hash does not match recomputation"
            );
            return Err(TreeError::TrustViolation {
                path: path.to_string(),
                stored: digest_hex(&attr.hash),
                computed: digest_hex(&computed),
            });
        }
        Ok(())
    }

    /// Stored attribute for a path, if any.
    pub fn stored_attr(&self, path: &TreePath) -> Result<Option<StoredAttr>, TreeError> {
        Ok(self.attrs.get(path)?)
    }

    /// Mark stored attrs along a path's ancestor chain invalid. The tree's
    /// in-memory invalidation already happened; this keeps the private
    /// store from asserting validity it no longer has. A store hiccup here
    /// is logged, not fatal: invalidation itself must not fail.
    fn stale_ancestor_attrs(&self, path: &TreePath) {
        let mut cur = Some(path.clone());
        while let Some(at) = cur {
            match self.attrs.get(&at) {
                Ok(Some(mut attr)) if attr.valid => {
                    attr.valid = false;
                    if let Err(e) = self.attrs.set(&at, attr) {
                        warn!(path = %at, error = %e, "failed to stale stored attribute");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %at, error = %e, "failed to read stored attribute");
                }
            }
            cur = at.parent();
        }
    }

    fn forget_attrs(&self, paths: &[TreePath]) {
        for path in paths {
            if let Err(e) = self.attrs.remove(path) {
                warn!(path = %path, error = %e, "failed to drop stale attribute");
            }
        }
    }

    /// Walk up from a missing path to the deepest ancestor actually in the
    /// tree and conservatively invalidate its whole subtree.
    fn invalidate_existing_ancestor(&self, path: &TreePath) {
        let mut candidate = path.parent();
        while let Some(ancestor_path) = candidate {
            if let Ok(node) = self.tree.lookup(&ancestor_path) {
                invalidate_subtree(&node);
                return;
            }
            candidate = ancestor_path.parent();
        }
        invalidate_subtree(&self.tree.root());
    }
}
