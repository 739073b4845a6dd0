//! Attribute metadata store.
//!
//! Mirrors committed `{hash, valid}` pairs per path. The store is owned
//! exclusively by the façade's write path; it is a projection of the
//! in-memory tree, never an authority over it. An out-of-band write to this
//! store is exactly what the trust audit exists to detect.

pub mod persistence;

pub use persistence::SledAttrStore;

use crate::error::StoreError;
use crate::tree::path::TreePath;
use crate::types::Digest;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored attributes for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttr {
    pub hash: Digest,
    pub valid: bool,
}

/// Per-path attribute storage. Each operation is atomic per path.
pub trait AttrStore: Send + Sync {
    fn get(&self, path: &TreePath) -> Result<Option<StoredAttr>, StoreError>;
    fn set(&self, path: &TreePath, attr: StoredAttr) -> Result<(), StoreError>;
    fn remove(&self, path: &TreePath) -> Result<(), StoreError>;
}

/// In-memory store; the default when durability is not configured.
#[derive(Debug, Default)]
pub struct MemoryAttrStore {
    attrs: RwLock<HashMap<String, StoredAttr>>,
}

impl MemoryAttrStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttrStore for MemoryAttrStore {
    fn get(&self, path: &TreePath) -> Result<Option<StoredAttr>, StoreError> {
        Ok(self.attrs.read().get(&path.to_string()).copied())
    }

    fn set(&self, path: &TreePath, attr: StoredAttr) -> Result<(), StoreError> {
        self.attrs.write().insert(path.to_string(), attr);
        Ok(())
    }

    fn remove(&self, path: &TreePath) -> Result<(), StoreError> {
        self.attrs.write().remove(&path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryAttrStore::new();
        let path = TreePath::parse("/d/a").unwrap();
        assert!(store.get(&path).unwrap().is_none());

        let attr = StoredAttr {
            hash: [9u8; 32],
            valid: true,
        };
        store.set(&path, attr).unwrap();
        assert_eq!(store.get(&path).unwrap(), Some(attr));

        store.remove(&path).unwrap();
        assert!(store.get(&path).unwrap().is_none());
    }
}
