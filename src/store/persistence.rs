//! Sled-backed attribute store.

use crate::error::StoreError;
use crate::store::{AttrStore, StoredAttr};
use crate::tree::path::TreePath;
use std::path::Path;

/// Persistent [`AttrStore`] on a sled database. Keys are path strings,
/// values are bincode-encoded [`StoredAttr`] records. Sled insertions are
/// atomic per key, which satisfies the per-path atomicity contract.
pub struct SledAttrStore {
    db: sled::Db,
}

impl SledAttrStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)
            .map_err(|e| StoreError::Backend(format!("failed to open sled database: {}", e)))?;
        Ok(Self { db })
    }
}

impl AttrStore for SledAttrStore {
    fn get(&self, path: &TreePath) -> Result<Option<StoredAttr>, StoreError> {
        let key = path.to_string();
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(value) => {
                let attr: StoredAttr = bincode::deserialize(&value)
                    .map_err(|_| StoreError::Corrupt(key))?;
                Ok(Some(attr))
            }
            None => Ok(None),
        }
    }

    fn set(&self, path: &TreePath, attr: StoredAttr) -> Result<(), StoreError> {
        let key = path.to_string();
        let value = bincode::serialize(&attr).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, path: &TreePath) -> Result<(), StoreError> {
        self.db
            .remove(path.to_string().as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sled_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SledAttrStore::open(dir.path().join("attrs")).unwrap();
        let path = TreePath::parse("/d/a").unwrap();

        let attr = StoredAttr {
            hash: [3u8; 32],
            valid: true,
        };
        store.set(&path, attr).unwrap();
        assert_eq!(store.get(&path).unwrap(), Some(attr));

        store.remove(&path).unwrap();
        assert!(store.get(&path).unwrap().is_none());
    }

    #[test]
    fn test_sled_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("attrs");
        let path = TreePath::parse("/f").unwrap();
        let attr = StoredAttr {
            hash: [7u8; 32],
            valid: true,
        };
        {
            let store = SledAttrStore::open(&db_path).unwrap();
            store.set(&path, attr).unwrap();
        }
        let store = SledAttrStore::open(&db_path).unwrap();
        assert_eq!(store.get(&path).unwrap(), Some(attr));
    }
}
