//! Content hash providers.
//!
//! The leaf content-hashing primitive is an external collaborator: the tree
//! consumes digests, it never reads file bytes itself. Provider calls are
//! the only operation expected to block on I/O, so the hash engine invokes
//! them with no structural lock held.

use crate::tree::path::TreePath;
use crate::types::Digest;
use std::io;
use std::path::PathBuf;
use tracing::trace;

/// Supplies the digest of a file's current bytes. Must be deterministic for
/// unchanged bytes.
pub trait ContentHashProvider: Send + Sync {
    fn content_digest(&self, path: &TreePath) -> Result<Digest, io::Error>;
}

/// Hashes file bytes under a base directory with BLAKE3.
pub struct FsContentHashProvider {
    base: PathBuf,
}

impl FsContentHashProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &TreePath) -> PathBuf {
        let mut full = self.base.clone();
        for segment in path.segments() {
            full.push(segment);
        }
        full
    }
}

impl ContentHashProvider for FsContentHashProvider {
    fn content_digest(&self, path: &TreePath) -> Result<Digest, io::Error> {
        let full = self.resolve(path);
        let bytes = std::fs::read(&full)?;
        trace!(path = %path, size = bytes.len(), "hashed file content");
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

/// Provider for trees whose file digests arrive exclusively through
/// `set_content` (the mutation intercept supplies them). Any fallback call
/// means a digest was never delivered, which is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullContentHashProvider;

impl ContentHashProvider for NullContentHashProvider {
    fn content_digest(&self, path: &TreePath) -> Result<Digest, io::Error> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no content digest recorded for {}", path),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fs_provider_deterministic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "content").unwrap();
        let provider = FsContentHashProvider::new(dir.path());
        let path = TreePath::parse("/a.txt").unwrap();
        let d1 = provider.content_digest(&path).unwrap();
        let d2 = provider.content_digest(&path).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1, *blake3::hash(b"content").as_bytes());
    }

    #[test]
    fn test_fs_provider_missing_file() {
        let dir = TempDir::new().unwrap();
        let provider = FsContentHashProvider::new(dir.path());
        let path = TreePath::parse("/missing").unwrap();
        assert!(provider.content_digest(&path).is_err());
    }

    #[test]
    fn test_null_provider_always_errors() {
        let provider = NullContentHashProvider;
        let path = TreePath::parse("/x").unwrap();
        assert!(provider.content_digest(&path).is_err());
    }
}
