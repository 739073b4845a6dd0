//! Initial population from an on-disk directory.
//!
//! A cache normally mirrors its namespace through the mutation intercept,
//! but a freshly constructed cache starts empty. `bootstrap` walks a real
//! directory top-down (parents before children, names sorted, symlinks not
//! followed) and feeds Create events through the façade, pruning ignored
//! subtrees before descent. File content digests are left to the lazy path:
//! the content provider fetches them on first hash query.

use crate::error::TreeError;
use crate::facade::{MutationEvent, StateCache};
use crate::tree::TreePath;
use crate::types::NodeKind;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Counts from one bootstrap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
}

/// Populate an empty cache from the directory at `root`.
#[instrument(skip(cache), fields(root = %root.as_ref().display()))]
pub fn bootstrap(cache: &StateCache, root: impl AsRef<Path>) -> Result<ScanSummary, TreeError> {
    let root = root.as_ref();
    let start = Instant::now();
    let mut summary = ScanSummary::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = entry.map_err(|e| {
            TreeError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("failed to walk {}: {}", root.display(), e),
            ))
        })?;
        if entry.path() == root {
            continue;
        }
        let Some(path) = tree_path_for(root, entry.path()) else {
            summary.skipped += 1;
            continue;
        };
        if cache.ignore().should_ignore(&path) {
            debug!(path = %path, "skipping ignored entry");
            summary.skipped += 1;
            continue;
        }

        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            NodeKind::Directory
        } else if file_type.is_file() {
            NodeKind::File
        } else {
            // Symlinks and special files are not part of the namespace.
            summary.skipped += 1;
            continue;
        };
        cache.apply(MutationEvent::Create {
            path,
            kind,
        })?;
        match kind {
            NodeKind::Directory => summary.directories += 1,
            NodeKind::File => summary.files += 1,
        }
    }

    info!(
        directories = summary.directories,
        files = summary.files,
        skipped = summary.skipped,
        duration_ms = start.elapsed().as_millis(),
        "bootstrap scan completed"
    );
    Ok(summary)
}

/// Convert an absolute walked path to a tree path relative to `root`.
/// Returns `None` for paths that do not round-trip through UTF-8.
fn tree_path_for(root: &Path, path: &Path) -> Option<TreePath> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        segments.push(component.as_os_str().to_str()?.to_string());
    }
    TreePath::from_segments(segments).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FsContentHashProvider;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_builds_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/a.txt"), "aaa").unwrap();
        fs::write(dir.path().join("top.txt"), "ttt").unwrap();

        let cache = StateCache::new(Arc::new(FsContentHashProvider::new(dir.path())));
        let summary = bootstrap(&cache, dir.path()).unwrap();
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.files, 2);

        assert!(cache.tree().lookup(&TreePath::parse("/d/a.txt").unwrap()).is_ok());
        // Lazy hashing: the provider is only consulted here.
        cache.root_hash().unwrap();
    }

    #[test]
    fn test_bootstrap_prunes_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config"), "x").unwrap();
        fs::write(dir.path().join("kept.txt"), "y").unwrap();

        let cache = StateCache::new(Arc::new(FsContentHashProvider::new(dir.path())));
        let summary = bootstrap(&cache, dir.path()).unwrap();
        assert_eq!(summary.files, 1);
        assert!(summary.skipped >= 2);
        assert!(cache.tree().lookup(&TreePath::parse("/.git").unwrap()).is_err());
    }
}
