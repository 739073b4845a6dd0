//! Normalized tree paths.
//!
//! A [`TreePath`] addresses a node relative to a tree root: a sequence of
//! entry names with no `.`/`..` components and no empty segments. Names are
//! folded to Unicode NFC so that two byte-distinct spellings of the same
//! name resolve to the same entry and hash identically.

use crate::error::TreeError;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Relative path within a namespace tree. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a slash-separated path. Leading and trailing slashes are
    /// tolerated; `.` and `..` segments are rejected.
    pub fn parse(raw: &str) -> Result<Self, TreeError> {
        let mut segments = Vec::new();
        for part in raw.split('/') {
            if part.is_empty() {
                continue;
            }
            if part == "." || part == ".." {
                return Err(TreeError::InvalidPath(raw.to_string()));
            }
            segments.push(normalize_name(part));
        }
        Ok(Self { segments })
    }

    /// Build a path from pre-split segments, normalizing each.
    pub fn from_segments<I, S>(parts: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = Vec::new();
        for part in parts {
            let part = part.as_ref();
            if part.is_empty() || part.contains('/') || part == "." || part == ".." {
                return Err(TreeError::InvalidPath(part.to_string()));
            }
            segments.push(normalize_name(part));
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Final segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<TreePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(TreePath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one already-valid entry name.
    pub fn join(&self, name: &str) -> TreePath {
        let mut segments = self.segments.clone();
        segments.push(normalize_name(name));
        TreePath { segments }
    }

    /// True if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &TreePath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.segments.join("/"))
        }
    }
}

impl std::str::FromStr for TreePath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TreePath::parse(s)
    }
}

/// Normalize an entry name to NFC.
pub fn normalize_name(name: &str) -> String {
    name.nfc().collect()
}
