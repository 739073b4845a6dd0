//! Shared primitive types.

use serde::{Deserialize, Serialize};

/// 32-byte digest produced by the configured hash algorithm.
pub type Digest = [u8; 32];

/// Length of a [`Digest`] in bytes.
pub const DIGEST_LEN: usize = 32;

/// Kind of a namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

/// Render a digest as lowercase hex for logs and error messages.
pub fn digest_hex(digest: &Digest) -> String {
    hex::encode(digest)
}
