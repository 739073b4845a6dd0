//! Error types for the incremental Merkle cache.

use thiserror::Error;

/// Errors raised by tree mutation, hashing, and diff operations.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("parent directory missing for: {0}")]
    ParentMissing(String),

    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("cannot move {0} beneath its own subtree")]
    MoveIntoSelf(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("content hash unavailable for {path}: {source}")]
    ContentHashUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("hash retry budget exhausted for {path} after {attempts} attempts")]
    RetryBudgetExceeded { path: String, attempts: usize },

    #[error("stored hash for {path} does not match recomputation (stored {stored}, computed {computed})")]
    TrustViolation {
        path: String,
        stored: String,
        computed: String,
    },

    #[error("metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the attribute metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt attribute record for {0}")]
    Corrupt(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}
