//! Configuration.
//!
//! Everything has a serde default, so an empty TOML file (or no file at
//! all) yields a working cache. Whether validity metadata persists across
//! restarts is a deployment choice: set `attr_store_path` to keep attributes
//! in a sled database, leave it unset to rebuild lazily from scratch.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for a [`StateCache`](crate::facade::StateCache).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Optimistic recompute attempts before a query fails transiently.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: usize,

    /// Sled database path for persistent attributes; `None` keeps them in
    /// memory only.
    #[serde(default)]
    pub attr_store_path: Option<PathBuf>,

    /// Ignore patterns; see [`IgnoreList`](crate::ignore::IgnoreList).
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_retry_budget() -> usize {
    crate::facade::DEFAULT_RETRY_BUDGET
}

fn default_ignore_patterns() -> Vec<String> {
    [".git", "target", "node_modules", ".cargo"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retry_budget: default_retry_budget(),
            attr_store_path: None,
            ignore_patterns: default_ignore_patterns(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: CacheConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_budget == 0 {
            return Err(ConfigError::Invalid(
                "retry_budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
