//! Configuration wiring and durable attribute storage.

use canopy::config::CacheConfig;
use canopy::facade::{MutationEvent, StateCache};
use canopy::provider::NullContentHashProvider;
use canopy::tree::TreePath;
use canopy::types::NodeKind;
use std::sync::Arc;
use tempfile::TempDir;

fn p(s: &str) -> TreePath {
    TreePath::parse(s).unwrap()
}

#[test]
fn test_from_config_applies_ignore_and_budget() {
    let config = CacheConfig {
        ignore_patterns: vec!["scratch".to_string()],
        ..CacheConfig::default()
    };
    let cache = StateCache::from_config(&config, Arc::new(NullContentHashProvider)).unwrap();
    cache
        .apply(MutationEvent::Create {
            path: p("/scratch"),
            kind: NodeKind::Directory,
        })
        .unwrap();
    assert!(cache.tree().lookup(&p("/scratch")).is_err());
    // Built-in defaults were replaced, not merged.
    cache
        .apply(MutationEvent::Create {
            path: p("/target"),
            kind: NodeKind::Directory,
        })
        .unwrap();
    assert!(cache.tree().lookup(&p("/target")).is_ok());
}

#[test]
fn test_attrs_survive_cache_restart_when_configured() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        attr_store_path: Some(dir.path().join("attrs")),
        ..CacheConfig::default()
    };

    let root_hash = {
        let cache =
            StateCache::from_config(&config, Arc::new(NullContentHashProvider)).unwrap();
        cache.root_hash().unwrap()
    };

    // A fresh cache over the same store sees the previous run's attribute
    // and, for the same (empty) namespace, the audit agrees with it.
    let cache = StateCache::from_config(&config, Arc::new(NullContentHashProvider)).unwrap();
    let stored = cache.stored_attr(&TreePath::root()).unwrap().unwrap();
    assert_eq!(stored.hash, root_hash);
    assert!(stored.valid);
    cache.audit(&TreePath::root()).unwrap();
}
