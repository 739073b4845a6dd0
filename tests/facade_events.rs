//! Mutation event handling through the façade.

use canopy::error::TreeError;
use canopy::facade::{MutationEvent, StateCache};
use canopy::ignore::IgnoreList;
use canopy::provider::NullContentHashProvider;
use canopy::tree::TreePath;
use canopy::types::NodeKind;
use std::sync::Arc;

fn p(s: &str) -> TreePath {
    TreePath::parse(s).unwrap()
}

fn cache() -> StateCache {
    StateCache::new(Arc::new(NullContentHashProvider))
}

fn create(cache: &StateCache, path: &str, kind: NodeKind) {
    cache
        .apply(MutationEvent::Create {
            path: p(path),
            kind,
        })
        .unwrap();
}

#[test]
fn test_create_write_delete_round() {
    let cache = cache();
    create(&cache, "/d", NodeKind::Directory);
    create(&cache, "/d/a", NodeKind::File);
    cache.set_content(&p("/d/a"), [1u8; 32]).unwrap();
    let before = cache.root_hash().unwrap();

    cache.apply(MutationEvent::Delete { path: p("/d/a") }).unwrap();
    let after = cache.root_hash().unwrap();
    assert_ne!(before, after);
    assert!(matches!(
        cache.hash_at(&p("/d/a")),
        Err(TreeError::NotFound(_))
    ));
}

#[test]
fn test_delete_drops_stored_attrs_for_subtree() {
    let cache = cache();
    create(&cache, "/d", NodeKind::Directory);
    create(&cache, "/d/a", NodeKind::File);
    cache.set_content(&p("/d/a"), [1u8; 32]).unwrap();
    cache.hash_at(&p("/d/a")).unwrap();
    cache.hash_at(&p("/d")).unwrap();
    assert!(cache.stored_attr(&p("/d/a")).unwrap().is_some());

    cache.apply(MutationEvent::Delete { path: p("/d") }).unwrap();
    assert!(cache.stored_attr(&p("/d")).unwrap().is_none());
    assert!(cache.stored_attr(&p("/d/a")).unwrap().is_none());
}

#[test]
fn test_ignored_create_is_suppressed() {
    let cache = StateCache::builder(Arc::new(NullContentHashProvider))
        .with_ignore(IgnoreList::from_patterns([".git"]))
        .build();
    cache
        .apply(MutationEvent::Create {
            path: p("/.git"),
            kind: NodeKind::Directory,
        })
        .unwrap();
    // Never inserted, never contributes to ancestor hashes.
    assert!(cache.tree().lookup(&p("/.git")).is_err());
    let empty_root = cache.root_hash().unwrap();

    let bare = StateCache::new(Arc::new(NullContentHashProvider));
    assert_eq!(bare.root_hash().unwrap(), empty_root);
}

#[test]
fn test_write_on_missing_path_surfaces_not_found() {
    let cache = cache();
    let err = cache
        .apply(MutationEvent::Write { path: p("/ghost") })
        .unwrap_err();
    assert!(matches!(err, TreeError::NotFound(_)));
}

#[test]
fn test_ordering_fault_conservatively_invalidates() {
    let cache = cache();
    create(&cache, "/d", NodeKind::Directory);
    create(&cache, "/d/a", NodeKind::File);
    cache.set_content(&p("/d/a"), [1u8; 32]).unwrap();
    cache.root_hash().unwrap();
    let d = cache.tree().lookup(&p("/d")).unwrap();
    let a = cache.tree().lookup(&p("/d/a")).unwrap();
    assert!(d.is_valid() && a.is_valid());

    // Create under a parent that was never created: ordering guarantee
    // broken. The deepest existing ancestor's subtree is distrusted.
    let err = cache
        .apply(MutationEvent::Create {
            path: p("/d/missing/x"),
            kind: NodeKind::File,
        })
        .unwrap_err();
    assert!(matches!(err, TreeError::ParentMissing(_)));
    assert!(!d.is_valid());
    assert!(!a.is_valid());
    assert!(!cache.tree().root().is_valid());
}

#[test]
fn test_rename_moves_subtree_and_attrs() {
    let cache = cache();
    create(&cache, "/d", NodeKind::Directory);
    create(&cache, "/e", NodeKind::Directory);
    create(&cache, "/d/a", NodeKind::File);
    cache.set_content(&p("/d/a"), [1u8; 32]).unwrap();
    cache.hash_at(&p("/d/a")).unwrap();

    cache
        .apply(MutationEvent::Rename {
            from: p("/d/a"),
            to: p("/e/a"),
        })
        .unwrap();
    assert!(cache.tree().lookup(&p("/d/a")).is_err());
    assert!(cache.tree().lookup(&p("/e/a")).is_ok());
    // The attr row for the old path is gone; the new path repopulates on
    // the next query.
    assert!(cache.stored_attr(&p("/d/a")).unwrap().is_none());
    cache.hash_at(&p("/e/a")).unwrap();
    assert!(cache.stored_attr(&p("/e/a")).unwrap().is_some());
}

#[test]
fn test_queries_repopulate_after_rename() {
    let cache = cache();
    create(&cache, "/d", NodeKind::Directory);
    create(&cache, "/d/a", NodeKind::File);
    cache.set_content(&p("/d/a"), [1u8; 32]).unwrap();
    let before = cache.root_hash().unwrap();

    cache
        .apply(MutationEvent::Rename {
            from: p("/d/a"),
            to: p("/d/b"),
        })
        .unwrap();
    let after = cache.root_hash().unwrap();
    // Same content, different name: the directory hash must change.
    assert_ne!(before, after);
}
