//! Integration tests for the policy store over real file persistence.

use proc_sentinel::policy::{DEFAULT_ALLOW, DEFAULT_STORE_NAME};
use proc_sentinel::{JsonFileStore, PolicyError, PolicyPersistence, PolicyStore};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> PolicyStore {
    let store = PolicyStore::new(Box::new(JsonFileStore::new(dir)), DEFAULT_STORE_NAME);
    store.load().expect("Failed to load policy store");
    store
}

#[test]
fn test_lists_survive_restart() {
    let dir = tempdir().expect("Failed to create temp dir");

    let first = open(dir.path());
    first.add_allow("com.keep.me").unwrap();
    first.add_deny("com.kill.me").unwrap();
    first.add_deny("com.kill.too").unwrap();
    first.remove_deny("com.kill.too").unwrap();
    drop(first);

    let second = open(dir.path());
    assert!(second.is_allowed(Some("com.keep.me")));
    assert!(second.is_denied(Some("com.kill.me")));
    assert!(!second.is_denied(Some("com.kill.too")));
    assert!(second.is_kill_eligible(Some("com.kill.me")));
}

#[test]
fn test_store_file_layout() {
    let dir = tempdir().expect("Failed to create temp dir");
    let policy = open(dir.path());
    policy.add_deny("com.kill.me").unwrap();

    let path = dir.path().join(format!("{DEFAULT_STORE_NAME}.json"));
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(doc["sets"]["user_blacklist"][0], "com.kill.me");
    assert!(doc["updated_at"].is_string());
}

#[test]
fn test_missing_store_starts_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let policy = open(&dir.path().join("not-created-yet"));

    assert!(policy.user_allow().is_empty());
    assert!(policy.user_deny().is_empty());
    assert_eq!(policy.effective_allow().len(), DEFAULT_ALLOW.len());
}

#[test]
fn test_corrupt_store_reported_and_recoverable() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join(format!("{DEFAULT_STORE_NAME}.json"));
    std::fs::write(&path, "]]garbage").unwrap();

    let policy = PolicyStore::new(Box::new(JsonFileStore::new(dir.path())), DEFAULT_STORE_NAME);
    assert!(policy.load().is_err());
    assert!(policy.user_deny().is_empty());

    policy.add_deny("com.kill.me").unwrap();
    let reopened = open(dir.path());
    assert!(reopened.is_denied(Some("com.kill.me")));
}

#[test]
fn test_unwritable_dir_keeps_memory_change() {
    let dir = tempdir().expect("Failed to create temp dir");
    // A plain file where the directory should be.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "").unwrap();

    let policy = PolicyStore::new(Box::new(JsonFileStore::new(&blocker)), DEFAULT_STORE_NAME);
    let err = policy.add_allow("com.keep.me").unwrap_err();

    assert!(matches!(err, PolicyError::Persistence(_)));
    assert!(policy.is_allowed(Some("com.keep.me")));
}

#[test]
fn test_concurrent_mutations_all_persisted() {
    let dir = tempdir().expect("Failed to create temp dir");
    let policy = Arc::new(open(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let policy = Arc::clone(&policy);
            thread::spawn(move || {
                for j in 0..5 {
                    policy.add_deny(&format!("com.app{i}.n{j}")).unwrap();
                    assert!(policy.is_denied(Some(&format!("com.app{i}.n{j}"))));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(policy.user_deny().len(), 40);

    let persisted = JsonFileStore::new(dir.path()).load(DEFAULT_STORE_NAME).unwrap();
    assert_eq!(persisted["user_blacklist"].len(), 40);
}

#[test]
fn test_allow_and_deny_sets_are_independent() {
    let dir = tempdir().expect("Failed to create temp dir");
    let policy = open(dir.path());

    policy.add_allow("com.both").unwrap();
    policy.add_deny("com.both").unwrap();
    policy.remove_allow("com.both").unwrap();

    assert!(!policy.is_allowed(Some("com.both")));
    assert!(policy.is_denied(Some("com.both")));
    assert!(policy.is_kill_eligible(Some("com.both")));
}
