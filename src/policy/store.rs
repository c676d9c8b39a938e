//! Allow/deny policy over package identifiers.
//!
//! The effective allow set is the fixed default set plus the user allow set;
//! the deny set is user-only. A package that is both allowed and denied is
//! treated as allowed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::{PersistenceError, PolicyError};
use crate::policy::persistence::{PolicyKey, PolicyPersistence};

/// Packages that can never be terminated, whatever the user sets contain.
pub const DEFAULT_ALLOW: &[&str] = &[
    "android",
    "system",
    "com.android.systemui",
    "com.android.phone",
];

/// Store name used when the configuration does not override it.
pub const DEFAULT_STORE_NAME: &str = "whitelist_prefs";

// Package names, process-name suffixes (`:remote`) and dashes. Anything else
// would end up inside a shell command line.
static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.:\-]*$").expect("identifier pattern must compile")
});

/// Trims `id` and checks it is a usable package identifier.
pub fn validate_identifier(id: &str) -> Result<String, PolicyError> {
    let trimmed = id.trim();
    if IDENTIFIER_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(PolicyError::InvalidIdentifier(id.to_string()))
    }
}

pub fn is_default_allowed(id: &str) -> bool {
    DEFAULT_ALLOW.contains(&id)
}

#[derive(Debug, Default)]
struct UserSets {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl UserSets {
    fn get_mut(&mut self, key: PolicyKey) -> &mut BTreeSet<String> {
        match key {
            PolicyKey::UserAllow => &mut self.allow,
            PolicyKey::UserDeny => &mut self.deny,
        }
    }

    fn allows(&self, id: &str) -> bool {
        is_default_allowed(id) || self.allow.contains(id)
    }
}

/// Thread-safe policy store backed by a persistence collaborator.
pub struct PolicyStore {
    persistence: Box<dyn PolicyPersistence>,
    store_name: String,
    sets: Mutex<UserSets>,
}

impl PolicyStore {
    /// Creates a store with empty user sets; call [`PolicyStore::load`] to restore saved ones.
    pub fn new(persistence: Box<dyn PolicyPersistence>, store_name: impl Into<String>) -> Self {
        Self {
            persistence,
            store_name: store_name.into(),
            sets: Mutex::new(UserSets::default()),
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    fn lock(&self) -> MutexGuard<'_, UserSets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the user sets with the persisted ones.
    ///
    /// On failure the user sets are left empty and the error is returned so
    /// the caller can report it; the store stays usable either way.
    pub fn load(&self) -> Result<(), PersistenceError> {
        let loaded = self.persistence.load(&self.store_name);
        let mut sets = self.lock();
        *sets = UserSets::default();

        let mut persisted = loaded?;
        for key in [PolicyKey::UserAllow, PolicyKey::UserDeny] {
            let values = persisted.remove(key.as_str()).unwrap_or_default();
            let target = sets.get_mut(key);
            for value in values {
                match validate_identifier(&value) {
                    Ok(id) => {
                        target.insert(id);
                    }
                    Err(_) => warn!(key = key.as_str(), value = %value, "dropping invalid persisted identifier"),
                }
            }
        }

        info!(
            store = %self.store_name,
            allow = sets.allow.len(),
            deny = sets.deny.len(),
            "policy loaded"
        );
        Ok(())
    }

    /// True for default-allowed packages and members of the user allow set.
    pub fn is_allowed(&self, id: Option<&str>) -> bool {
        match id {
            Some(id) if !id.is_empty() => self.lock().allows(id),
            _ => false,
        }
    }

    pub fn is_denied(&self, id: Option<&str>) -> bool {
        match id {
            Some(id) if !id.is_empty() => self.lock().deny.contains(id),
            _ => false,
        }
    }

    /// Denied and not allowed, evaluated against a single snapshot of the sets.
    pub fn is_kill_eligible(&self, id: Option<&str>) -> bool {
        match id {
            Some(id) if !id.is_empty() => {
                let sets = self.lock();
                sets.deny.contains(id) && !sets.allows(id)
            }
            _ => false,
        }
    }

    pub fn add_allow(&self, id: &str) -> Result<bool, PolicyError> {
        self.insert(PolicyKey::UserAllow, id)
    }

    pub fn remove_allow(&self, id: &str) -> Result<bool, PolicyError> {
        self.remove(PolicyKey::UserAllow, id)
    }

    pub fn add_deny(&self, id: &str) -> Result<bool, PolicyError> {
        self.insert(PolicyKey::UserDeny, id)
    }

    pub fn remove_deny(&self, id: &str) -> Result<bool, PolicyError> {
        self.remove(PolicyKey::UserDeny, id)
    }

    /// Default set plus user allow set.
    pub fn effective_allow(&self) -> BTreeSet<String> {
        let sets = self.lock();
        DEFAULT_ALLOW
            .iter()
            .map(|s| s.to_string())
            .chain(sets.allow.iter().cloned())
            .collect()
    }

    pub fn user_allow(&self) -> BTreeSet<String> {
        self.lock().allow.clone()
    }

    pub fn user_deny(&self) -> BTreeSet<String> {
        self.lock().deny.clone()
    }

    /// Returns whether the set changed.
    fn insert(&self, key: PolicyKey, id: &str) -> Result<bool, PolicyError> {
        let id = validate_identifier(id)?;
        self.mutate(key, |set| set.insert(id))
    }

    /// Removing an absent or malformed identifier is a no-op.
    fn remove(&self, key: PolicyKey, id: &str) -> Result<bool, PolicyError> {
        let id = id.trim();
        self.mutate(key, |set| set.remove(id))
    }

    // The lock is held through the save so saves land in mutation order.
    fn mutate<F>(&self, key: PolicyKey, apply: F) -> Result<bool, PolicyError>
    where
        F: FnOnce(&mut BTreeSet<String>) -> bool,
    {
        let mut sets = self.lock();
        let set = sets.get_mut(key);
        let changed = apply(set);

        match self.persistence.save(&self.store_name, key.as_str(), set) {
            Ok(()) => {
                debug!(key = key.as_str(), changed, entries = set.len(), "policy set persisted");
                Ok(changed)
            }
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "policy change kept in memory only");
                Err(PolicyError::Persistence(e))
            }
        }
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sets = self.lock();
        f.debug_struct("PolicyStore")
            .field("store_name", &self.store_name)
            .field("allow", &sets.allow)
            .field("deny", &sets.deny)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::persistence::MemoryStore;
    use std::sync::Arc;

    fn store() -> (Arc<MemoryStore>, PolicyStore) {
        let backend = Arc::new(MemoryStore::new());
        let policy = PolicyStore::new(Box::new(backend.clone()), DEFAULT_STORE_NAME);
        (backend, policy)
    }

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("  com.foo.bar ").unwrap(), "com.foo.bar");
        assert!(validate_identifier("com.foo:remote").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier("com.foo; reboot").is_err());
        assert!(validate_identifier("$(id)").is_err());
        assert!(validate_identifier("-rf").is_err());
    }

    #[test]
    fn test_defaults_always_allowed() {
        let (_, policy) = store();
        for id in DEFAULT_ALLOW {
            assert!(policy.is_allowed(Some(id)));
        }
        assert!(!policy.is_allowed(Some("com.example.app")));
        assert!(!policy.is_allowed(Some("")));
        assert!(!policy.is_allowed(None));
    }

    #[test]
    fn test_remove_allow_cannot_drop_default() {
        let (_, policy) = store();
        policy.remove_allow("android").unwrap();
        assert!(policy.is_allowed(Some("android")));
    }

    #[test]
    fn test_allow_wins_over_deny() {
        let (_, policy) = store();
        policy.add_deny("com.example.app").unwrap();
        assert!(policy.is_kill_eligible(Some("com.example.app")));

        policy.add_allow("com.example.app").unwrap();
        assert!(policy.is_denied(Some("com.example.app")));
        assert!(!policy.is_kill_eligible(Some("com.example.app")));

        policy.add_deny("system").unwrap();
        assert!(!policy.is_kill_eligible(Some("system")));
    }

    #[test]
    fn test_mutation_reports_change() {
        let (backend, policy) = store();
        assert!(policy.add_deny("com.a").unwrap());
        assert!(!policy.add_deny("com.a").unwrap());
        assert!(policy.remove_deny("com.a").unwrap());
        assert!(!policy.remove_deny("com.a").unwrap());
        assert_eq!(backend.save_count(), 4);
    }

    #[test]
    fn test_add_allow_is_idempotent() {
        let (_, policy) = store();
        policy.add_allow("com.keep.me").unwrap();
        let once = policy.effective_allow();

        policy.add_allow("com.keep.me").unwrap();
        assert_eq!(policy.effective_allow(), once);
        assert_eq!(once.len(), DEFAULT_ALLOW.len() + 1);

        assert!(!policy.remove_allow("com.never.added").unwrap());
        assert_eq!(policy.effective_allow(), once);
    }

    #[test]
    fn test_invalid_identifier_not_persisted() {
        let (backend, policy) = store();
        assert!(matches!(
            policy.add_allow("bad id"),
            Err(PolicyError::InvalidIdentifier(_))
        ));
        assert_eq!(backend.save_count(), 0);
        assert!(policy.user_allow().is_empty());
    }

    #[test]
    fn test_persistence_failure_keeps_memory_change() {
        let (backend, policy) = store();
        backend.set_fail_saves(true);

        let err = policy.add_deny("com.a").unwrap_err();
        assert!(matches!(err, PolicyError::Persistence(_)));
        assert!(policy.is_denied(Some("com.a")));
        assert!(backend.snapshot(DEFAULT_STORE_NAME).is_empty());
    }

    #[test]
    fn test_load_restores_and_filters() {
        let backend = Arc::new(MemoryStore::new());
        backend.seed(DEFAULT_STORE_NAME, PolicyKey::UserAllow, &["com.keep"]);
        backend.seed(DEFAULT_STORE_NAME, PolicyKey::UserDeny, &["com.kill", "rm -rf"]);

        let policy = PolicyStore::new(Box::new(backend), DEFAULT_STORE_NAME);
        policy.load().unwrap();

        assert!(policy.is_allowed(Some("com.keep")));
        assert!(policy.is_denied(Some("com.kill")));
        assert_eq!(policy.user_deny().len(), 1);
    }

    #[test]
    fn test_load_failure_leaves_empty_sets() {
        let backend = Arc::new(MemoryStore::new());
        backend.seed(DEFAULT_STORE_NAME, PolicyKey::UserDeny, &["com.kill"]);
        backend.set_fail_loads(true);

        let policy = PolicyStore::new(Box::new(backend), DEFAULT_STORE_NAME);
        assert!(policy.load().is_err());
        assert!(policy.user_deny().is_empty());
        assert!(policy.is_allowed(Some("android")));
    }

    #[test]
    fn test_effective_allow_includes_defaults() {
        let (_, policy) = store();
        policy.add_allow("com.user").unwrap();
        let effective = policy.effective_allow();
        assert!(effective.contains("com.user"));
        assert!(effective.contains("com.android.phone"));
        assert_eq!(effective.len(), DEFAULT_ALLOW.len() + 1);
    }
}
