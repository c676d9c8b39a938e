//! Persistence collaborators for the user allow/deny sets.
//!
//! The policy store only needs `load(store) -> key -> set` and
//! `save(store, key, set)`. How durability or confidentiality is achieved is
//! up to the implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::error::PersistenceError;

/// Key -> identifier set, as stored under one store name.
pub type PersistedSets = BTreeMap<String, BTreeSet<String>>;

/// The two persisted sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKey {
    UserAllow,
    UserDeny,
}

impl PolicyKey {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKey::UserAllow => "user_whitelist",
            PolicyKey::UserDeny => "user_blacklist",
        }
    }
}

/// Storage backend for the policy store.
pub trait PolicyPersistence: Send + Sync {
    /// All sets saved under `store_name`; an absent store is an empty map.
    fn load(&self, store_name: &str) -> Result<PersistedSets, PersistenceError>;

    /// Replaces the set saved under `store_name`/`key`.
    fn save(&self, store_name: &str, key: &str, values: &BTreeSet<String>) -> Result<(), PersistenceError>;
}

impl<T: PolicyPersistence + ?Sized> PolicyPersistence for Arc<T> {
    fn load(&self, store_name: &str) -> Result<PersistedSets, PersistenceError> {
        (**self).load(store_name)
    }

    fn save(&self, store_name: &str, key: &str, values: &BTreeSet<String>) -> Result<(), PersistenceError> {
        (**self).save(store_name, key, values)
    }
}

/// On-disk layout of one store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sets: PersistedSets,
}

/// One pretty-printed JSON document per store under a directory.
///
/// Writes go to a sibling temp file which is then renamed over the target, so
/// a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, store_name: &str) -> PathBuf {
        self.dir.join(format!("{store_name}.json"))
    }

    fn read_document(path: &Path) -> Result<StoreDocument, PersistenceError> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| PersistenceError::Corrupt {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(source) => Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl PolicyPersistence for JsonFileStore {
    fn load(&self, store_name: &str) -> Result<PersistedSets, PersistenceError> {
        let path = self.path_for(store_name);
        let doc = Self::read_document(&path)?;
        debug!(path = %path.display(), keys = doc.sets.len(), "loaded policy store");
        Ok(doc.sets)
    }

    fn save(&self, store_name: &str, key: &str, values: &BTreeSet<String>) -> Result<(), PersistenceError> {
        let path = self.path_for(store_name);
        let io_err = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut doc = match Self::read_document(&path) {
            Ok(doc) => doc,
            Err(e @ PersistenceError::Corrupt { .. }) => {
                warn!(error = %e, "replacing corrupt policy store");
                StoreDocument::default()
            }
            Err(e) => return Err(e),
        };

        doc.sets.insert(key.to_string(), values.clone());
        doc.updated_at = Some(Utc::now());

        let body = serde_json::to_string_pretty(&doc)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        debug!(path = %path.display(), key, entries = values.len(), "saved policy set");
        Ok(())
    }
}

/// In-process store with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: Mutex<HashMap<String, PersistedSets>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one set before the store is handed to a policy store.
    pub fn seed(&self, store_name: &str, key: PolicyKey, values: &[&str]) {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(store_name.to_string())
            .or_default()
            .insert(key.as_str().to_string(), values.iter().map(|v| v.to_string()).collect());
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, store_name: &str) -> PersistedSets {
        let stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores.get(store_name).cloned().unwrap_or_default()
    }
}

impl PolicyPersistence for MemoryStore {
    fn load(&self, store_name: &str) -> Result<PersistedSets, PersistenceError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(format!("load of {store_name} refused")));
        }
        Ok(self.snapshot(store_name))
    }

    fn save(&self, store_name: &str, key: &str, values: &BTreeSet<String>) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(format!("save of {store_name}/{key} refused")));
        }
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(store_name.to_string())
            .or_default()
            .insert(key.to_string(), values.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
