//! Allow/deny policy and its persistence.
//!
//! - `store`: the in-memory policy with the fixed default allow set
//! - `persistence`: the storage seam plus JSON-file and in-memory backends

pub mod persistence;
pub mod store;

pub use persistence::{JsonFileStore, MemoryStore, PersistedSets, PolicyKey, PolicyPersistence};
pub use store::{
    is_default_allowed, validate_identifier, PolicyStore, DEFAULT_ALLOW, DEFAULT_STORE_NAME,
};
