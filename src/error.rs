//! Error types shared by the scanning, policy and persistence layers.
//!
//! None of these escape the public operations as panics: parse errors are
//! skipped, scan errors trigger the fallback strategy, and policy errors are
//! returned to the caller with a readable message.

use std::path::PathBuf;

/// Why a single listing line or status block could not become a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected pid, uid and command, found {0} field(s)")]
    TooFewFields(usize),

    #[error("invalid pid: {0:?}")]
    InvalidPid(String),

    #[error("invalid uid: {0:?}")]
    InvalidUid(String),

    #[error("status block has no Uid: line")]
    MissingUid,

    #[error("empty command line")]
    EmptyCommandLine,
}

/// Structured failure of the primary listing strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("listing command failed: {0}")]
    ShellFailed(String),

    #[error("listing produced no process lines")]
    EmptyListing,
}

/// Failure reported by a persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("policy store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("policy store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode policy store: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("policy store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a policy mutation.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid package identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The in-memory change was applied; only durability failed.
    #[error("change applied in memory but not persisted: {0}")]
    Persistence(#[from] PersistenceError),
}
