//! proc-sentinel library
//!
//! Process governance for rooted Android devices. Every interaction with the
//! system goes through a privileged shell session; on top of that sit a
//! process catalog, an allow/deny policy and a controller that terminates
//! processes while refusing to touch protected packages.
//!
//! # Features
//!
//! - **Privileged shell**: one `su` session per command with a hard deadline
//! - **Process catalog**: `ps` listing with a `/proc` status fallback
//! - **Policy store**: default and user allow sets, a user deny set, pluggable persistence
//! - **Controller**: kill by pid, package or uid with policy checks
//!
//! # Usage
//!
//! ```no_run
//! use proc_sentinel::{
//!     EngineSettings, JsonFileStore, PrivilegedShell, SentinelContext, ShellSettings,
//! };
//! use std::sync::Arc;
//!
//! let shell = Arc::new(PrivilegedShell::new(ShellSettings::default()));
//! let store = Box::new(JsonFileStore::new("/data/local/tmp/proc-sentinel"));
//! let ctx = SentinelContext::new(shell, store, EngineSettings::default());
//!
//! if ctx.root_status().is_granted() {
//!     for record in ctx.catalog.scan() {
//!         println!("{} {} {}", record.pid, record.tier(), record.command_line);
//!     }
//!     let sweep = ctx.controller.kill_all_denied();
//!     println!("stopped {} package(s)", sweep.issued());
//! }
//! ```

pub mod context;
pub mod controller;
pub mod error;
pub mod policy;
pub mod process;
pub mod shell;

// Re-export main types for convenience
pub use context::{EngineSettings, SentinelContext, SharedContext};
pub use controller::{
    ActionReport, ActionTarget, CommandTemplates, DeniedSweep, KillOutcome, ProcessController,
};
pub use error::{ParseError, PersistenceError, PolicyError, ScanError};
pub use policy::{JsonFileStore, MemoryStore, PolicyKey, PolicyPersistence, PolicyStore};
pub use process::{PrivilegeTier, ProcessCatalog, ProcessRecord, ScanReport, ScanSettings, ScanStrategy};
pub use shell::{CommandResult, CommandRunner, ExecStatus, PrivilegedShell, RootStatus, ShellSettings};
