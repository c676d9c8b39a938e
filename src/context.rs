//! Shared engine state.
//!
//! One context owns the shell, the policy store, the catalog and the
//! controller. It is built once at startup and passed by reference (or
//! through [`SharedContext`]) to whatever drives the engine.

use std::sync::Arc;
use tracing::{info, warn};

use crate::controller::{CommandTemplates, ProcessController};
use crate::policy::{PolicyPersistence, PolicyStore, DEFAULT_STORE_NAME};
use crate::process::{ProcessCatalog, ScanSettings};
use crate::shell::{CommandRunner, RootStatus};

/// Type alias for shared engine state.
pub type SharedContext = Arc<SentinelContext>;

/// Everything needed to build a [`SentinelContext`] besides its collaborators.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub store_name: String,
    pub scan: ScanSettings,
    pub templates: CommandTemplates,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            scan: ScanSettings::default(),
            templates: CommandTemplates::default(),
        }
    }
}

pub struct SentinelContext {
    pub shell: Arc<dyn CommandRunner>,
    pub policy: Arc<PolicyStore>,
    pub catalog: Arc<ProcessCatalog>,
    pub controller: ProcessController,
}

impl SentinelContext {
    /// Wires the components together and restores the persisted policy.
    ///
    /// An unreadable policy store is logged and leaves the user sets empty.
    pub fn new(
        shell: Arc<dyn CommandRunner>,
        persistence: Box<dyn PolicyPersistence>,
        settings: EngineSettings,
    ) -> Self {
        let policy = Arc::new(PolicyStore::new(persistence, settings.store_name));
        if let Err(e) = policy.load() {
            warn!(error = %e, "policy store unreadable, starting with empty user lists");
        }

        let catalog = Arc::new(ProcessCatalog::new(
            Arc::clone(&shell),
            Arc::clone(&policy),
            settings.scan,
        ));
        let controller = ProcessController::new(
            Arc::clone(&shell),
            Arc::clone(&policy),
            Arc::clone(&catalog),
            settings.templates,
        );

        info!(store = policy.store_name(), "engine context ready");

        Self {
            shell,
            policy,
            catalog,
            controller,
        }
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(self)
    }

    /// Probes root once through the context's shell.
    pub fn root_status(&self) -> RootStatus {
        RootStatus::probe(self.shell.as_ref())
    }
}
