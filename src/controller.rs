//! Termination actions with policy enforcement.
//!
//! Every action goes through the privileged shell as a single command built
//! from a template. Protected packages are checked before anything is sent,
//! so a refused action costs no shell session.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::policy::{validate_identifier, PolicyStore};
use crate::process::{is_user_app, ProcessCatalog, ProcessRecord};
use crate::shell::CommandRunner;

pub const DEFAULT_KILL_PID_COMMAND: &str = "kill -9 {pid}";
pub const DEFAULT_FORCE_STOP_COMMAND: &str = "am force-stop {package}";
pub const DEFAULT_KILL_UID_COMMAND: &str = "killall -u {uid}";

/// Command templates; `{pid}`, `{package}` and `{uid}` are substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplates {
    pub kill_pid: String,
    pub force_stop: String,
    pub kill_uid: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            kill_pid: DEFAULT_KILL_PID_COMMAND.to_string(),
            force_stop: DEFAULT_FORCE_STOP_COMMAND.to_string(),
            kill_uid: DEFAULT_KILL_UID_COMMAND.to_string(),
        }
    }
}

impl CommandTemplates {
    pub fn kill_pid_command(&self, pid: u32) -> String {
        self.kill_pid.replace("{pid}", &pid.to_string())
    }

    /// `package` must already be a validated identifier.
    pub fn force_stop_command(&self, package: &str) -> String {
        self.force_stop.replace("{package}", package)
    }

    pub fn kill_uid_command(&self, uid: u32) -> String {
        self.kill_uid.replace("{uid}", &uid.to_string())
    }
}

/// Result of one termination request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum KillOutcome {
    /// The shell accepted the command.
    Issued,
    /// Refused because the target is allowed.
    Protected,
    /// Refused before reaching the shell.
    Rejected(String),
    /// The shell ran but reported failure.
    Failed(String),
}

impl KillOutcome {
    pub fn is_issued(&self) -> bool {
        matches!(self, KillOutcome::Issued)
    }
}

impl fmt::Display for KillOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillOutcome::Issued => f.write_str("issued"),
            KillOutcome::Protected => f.write_str("protected"),
            KillOutcome::Rejected(reason) => write!(f, "rejected: {reason}"),
            KillOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Pid(u32),
    Package(String),
    Uid(u32),
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Pid(pid) => write!(f, "pid {pid}"),
            ActionTarget::Package(id) => write!(f, "package {id}"),
            ActionTarget::Uid(uid) => write!(f, "uid {uid}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub target: ActionTarget,
    pub outcome: KillOutcome,
}

/// Result of [`ProcessController::kill_all_denied`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeniedSweep {
    /// Processes seen by the scan.
    pub scanned: usize,
    /// One entry per distinct eligible package.
    pub reports: Vec<ActionReport>,
}

impl DeniedSweep {
    pub fn issued(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_issued()).count()
    }
}

pub struct ProcessController {
    shell: Arc<dyn CommandRunner>,
    policy: Arc<PolicyStore>,
    catalog: Arc<ProcessCatalog>,
    templates: CommandTemplates,
}

impl ProcessController {
    pub fn new(
        shell: Arc<dyn CommandRunner>,
        policy: Arc<PolicyStore>,
        catalog: Arc<ProcessCatalog>,
        templates: CommandTemplates,
    ) -> Self {
        Self {
            shell,
            policy,
            catalog,
            templates,
        }
    }

    pub fn templates(&self) -> &CommandTemplates {
        &self.templates
    }

    /// Sends the kill signal to `pid` without consulting the policy.
    pub fn kill_by_pid(&self, pid: u32) -> KillOutcome {
        if pid == 0 {
            return KillOutcome::Rejected("pid 0 addresses the caller's process group".to_string());
        }
        let target = ActionTarget::Pid(pid);
        self.issue(&self.templates.kill_pid_command(pid), &target)
    }

    /// Kills a scanned process unless its package is allowed.
    pub fn kill_record(&self, record: &ProcessRecord) -> KillOutcome {
        if self.policy.is_allowed(record.package_id.as_deref()) {
            info!(
                pid = record.pid,
                package = record.package_id.as_deref().unwrap_or_default(),
                "refusing to kill protected process"
            );
            return KillOutcome::Protected;
        }
        self.kill_by_pid(record.pid)
    }

    /// Force-stops a package; allowed packages are never touched.
    pub fn force_stop_package(&self, id: &str) -> KillOutcome {
        let id = match validate_identifier(id) {
            Ok(id) => id,
            Err(e) => return KillOutcome::Rejected(e.to_string()),
        };

        if self.policy.is_allowed(Some(&id)) {
            info!(package = %id, "refusing to force-stop protected package");
            return KillOutcome::Protected;
        }

        let command = self.templates.force_stop_command(&id);
        self.issue(&command, &ActionTarget::Package(id))
    }

    /// Kills each pid in ascending order; one failure does not stop the rest.
    pub fn kill_batch(&self, pids: &BTreeSet<u32>) -> Vec<ActionReport> {
        pids.iter()
            .map(|&pid| ActionReport {
                target: ActionTarget::Pid(pid),
                outcome: self.kill_by_pid(pid),
            })
            .collect()
    }

    /// Force-stops every running package that is denied and not allowed.
    pub fn kill_all_denied(&self) -> DeniedSweep {
        let records = self.catalog.scan();

        let targets: BTreeSet<&str> = records
            .iter()
            .filter_map(|r| r.package_id.as_deref())
            .filter(|id| self.policy.is_kill_eligible(Some(*id)))
            .collect();

        debug!(scanned = records.len(), targets = targets.len(), "denied sweep planned");

        let reports = targets
            .into_iter()
            .map(|id| ActionReport {
                target: ActionTarget::Package(id.to_string()),
                outcome: self.force_stop_package(id),
            })
            .collect();

        let sweep = DeniedSweep {
            scanned: records.len(),
            reports,
        };
        info!(scanned = sweep.scanned, stopped = sweep.issued(), "denied sweep finished");
        sweep
    }

    /// Kills every process of an application uid.
    ///
    /// Refused for uids below the application range and for uids that
    /// currently run an allowed package (shared-uid apps).
    pub fn kill_uid(&self, uid: u32) -> KillOutcome {
        if !is_user_app(uid) {
            return KillOutcome::Rejected(format!("uid {uid} is not an application uid"));
        }

        let records = self.catalog.scan();
        if let Some(protected) = records
            .iter()
            .filter(|r| r.uid == uid)
            .find(|r| self.policy.is_allowed(r.package_id.as_deref()))
        {
            info!(
                uid,
                package = protected.package_id.as_deref().unwrap_or_default(),
                "refusing to kill uid running a protected package"
            );
            return KillOutcome::Protected;
        }

        self.issue(&self.templates.kill_uid_command(uid), &ActionTarget::Uid(uid))
    }

    fn issue(&self, command: &str, target: &ActionTarget) -> KillOutcome {
        let result = self.shell.run(command);
        if result.success() {
            info!(%target, "termination issued");
            KillOutcome::Issued
        } else {
            let reason = result.summary();
            warn!(%target, error = %reason, "termination failed");
            KillOutcome::Failed(reason)
        }
    }
}
