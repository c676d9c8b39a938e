//! Process discovery through the privileged shell.
//!
//! A scan first asks for a single `pid uid args` listing. When that command
//! fails or yields nothing usable, the catalog enumerates pids and reads each
//! process's `status` and `cmdline`: one shell session per pid on a bounded
//! pool for small process counts, one batched session otherwise.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::policy::PolicyStore;
use crate::process::classifier::PrivilegeTier;
use crate::process::parser::{
    parse_listing, parse_pid_list, parse_status_blocks, status_query_script, ParsedBatch,
};
use crate::process::record::ProcessRecord;
use crate::shell::CommandRunner;

pub const DEFAULT_LIST_COMMAND: &str = "ps -A -o PID,UID,CMDLINE";
pub const DEFAULT_LIST_HEADER_LINES: usize = 1;
pub const DEFAULT_PID_LIST_COMMAND: &str = "ls /proc | grep '^[0-9]'";

/// Largest pid count still read with one session per process.
pub const DEFAULT_BATCH_THRESHOLD: usize = 48;
pub const DEFAULT_MAX_PARALLEL_SESSIONS: usize = 4;

/// Scenarios in which allowed processes are hidden from the result.
pub const DEFAULT_AGGRESSIVE_SCENARIOS: &[&str] = &["screen_off", "game_mode", "performance_mode"];

/// Tunables for [`ProcessCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub list_command: String,
    pub list_header_lines: usize,
    pub pid_list_command: String,
    pub batch_threshold: usize,
    pub max_parallel_sessions: usize,
    pub aggressive_scenarios: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            list_command: DEFAULT_LIST_COMMAND.to_string(),
            list_header_lines: DEFAULT_LIST_HEADER_LINES,
            pid_list_command: DEFAULT_PID_LIST_COMMAND.to_string(),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            max_parallel_sessions: DEFAULT_MAX_PARALLEL_SESSIONS,
            aggressive_scenarios: DEFAULT_AGGRESSIVE_SCENARIOS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Which path produced a scan's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    Listing,
    PerProcess,
    Batched,
    /// Neither the listing nor the pid enumeration produced anything.
    Unavailable,
}

impl std::fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanStrategy::Listing => "listing",
            ScanStrategy::PerProcess => "per-process",
            ScanStrategy::Batched => "batched",
            ScanStrategy::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Records from one scan plus how they were obtained.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub records: Vec<ProcessRecord>,
    pub strategy: ScanStrategy,
    /// Lines or blocks that could not be parsed.
    pub skipped: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Keeps only records in `tier`.
pub fn retain_tier(records: Vec<ProcessRecord>, tier: PrivilegeTier) -> Vec<ProcessRecord> {
    records.into_iter().filter(|r| r.tier() == tier).collect()
}

/// Enumerates running processes. Safe to share between threads.
pub struct ProcessCatalog {
    shell: Arc<dyn CommandRunner>,
    policy: Arc<PolicyStore>,
    settings: ScanSettings,
    pool: Option<rayon::ThreadPool>,
}

impl ProcessCatalog {
    pub fn new(shell: Arc<dyn CommandRunner>, policy: Arc<PolicyStore>, settings: ScanSettings) -> Self {
        let threads = settings.max_parallel_sessions.max(1);
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("scan-session-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "could not build scan pool, per-process reads will run sequentially");
                None
            }
        };

        Self {
            shell,
            policy,
            settings,
            pool,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Current process table. Never fails; an unreachable shell yields an empty list.
    pub fn scan(&self) -> Vec<ProcessRecord> {
        self.scan_report().records
    }

    /// Like [`ProcessCatalog::scan`], keeping strategy and skip counts.
    pub fn scan_report(&self) -> ScanReport {
        let start = Instant::now();

        let (batch, strategy) = match self.scan_primary() {
            Ok(batch) => (batch, ScanStrategy::Listing),
            Err(e) => {
                info!(error = %e, "process listing unusable, reading /proc per pid");
                self.scan_fallback()
            }
        };

        let report = ScanReport {
            records: batch.records,
            strategy,
            skipped: batch.skipped,
            duration: start.elapsed(),
        };

        debug!(
            processes = report.records.len(),
            skipped = report.skipped,
            strategy = %report.strategy,
            duration_ms = report.duration.as_millis() as u64,
            "scan complete"
        );
        report
    }

    /// Single-command listing. Errors when the command fails or nothing parses.
    pub fn scan_primary(&self) -> Result<ParsedBatch, ScanError> {
        let result = self.shell.run(&self.settings.list_command);
        if !result.success() {
            return Err(ScanError::ShellFailed(result.summary()));
        }

        let batch = parse_listing(&result.stdout, self.settings.list_header_lines);
        if batch.records.is_empty() {
            return Err(ScanError::EmptyListing);
        }
        Ok(batch)
    }

    /// Structured per-pid reads; picks per-process or batched by pid count.
    pub fn scan_fallback(&self) -> (ParsedBatch, ScanStrategy) {
        let listing = self.shell.run(&self.settings.pid_list_command);
        let pids = parse_pid_list(&listing.stdout);

        if pids.is_empty() {
            warn!(status = %listing.status, "pid enumeration returned nothing");
            return (ParsedBatch::default(), ScanStrategy::Unavailable);
        }

        if pids.len() <= self.settings.batch_threshold {
            (self.scan_per_process(&pids), ScanStrategy::PerProcess)
        } else {
            (self.scan_batched(&pids), ScanStrategy::Batched)
        }
    }

    fn read_one(&self, pid: u32) -> ParsedBatch {
        let result = self.shell.run(&status_query_script(&[pid]));
        let mut batch = parse_status_blocks(&result.stdout);
        if batch.records.is_empty() && batch.skipped == 0 {
            debug!(pid, status = %result.status, "no status block returned");
            batch.skipped = 1;
        }
        batch
    }

    fn scan_per_process(&self, pids: &[u32]) -> ParsedBatch {
        let batches: Vec<ParsedBatch> = match &self.pool {
            Some(pool) => pool.install(|| pids.par_iter().map(|&pid| self.read_one(pid)).collect()),
            None => pids.iter().map(|&pid| self.read_one(pid)).collect(),
        };

        let mut merged = ParsedBatch::default();
        for batch in batches {
            merged.extend(batch);
        }
        merged
    }

    fn scan_batched(&self, pids: &[u32]) -> ParsedBatch {
        let result = self.shell.run(&status_query_script(pids));
        if !result.success() {
            warn!(error = %result.summary(), "batched status read reported failure, keeping partial output");
        }
        parse_status_blocks(&result.stdout)
    }

    pub fn is_aggressive_scenario(&self, scenario: &str) -> bool {
        self.settings.aggressive_scenarios.iter().any(|s| s == scenario)
    }

    /// Scan filtered for `scenario`: aggressive scenarios drop allowed packages.
    pub fn scan_by_scenario(&self, scenario: &str) -> Vec<ProcessRecord> {
        self.filter_for_scenario(scenario, self.scan())
    }

    /// Applies the scenario filter to records from an earlier scan.
    pub fn filter_for_scenario(&self, scenario: &str, records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        if !self.is_aggressive_scenario(scenario) {
            return records;
        }

        let before = records.len();
        let filtered: Vec<ProcessRecord> = records
            .into_iter()
            .filter(|r| !self.policy.is_allowed(r.package_id.as_deref()))
            .collect();
        debug!(scenario, hidden = before - filtered.len(), "scenario filter applied");
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.list_command, "ps -A -o PID,UID,CMDLINE");
        assert_eq!(settings.list_header_lines, 1);
        assert_eq!(settings.aggressive_scenarios.len(), 3);
        assert!(settings.max_parallel_sessions >= 1);
    }

    #[test]
    fn test_retain_tier() {
        let records = vec![
            ProcessRecord::new(1, 0, "init"),
            ProcessRecord::new(500, 1000, "system_server"),
            ProcessRecord::new(1234, 10055, "com.example.app"),
        ];
        let apps = retain_tier(records, PrivilegeTier::UserApp);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].pid, 1234);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(ScanStrategy::PerProcess.to_string(), "per-process");
        assert_eq!(
            serde_json::to_string(&ScanStrategy::PerProcess).unwrap(),
            "\"per_process\""
        );
    }
}
