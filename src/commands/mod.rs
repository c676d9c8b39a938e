//! CLI command implementations for proc-sentinel.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Root, configuration and policy storage validation
//! - `config`: Configuration file generation
//! - `scan`: Process listing
//! - `kill`: Termination by pid, package, uid and the deny sweep
//! - `policy`: Allow/deny list management

pub mod check;
pub mod config;
pub mod kill;
pub mod policy;
pub mod scan;

use proc_sentinel::{ActionReport, KillOutcome};
use serde::Serialize;

use crate::cli::OutputFormat;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use kill::{command_force_stop, command_kill, command_kill_denied, command_kill_uid};
pub use policy::{command_policy, PolicyList};
pub use scan::command_scan;

/// Result type of commands that run on a blocking worker thread.
pub type CmdResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub(crate) fn outcome_icon(outcome: &KillOutcome) -> &'static str {
    match outcome {
        KillOutcome::Issued => "✅",
        KillOutcome::Protected => "🛡️ ",
        KillOutcome::Rejected(_) => "⛔",
        KillOutcome::Failed(_) => "❌",
    }
}

/// Serializes `value` for the machine-readable formats.
pub(crate) fn render_structured<T: Serialize>(
    value: &T,
    format: OutputFormat,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    Ok(match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
    })
}

/// Prints one line per report; returns true when every action was issued.
pub(crate) fn print_reports(reports: &[ActionReport]) -> bool {
    for report in reports {
        println!("   {} {}: {}", outcome_icon(&report.outcome), report.target, report.outcome);
    }
    reports.iter().all(|r| r.outcome.is_issued())
}
