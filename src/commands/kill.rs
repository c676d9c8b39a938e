//! Kill command implementations.
//!
//! Every path goes through the controller; this layer only resolves pids
//! against a fresh scan and renders outcomes.

use ahash::AHashMap as HashMap;
use proc_sentinel::{ActionReport, ActionTarget, KillOutcome, ProcessRecord, SentinelContext};
use std::collections::BTreeSet;
use tracing::debug;

use crate::cli::OutputFormat;
use crate::commands::{outcome_icon, print_reports, render_structured, CmdResult};

fn exit_unless(all_issued: bool) {
    if !all_issued {
        std::process::exit(1);
    }
}

/// Kills pids. Without `force`, each pid is matched against a fresh scan so
/// protected packages are refused; pids missing from the scan are rejected.
pub fn command_kill(ctx: &SentinelContext, pids: Vec<u32>, force: bool) -> CmdResult {
    let targets: BTreeSet<u32> = pids.into_iter().collect();

    let reports = if force {
        println!("⚠️  --force: skipping policy checks for {} pid(s)", targets.len());
        ctx.controller.kill_batch(&targets)
    } else {
        let table: HashMap<u32, ProcessRecord> = ctx
            .catalog
            .scan()
            .into_iter()
            .map(|r| (r.pid, r))
            .collect();
        debug!(processes = table.len(), "resolved process table for kill");

        targets
            .iter()
            .map(|&pid| ActionReport {
                target: ActionTarget::Pid(pid),
                outcome: match table.get(&pid) {
                    Some(record) => ctx.controller.kill_record(record),
                    None => KillOutcome::Rejected(
                        "not in the current process table (use --force to kill anyway)".into(),
                    ),
                },
            })
            .collect()
    };

    println!("🔪 Kill results:");
    exit_unless(print_reports(&reports));
    Ok(())
}

pub fn command_force_stop(ctx: &SentinelContext, package: &str) -> CmdResult {
    let outcome = ctx.controller.force_stop_package(package);
    println!("{} package {}: {}", outcome_icon(&outcome), package.trim(), outcome);
    exit_unless(outcome.is_issued());
    Ok(())
}

/// Force-stops every running denied package.
pub fn command_kill_denied(ctx: &SentinelContext, format: OutputFormat) -> CmdResult {
    let sweep = ctx.controller.kill_all_denied();

    if let Some(rendered) = render_structured(&sweep, format)? {
        println!("{rendered}");
    } else if sweep.reports.is_empty() {
        println!("✅ No denied packages running ({} processes scanned)", sweep.scanned);
    } else {
        println!(
            "🔪 Denied sweep: {} package(s) targeted, {} processes scanned",
            sweep.reports.len(),
            sweep.scanned
        );
        print_reports(&sweep.reports);
    }

    exit_unless(sweep.issued() == sweep.reports.len());
    Ok(())
}

pub fn command_kill_uid(ctx: &SentinelContext, uid: u32) -> CmdResult {
    let outcome = ctx.controller.kill_uid(uid);
    println!("{} uid {}: {}", outcome_icon(&outcome), uid, outcome);
    exit_unless(outcome.is_issued());
    Ok(())
}
