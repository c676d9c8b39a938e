//! Scan command implementation.
//!
//! Lists running processes with their tier and package.

use proc_sentinel::process::retain_tier;
use proc_sentinel::{PrivilegeTier, ProcessRecord, SentinelContext};

use crate::cli::{OutputFormat, TierArg};
use crate::commands::{render_structured, CmdResult};

impl From<TierArg> for PrivilegeTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::CoreSystem => PrivilegeTier::CoreSystem,
            TierArg::SystemService => PrivilegeTier::SystemService,
            TierArg::UserApp => PrivilegeTier::UserApp,
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn print_table(records: &[ProcessRecord]) {
    println!(
        "{:>7} {:>6} {:<15} {:<40} COMMAND",
        "PID", "UID", "TIER", "PACKAGE"
    );
    for r in records {
        println!(
            "{:>7} {:>6} {:<15} {:<40} {}",
            r.pid,
            r.uid,
            r.tier(),
            truncate(r.package_id.as_deref().unwrap_or("-"), 40),
            truncate(&r.command_line, 80)
        );
    }
}

/// Lists processes, optionally filtered by tier and scenario.
pub fn command_scan(
    ctx: &SentinelContext,
    tier: Option<TierArg>,
    scenario: Option<String>,
    format: OutputFormat,
) -> CmdResult {
    let mut report = ctx.catalog.scan_report();

    if let Some(scenario) = scenario.as_deref() {
        report.records = ctx.catalog.filter_for_scenario(scenario, report.records);
    }
    if let Some(tier) = tier {
        report.records = retain_tier(report.records, tier.into());
    }
    report.records.sort_by_key(|r| r.pid);

    if let Some(rendered) = render_structured(&report, format)? {
        println!("{rendered}");
        return Ok(());
    }

    print_table(&report.records);
    println!(
        "\n📋 {} process(es) via {} ({} unparseable entr{} skipped, {} ms)",
        report.records.len(),
        report.strategy,
        report.skipped,
        if report.skipped == 1 { "y" } else { "ies" },
        report.duration.as_millis()
    );
    if let Some(scenario) = scenario {
        if ctx.catalog.is_aggressive_scenario(&scenario) {
            println!("   Scenario '{scenario}': allowed packages hidden");
        } else {
            println!("   Scenario '{scenario}' is not aggressive: no filter applied");
        }
    }
    Ok(())
}
