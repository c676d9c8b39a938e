//! Check command implementation.
//!
//! Validates root access, configuration and policy storage.

use nix::unistd::geteuid;
use std::path::Path;

use proc_sentinel::SentinelContext;

use crate::commands::CmdResult;
use crate::config::{validate_effective_config, Config};

// A missing directory is fine as long as its parent can take it.
fn dir_is_writable(dir: &Path) -> bool {
    let probe = if dir.exists() {
        dir
    } else {
        match dir.parent() {
            Some(parent) => parent,
            None => return false,
        }
    };
    probe
        .metadata()
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

/// Validates root access, configuration and policy storage.
pub fn command_check(ctx: &SentinelContext, config: &Config) -> CmdResult {
    println!("🔍 proc-sentinel - System Check");
    println!("===============================");
    println!(
        "   Version {} (built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    );

    let mut all_ok = true;

    // Root access
    println!("\n🔑 Checking root access...");
    println!("   Running as euid {}", geteuid());
    let status = ctx.root_status();
    if status.is_granted() {
        println!("   ✅ {status}");
    } else {
        println!("   ❌ {status}");
        all_ok = false;
    }

    // Process listing, only meaningful with root
    if status.is_granted() {
        println!("\n📁 Checking process listing...");
        let report = ctx.catalog.scan_report();
        if report.records.is_empty() {
            println!("   ❌ No processes could be listed");
            all_ok = false;
        } else {
            println!(
                "   ✅ {} processes listed via {} ({} skipped)",
                report.records.len(),
                report.strategy,
                report.skipped
            );
        }
    }

    // Configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Policy storage
    println!("\n🛡️  Checking policy storage...");
    let dir = config.policy_dir();
    if dir_is_writable(&dir) {
        println!("   ✅ Policy directory usable: {}", dir.display());
    } else {
        println!("   ⚠️  Policy directory not writable: {}", dir.display());
        println!("      List changes will only last for the current run");
    }
    println!(
        "   ✅ {} user-allowed, {} user-denied package(s)",
        ctx.policy.user_allow().len(),
        ctx.policy.user_deny().len()
    );

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
