//! Integration tests for process scanning and its fallback strategies.

mod common;

use common::*;
use proc_sentinel::process::catalog::DEFAULT_LIST_COMMAND;
use proc_sentinel::process::catalog::DEFAULT_PID_LIST_COMMAND;
use proc_sentinel::{EngineSettings, PolicyKey, PrivilegeTier, ScanSettings, ScanStrategy};
use std::sync::Arc;

fn pids(records: &[proc_sentinel::ProcessRecord]) -> Vec<u32> {
    let mut pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
    pids.sort_unstable();
    pids
}

#[test]
fn test_primary_listing_single_call() {
    let (shell, ctx, _) = default_engine(typical_device());

    let report = ctx.catalog.scan_report();

    assert_eq!(report.strategy, ScanStrategy::Listing);
    assert_eq!(report.records.len(), 7);
    assert_eq!(report.skipped, 0);
    assert_eq!(shell.calls(), vec![DEFAULT_LIST_COMMAND.to_string()]);

    let app = report.records.iter().find(|r| r.pid == 801).unwrap();
    assert_eq!(app.uid, 10055);
    assert_eq!(app.package_id.as_deref(), Some("com.example.app"));
    assert_eq!(app.command_line, "com.example.app --flag");
    assert_eq!(app.tier(), PrivilegeTier::UserApp);

    let init = report.records.iter().find(|r| r.pid == 1).unwrap();
    assert_eq!(init.package_id, None);
    assert_eq!(init.tier(), PrivilegeTier::CoreSystem);
}

#[test]
fn test_failed_listing_falls_back_per_process() {
    let (shell, ctx, _) = default_engine(typical_device().listing(Listing::Fails));

    let report = ctx.catalog.scan_report();

    assert_eq!(report.strategy, ScanStrategy::PerProcess);
    assert_eq!(pids(&report.records), vec![1, 612, 700, 801, 802, 900, 950]);
    assert_eq!(shell.count(DEFAULT_PID_LIST_COMMAND), 1);
    // One status session per pid.
    assert_eq!(shell.count("for p in "), 7);

    let app = report.records.iter().find(|r| r.pid == 802).unwrap();
    assert_eq!(app.uid, 10055);
    assert_eq!(app.command_line, "com.example.app:remote");
    assert_eq!(app.package_id.as_deref(), Some("com.example.app:remote"));
}

#[test]
fn test_header_only_listing_falls_back() {
    let (_, ctx, _) = default_engine(typical_device().listing(Listing::HeaderOnly));
    let report = ctx.catalog.scan_report();
    assert_ne!(report.strategy, ScanStrategy::Listing);
    assert_eq!(report.records.len(), 7);
}

#[test]
fn test_large_table_uses_batched_read() {
    let shell = ScriptedShell::new(typical_device().listing(Listing::Fails));
    let settings = EngineSettings {
        scan: ScanSettings {
            batch_threshold: 3,
            ..ScanSettings::default()
        },
        ..EngineSettings::default()
    };
    let (ctx, _) = engine(&shell, settings);

    let report = ctx.catalog.scan_report();

    assert_eq!(report.strategy, ScanStrategy::Batched);
    assert_eq!(report.records.len(), 7);
    assert_eq!(shell.count("for p in "), 1);
}

#[test]
fn test_vanished_process_is_skipped() {
    let device = typical_device().listing(Listing::Fails).vanished(&[4242]);
    let (_, ctx, _) = default_engine(device);

    let report = ctx.catalog.scan_report();

    assert_eq!(report.records.len(), 7);
    assert_eq!(report.skipped, 1);
    assert!(report.records.iter().all(|r| r.pid != 4242));
}

#[test]
fn test_failed_status_read_keeps_other_records() {
    let device = typical_device().listing(Listing::Fails).failing("for p in 612;");
    let (shell, ctx, _) = default_engine(device);

    let report = ctx.catalog.scan_report();

    assert_eq!(report.strategy, ScanStrategy::PerProcess);
    assert_eq!(pids(&report.records), vec![1, 700, 801, 802, 900, 950]);
    assert_eq!(report.skipped, 1);
    assert_eq!(shell.count("for p in 612;"), 1);
}

#[test]
fn test_listing_and_fallback_agree_on_native_paths() {
    let table = [
        (1, 0, "/init second_stage"),
        (612, 1041, "/vendor/bin/hw/android.hardware.audio.service"),
        (801, 10055, "com.example.app --flag"),
    ];
    let (_, listed, _) = default_engine(FakeDevice::new(&table));
    let (_, read, _) = default_engine(FakeDevice::new(&table).listing(Listing::Fails));

    let mut primary = listed.catalog.scan();
    let mut fallback = read.catalog.scan();
    primary.sort_by_key(|r| r.pid);
    fallback.sort_by_key(|r| r.pid);

    assert_eq!(primary, fallback);
    let daemon = primary.iter().find(|r| r.pid == 612).unwrap();
    assert_eq!(daemon.package_id, None);
    assert_eq!(daemon.command_line, "/vendor/bin/hw/android.hardware.audio.service");
}

#[test]
fn test_single_session_pool() {
    let shell = ScriptedShell::new(typical_device().listing(Listing::Fails));
    let settings = EngineSettings {
        scan: ScanSettings {
            max_parallel_sessions: 1,
            ..ScanSettings::default()
        },
        ..EngineSettings::default()
    };
    let (ctx, _) = engine(&shell, settings);

    assert_eq!(ctx.catalog.scan().len(), 7);
}

#[test]
fn test_no_shell_yields_empty_scan() {
    let (_, ctx, _) = default_engine(typical_device().no_shell());

    let report = ctx.catalog.scan_report();

    assert!(report.records.is_empty());
    assert_eq!(report.strategy, ScanStrategy::Unavailable);
}

#[test]
fn test_aggressive_scenario_hides_allowed() {
    let store = Arc::new(proc_sentinel::MemoryStore::new());
    store.seed(STORE, PolicyKey::UserAllow, &["com.social.feed"]);
    let shell = ScriptedShell::new(typical_device());
    let ctx = engine_with_store(&shell, store, EngineSettings::default());

    let filtered = ctx.catalog.scan_by_scenario("screen_off");

    // systemui is a built-in allow, com.social.feed a user allow.
    assert_eq!(pids(&filtered), vec![1, 612, 801, 802, 950]);
}

#[test]
fn test_other_scenarios_are_unfiltered() {
    let (_, ctx, _) = default_engine(typical_device());

    assert_eq!(ctx.catalog.scan_by_scenario("normal").len(), 7);
    assert_eq!(ctx.catalog.scan_by_scenario("").len(), 7);
    assert!(ctx.catalog.is_aggressive_scenario("game_mode"));
    assert!(!ctx.catalog.is_aggressive_scenario("GAME_MODE"));
}

#[test]
fn test_malformed_listing_lines_skipped() {
    let mut device = typical_device();
    device.processes.push((0, 0, "junk".to_string()));
    let (_, ctx, _) = default_engine(device);

    let report = ctx.catalog.scan_report();

    assert_eq!(report.strategy, ScanStrategy::Listing);
    assert_eq!(report.records.len(), 7);
    assert_eq!(report.skipped, 1);
}
