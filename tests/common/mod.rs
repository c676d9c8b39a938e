//! Shared fixtures for integration tests: a scripted device behind the
//! `CommandRunner` seam and helpers to build an engine around it.

#![allow(dead_code)]

use proc_sentinel::process::catalog::{DEFAULT_LIST_COMMAND, DEFAULT_PID_LIST_COMMAND};
use proc_sentinel::process::parser::{CMDLINE_MARKER, PID_MARKER};
use proc_sentinel::{
    CommandResult, CommandRunner, EngineSettings, ExecStatus, MemoryStore, SentinelContext,
};
use std::sync::{Arc, Mutex};

pub const STORE: &str = "test_prefs";

pub fn ok(stdout: &str) -> CommandResult {
    CommandResult::new(stdout, "", ExecStatus::Exited(0))
}

pub fn exit(code: i32, stderr: &str) -> CommandResult {
    CommandResult::new("", stderr, ExecStatus::Exited(code))
}

/// How the fake answers the primary listing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Works,
    Fails,
    HeaderOnly,
}

/// A process table answered through shell commands.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    /// (pid, uid, space-separated command line)
    pub processes: Vec<(u32, u32, String)>,
    pub listing: Listing,
    /// Pids that show up in the pid list but have exited by the time they are read.
    pub vanished: Vec<u32>,
    /// Commands starting with any of these prefixes exit with status 1.
    pub failing: Vec<String>,
    /// Every command fails to start, as when `su` is missing.
    pub no_shell: bool,
}

impl FakeDevice {
    pub fn new(processes: &[(u32, u32, &str)]) -> Self {
        Self {
            processes: processes
                .iter()
                .map(|(pid, uid, cmd)| (*pid, *uid, cmd.to_string()))
                .collect(),
            listing: Listing::Works,
            vanished: Vec::new(),
            failing: Vec::new(),
            no_shell: false,
        }
    }

    pub fn listing(mut self, listing: Listing) -> Self {
        self.listing = listing;
        self
    }

    pub fn vanished(mut self, pids: &[u32]) -> Self {
        self.vanished = pids.to_vec();
        self
    }

    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    pub fn no_shell(mut self) -> Self {
        self.no_shell = true;
        self
    }

    fn listing_text(&self) -> String {
        let mut out = String::from("  PID   UID CMDLINE\n");
        for (pid, uid, cmd) in &self.processes {
            out.push_str(&format!("{pid:>5} {uid:>5} {cmd}\n"));
        }
        out
    }

    fn pid_list_text(&self) -> String {
        let mut pids: Vec<u32> = self.processes.iter().map(|p| p.0).collect();
        pids.extend(&self.vanished);
        pids.iter().map(|p| format!("{p}\n")).collect()
    }

    fn status_text(&self, pids: &[u32]) -> String {
        let mut out = String::new();
        for pid in pids {
            out.push_str(&format!("{PID_MARKER}{pid}\n"));
            if let Some((_, uid, cmd)) = self.processes.iter().find(|p| p.0 == *pid) {
                out.push_str(&format!(
                    "Name:\tproc{pid}\nPid:\t{pid}\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n"
                ));
                out.push_str(&format!("{CMDLINE_MARKER}\n"));
                out.push_str(&cmd.replace(' ', "\0"));
                out.push_str("\0\n");
            } else {
                out.push_str(&format!("{CMDLINE_MARKER}\n\n"));
            }
        }
        out
    }

    pub fn respond(&self, command: &str) -> CommandResult {
        if self.no_shell {
            return CommandResult::spawn_failed("su: No such file or directory");
        }
        if self.failing.iter().any(|p| command.starts_with(p.as_str())) {
            return exit(1, "Operation not permitted");
        }
        if command == DEFAULT_LIST_COMMAND {
            return match self.listing {
                Listing::Works => ok(&self.listing_text()),
                Listing::Fails => exit(1, "bad -o"),
                Listing::HeaderOnly => ok("  PID   UID CMDLINE\n"),
            };
        }
        if command == DEFAULT_PID_LIST_COMMAND {
            return ok(&self.pid_list_text());
        }
        if let Some(pids) = script_pids(command) {
            return ok(&self.status_text(&pids));
        }
        ok("")
    }
}

/// Pids named by a status-query loop (`for p in 1 2 3; do ...`).
pub fn script_pids(command: &str) -> Option<Vec<u32>> {
    let rest = command.strip_prefix("for p in ")?;
    let list = rest.split(';').next()?;
    Some(list.split_whitespace().filter_map(|p| p.parse().ok()).collect())
}

/// `CommandRunner` that answers from a [`FakeDevice`] and records every call.
pub struct ScriptedShell {
    device: FakeDevice,
    root: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedShell {
    pub fn new(device: FakeDevice) -> Arc<Self> {
        Arc::new(Self {
            device,
            root: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn without_root(device: FakeDevice) -> Arc<Self> {
        Arc::new(Self {
            device,
            root: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl CommandRunner for ScriptedShell {
    fn check_access(&self) -> bool {
        self.root
    }

    fn run(&self, command: &str) -> CommandResult {
        self.calls.lock().unwrap().push(command.to_string());
        self.device.respond(command)
    }
}

/// Builds an engine over `shell` with an in-memory policy store.
pub fn engine(shell: &Arc<ScriptedShell>, settings: EngineSettings) -> (SentinelContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = engine_with_store(shell, Arc::clone(&store), settings);
    (ctx, store)
}

pub fn engine_with_store(
    shell: &Arc<ScriptedShell>,
    store: Arc<MemoryStore>,
    mut settings: EngineSettings,
) -> SentinelContext {
    settings.store_name = STORE.to_string();
    let runner: Arc<dyn CommandRunner> = shell.clone();
    SentinelContext::new(runner, Box::new(store), settings)
}

pub fn default_engine(device: FakeDevice) -> (Arc<ScriptedShell>, SentinelContext, Arc<MemoryStore>) {
    let shell = ScriptedShell::new(device);
    let (ctx, store) = engine(&shell, EngineSettings::default());
    (shell, ctx, store)
}

/// A small but representative process table.
pub fn typical_device() -> FakeDevice {
    FakeDevice::new(&[
        (1, 0, "/init second_stage"),
        (612, 1000, "system_server"),
        (700, 10021, "com.android.systemui"),
        (801, 10055, "com.example.app --flag"),
        (802, 10055, "com.example.app:remote"),
        (900, 10077, "com.social.feed"),
        (950, 10080, "com.game.shooter"),
    ])
}
