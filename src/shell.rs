//! Privileged command channel.
//!
//! Every call starts exactly one `su` session, pipes the command text into it
//! followed by an explicit `exit`, captures stdout and stderr and reaps the
//! session. Failures never surface as errors: a session that cannot be
//! spawned, exits non-zero or runs past its deadline is reported through
//! [`ExecStatus`] and the accompanying text, because callers treat the output
//! as authoritative even when it is partial.

use std::fmt;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default privileged interpreter.
pub const DEFAULT_SU_BINARY: &str = "su";

/// Default deadline for a single privileged session, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trivial identity command used to probe for root.
const ACCESS_PROBE_COMMAND: &str = "id";

/// Marker prefixed to every stderr line in the combined text.
pub const STDERR_PREFIX: &str = "ERROR: ";

/// How long to wait for the output readers once the session is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Poll interval while waiting for the session to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Terminal state of a privileged session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    /// Session exited with the given code.
    Exited(i32),
    /// Session was terminated by a signal.
    Signaled,
    /// Session ran past its deadline and was killed.
    TimedOut,
    /// The interpreter could not be started.
    SpawnFailed(String),
    /// The session started but its status could not be collected.
    WaitFailed(String),
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecStatus::Exited(code) => write!(f, "exit status {code}"),
            ExecStatus::Signaled => write!(f, "terminated by signal"),
            ExecStatus::TimedOut => write!(f, "timed out"),
            ExecStatus::SpawnFailed(msg) => write!(f, "failed to start: {msg}"),
            ExecStatus::WaitFailed(msg) => write!(f, "failed to wait: {msg}"),
        }
    }
}

/// Output of one privileged session.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecStatus,
    pub duration: Duration,
}

impl CommandResult {
    /// Builds a result from already captured output.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, status: ExecStatus) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status,
            duration: Duration::ZERO,
        }
    }

    /// Result describing an interpreter that never started.
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::new(String::new(), String::new(), ExecStatus::SpawnFailed(message.into()))
    }

    /// True only for a clean zero exit.
    pub fn success(&self) -> bool {
        self.status == ExecStatus::Exited(0)
    }

    /// Stdout lines verbatim followed by stderr lines marked with `ERROR: `.
    ///
    /// A session that never started yields a descriptive failure message
    /// instead, so this text is always meaningful to display.
    pub fn combined_text(&self) -> String {
        if let ExecStatus::SpawnFailed(msg) = &self.status {
            return format!("Failed to start privileged shell: {msg}\n");
        }

        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        for line in self.stdout.lines() {
            text.push_str(line);
            text.push('\n');
        }
        for line in self.stderr.lines() {
            text.push_str(STDERR_PREFIX);
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// One-line description used in logs and kill reports.
    pub fn summary(&self) -> String {
        let detail = self
            .stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|l| !l.is_empty());
        match detail {
            Some(line) => format!("{} ({})", self.status, line),
            None => self.status.to_string(),
        }
    }
}

/// Executes command text in a privileged context.
///
/// The seam between the process-governance core and the operating system.
pub trait CommandRunner: Send + Sync {
    /// True only if a privileged session starts and exits cleanly.
    fn check_access(&self) -> bool;

    /// Runs `command` in one fresh privileged session.
    fn run(&self, command: &str) -> CommandResult;
}

/// Settings for [`PrivilegedShell`].
#[derive(Debug, Clone)]
pub struct ShellSettings {
    /// Interpreter binary (normally `su`).
    pub su_binary: String,
    /// Deadline applied to every session.
    pub timeout: Duration,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            su_binary: DEFAULT_SU_BINARY.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// `su`-backed [`CommandRunner`], one OS process per call.
#[derive(Debug, Clone, Default)]
pub struct PrivilegedShell {
    settings: ShellSettings,
}

impl PrivilegedShell {
    pub fn new(settings: ShellSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }
}

impl CommandRunner for PrivilegedShell {
    fn check_access(&self) -> bool {
        let spawned = Command::new(&self.settings.su_binary)
            .arg("-c")
            .arg(ACCESS_PROBE_COMMAND)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let status = wait_with_deadline(&mut child, self.settings.timeout);
                debug!(su = %self.settings.su_binary, %status, "root access probe finished");
                status == ExecStatus::Exited(0)
            }
            Err(e) => {
                debug!(su = %self.settings.su_binary, error = %e, "root access probe could not start");
                false
            }
        }
    }

    fn run(&self, command: &str) -> CommandResult {
        let start = Instant::now();

        let mut child = match Command::new(&self.settings.su_binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(su = %self.settings.su_binary, error = %e, "failed to spawn privileged shell");
                return CommandResult::spawn_failed(format!("{}: {}", self.settings.su_binary, e));
            }
        };

        // Readers start before any input is written so neither pipe can fill up.
        let (tx, rx) = mpsc::channel();
        let stdout_buf = SharedBuf::default();
        let stderr_buf = SharedBuf::default();
        let mut readers = 0;
        if let Some(out) = child.stdout.take() {
            spawn_drain(out, Stream::Stdout, Arc::clone(&stdout_buf), tx.clone());
            readers += 1;
        }
        if let Some(err) = child.stderr.take() {
            spawn_drain(err, Stream::Stderr, Arc::clone(&stderr_buf), tx);
            readers += 1;
        }

        let mut input_error = None;
        if let Some(mut stdin) = child.stdin.take() {
            let script = format!("{command}\nexit\n");
            if let Err(e) = stdin.write_all(script.as_bytes()).and_then(|_| stdin.flush()) {
                warn!(error = %e, "failed to write command to privileged shell");
                input_error = Some(e.to_string());
            }
            // stdin is dropped here, closing the session's input.
        }

        let status = wait_with_deadline(&mut child, self.settings.timeout);
        wait_for_readers(&rx, readers, DRAIN_GRACE);
        let stdout = snapshot(&stdout_buf);
        let mut stderr = snapshot(&stderr_buf);

        if let Some(e) = input_error {
            stderr.push_str(&format!("failed to write command: {e}\n"));
        }

        let duration = start.elapsed();
        debug!(
            %status,
            duration_ms = duration.as_millis() as u64,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "privileged command finished"
        );

        CommandResult {
            stdout,
            stderr,
            status,
            duration,
        }
    }
}

/// Root availability as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootStatus {
    Granted,
    Denied,
}

impl RootStatus {
    /// Probes the runner once; no retry.
    pub fn probe(runner: &dyn CommandRunner) -> Self {
        if runner.check_access() {
            RootStatus::Granted
        } else {
            RootStatus::Denied
        }
    }

    pub fn is_granted(self) -> bool {
        self == RootStatus::Granted
    }

    pub fn message(self) -> &'static str {
        match self {
            RootStatus::Granted => "Root access granted",
            RootStatus::Denied => "Root access denied",
        }
    }
}

impl fmt::Display for RootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Output appended by a reader thread as it arrives.
type SharedBuf = Arc<Mutex<Vec<u8>>>;

/// Copies each chunk into `buf` as soon as it is read, so a stream that is
/// never closed still yields everything produced so far.
fn spawn_drain<R: Read + Send + 'static>(mut reader: R, stream: Stream, buf: SharedBuf, done: Sender<Stream>) {
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(?stream, error = %e, "output stream closed with error");
                    break;
                }
            }
        }
        // Receiver may be gone if the caller stopped waiting.
        let _ = done.send(stream);
    });
}

/// Waits up to `grace` for `readers` streams to reach end of file.
fn wait_for_readers(rx: &Receiver<Stream>, readers: usize, grace: Duration) {
    let deadline = Instant::now() + grace;
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if rx.recv_timeout(remaining).is_err() {
            debug!("output stream still held open after session ended, keeping partial output");
            break;
        }
    }
}

fn snapshot(buf: &SharedBuf) -> String {
    let bytes = buf.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Waits for `child` to exit, killing and reaping it once `timeout` passes.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> ExecStatus {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return exit_status(status),
            Ok(None) if Instant::now() >= deadline => {
                warn!(pid = child.id(), timeout_ms = timeout.as_millis() as u64, "privileged session timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                return ExecStatus::TimedOut;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                error!(error = %e, "failed to wait for privileged session");
                let _ = child.kill();
                let _ = child.wait();
                return ExecStatus::WaitFailed(e.to_string());
            }
        }
    }
}

fn exit_status(status: ExitStatus) -> ExecStatus {
    match status.code() {
        Some(code) => ExecStatus::Exited(code),
        None => ExecStatus::Signaled,
    }
}
