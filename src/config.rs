//! Configuration management for proc-sentinel.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use proc_sentinel::controller::{
    CommandTemplates, DEFAULT_FORCE_STOP_COMMAND, DEFAULT_KILL_PID_COMMAND,
    DEFAULT_KILL_UID_COMMAND,
};
use proc_sentinel::policy::DEFAULT_STORE_NAME;
use proc_sentinel::process::catalog::{
    DEFAULT_AGGRESSIVE_SCENARIOS, DEFAULT_BATCH_THRESHOLD, DEFAULT_LIST_COMMAND,
    DEFAULT_LIST_HEADER_LINES, DEFAULT_MAX_PARALLEL_SESSIONS, DEFAULT_PID_LIST_COMMAND,
};
use proc_sentinel::shell::{DEFAULT_SU_BINARY, DEFAULT_TIMEOUT_SECS};
use proc_sentinel::{EngineSettings, ScanSettings, ShellSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_POLICY_DIR: &str = "/data/local/tmp/proc-sentinel";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &[
    "/data/local/tmp/proc-sentinel.yaml",
    "/etc/proc-sentinel/config.yaml",
    "./proc-sentinel.yaml",
    "./proc-sentinel.json",
];

/// Effective configuration; every field falls back to its default when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Privileged shell
    #[serde(alias = "su-binary")]
    pub su_binary: Option<String>,
    #[serde(alias = "command-timeout-secs")]
    pub command_timeout_secs: Option<u64>,

    // Scanning
    #[serde(alias = "list-command")]
    pub list_command: Option<String>,
    #[serde(alias = "list-header-lines")]
    pub list_header_lines: Option<usize>,
    #[serde(alias = "pid-list-command")]
    pub pid_list_command: Option<String>,
    #[serde(alias = "batch-threshold")]
    pub batch_threshold: Option<usize>,
    #[serde(alias = "max-parallel-sessions")]
    pub max_parallel_sessions: Option<usize>,
    #[serde(alias = "aggressive-scenarios")]
    pub aggressive_scenarios: Option<Vec<String>>,

    // Policy persistence
    #[serde(alias = "policy-dir")]
    pub policy_dir: Option<PathBuf>,
    #[serde(alias = "policy-store-name")]
    pub policy_store_name: Option<String>,

    // Termination commands
    #[serde(alias = "kill-pid-command")]
    pub kill_pid_command: Option<String>,
    #[serde(alias = "force-stop-command")]
    pub force_stop_command: Option<String>,
    #[serde(alias = "kill-uid-command")]
    pub kill_uid_command: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            su_binary: Some(DEFAULT_SU_BINARY.into()),
            command_timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            list_command: Some(DEFAULT_LIST_COMMAND.into()),
            list_header_lines: Some(DEFAULT_LIST_HEADER_LINES),
            pid_list_command: Some(DEFAULT_PID_LIST_COMMAND.into()),
            batch_threshold: Some(DEFAULT_BATCH_THRESHOLD),
            max_parallel_sessions: Some(DEFAULT_MAX_PARALLEL_SESSIONS),
            aggressive_scenarios: Some(
                DEFAULT_AGGRESSIVE_SCENARIOS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            policy_dir: Some(PathBuf::from(DEFAULT_POLICY_DIR)),
            policy_store_name: Some(DEFAULT_STORE_NAME.into()),
            kill_pid_command: Some(DEFAULT_KILL_PID_COMMAND.into()),
            force_stop_command: Some(DEFAULT_FORCE_STOP_COMMAND.into()),
            kill_uid_command: Some(DEFAULT_KILL_UID_COMMAND.into()),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
        }
    }
}

impl Config {
    pub fn shell_settings(&self) -> ShellSettings {
        ShellSettings {
            su_binary: self
                .su_binary
                .clone()
                .unwrap_or_else(|| DEFAULT_SU_BINARY.into()),
            timeout: Duration::from_secs(self.command_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let defaults = ScanSettings::default();
        let scan = ScanSettings {
            list_command: self.list_command.clone().unwrap_or(defaults.list_command),
            list_header_lines: self.list_header_lines.unwrap_or(defaults.list_header_lines),
            pid_list_command: self
                .pid_list_command
                .clone()
                .unwrap_or(defaults.pid_list_command),
            batch_threshold: self.batch_threshold.unwrap_or(defaults.batch_threshold),
            max_parallel_sessions: self
                .max_parallel_sessions
                .unwrap_or(defaults.max_parallel_sessions),
            aggressive_scenarios: self
                .aggressive_scenarios
                .clone()
                .unwrap_or(defaults.aggressive_scenarios),
        };

        let template_defaults = CommandTemplates::default();
        let templates = CommandTemplates {
            kill_pid: self
                .kill_pid_command
                .clone()
                .unwrap_or(template_defaults.kill_pid),
            force_stop: self
                .force_stop_command
                .clone()
                .unwrap_or(template_defaults.force_stop),
            kill_uid: self
                .kill_uid_command
                .clone()
                .unwrap_or(template_defaults.kill_uid),
        };

        EngineSettings {
            store_name: self
                .policy_store_name
                .clone()
                .unwrap_or_else(|| DEFAULT_STORE_NAME.into()),
            scan,
            templates,
        }
    }

    pub fn policy_dir(&self) -> PathBuf {
        self.policy_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_POLICY_DIR))
    }
}

/// Maps a config `log_level` string to the CLI enum.
pub fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LogLevel::Off),
        "error" => Some(LogLevel::Error),
        "warn" | "warning" => Some(LogLevel::Warn),
        "info" => Some(LogLevel::Info),
        "debug" => Some(LogLevel::Debug),
        "trace" => Some(LogLevel::Trace),
        _ => None,
    }
}

fn require_placeholder(
    name: &str,
    value: &Option<String>,
    placeholder: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(template) = value {
        if !template.contains(placeholder) {
            return Err(format!("{name} must contain the {placeholder} placeholder").into());
        }
    }
    Ok(())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.su_binary.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err("su_binary must not be empty".into());
    }

    if cfg.command_timeout_secs == Some(0) {
        return Err("command_timeout_secs must be greater than 0".into());
    }

    if cfg.max_parallel_sessions == Some(0) {
        return Err("max_parallel_sessions must be at least 1".into());
    }

    for (name, value) in [
        ("list_command", &cfg.list_command),
        ("pid_list_command", &cfg.pid_list_command),
    ] {
        if value.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(format!("{name} must not be empty").into());
        }
    }

    require_placeholder("kill_pid_command", &cfg.kill_pid_command, "{pid}")?;
    require_placeholder("force_stop_command", &cfg.force_stop_command, "{package}")?;
    require_placeholder("kill_uid_command", &cfg.kill_uid_command, "{uid}")?;

    if let Some(name) = cfg.policy_store_name.as_deref() {
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Err(format!("Invalid policy_store_name '{}'", name).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if parse_log_level(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                level
            )
            .into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(su) = &args.su_binary {
        config.su_binary = Some(su.clone());
    }
    if let Some(timeout) = args.timeout {
        config.command_timeout_secs = Some(timeout);
    }

    Ok(config)
}

/// Loads a config file, trying the default locations when no path is given.
///
/// File values are layered over the defaults, so a partial file only
/// overrides the keys it sets.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;

    let file: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(merge_over_defaults(file))
}

fn merge_over_defaults(file: Config) -> Config {
    let d = Config::default();
    Config {
        su_binary: file.su_binary.or(d.su_binary),
        command_timeout_secs: file.command_timeout_secs.or(d.command_timeout_secs),
        list_command: file.list_command.or(d.list_command),
        list_header_lines: file.list_header_lines.or(d.list_header_lines),
        pid_list_command: file.pid_list_command.or(d.pid_list_command),
        batch_threshold: file.batch_threshold.or(d.batch_threshold),
        max_parallel_sessions: file.max_parallel_sessions.or(d.max_parallel_sessions),
        aggressive_scenarios: file.aggressive_scenarios.or(d.aggressive_scenarios),
        policy_dir: file.policy_dir.or(d.policy_dir),
        policy_store_name: file.policy_store_name.or(d.policy_store_name),
        kill_pid_command: file.kill_pid_command.or(d.kill_pid_command),
        force_stop_command: file.force_stop_command.or(d.force_stop_command),
        kill_uid_command: file.kill_uid_command.or(d.kill_uid_command),
        log_level: file.log_level.or(d.log_level),
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}
