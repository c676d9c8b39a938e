//! CLI arguments and subcommands for proc-sentinel.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for scan and listing results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Tier filter for `scan`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    CoreSystem,
    SystemService,
    UserApp,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "proc-sentinel",
    about = "Process governance for rooted Android devices",
    long_about = "Process governance for rooted Android devices.\n\n\
                  Lists running processes through a privileged shell, classifies them by uid, \
                  and terminates denied applications while never touching protected packages.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (defaults to the config file value, then warn)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Privileged shell binary
    #[arg(long = "su", global = true)]
    pub su_binary: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// Allow/deny list management
#[derive(Subcommand, Debug)]
pub enum ListAction {
    /// Add a package identifier
    Add { package: String },

    /// Remove a package identifier
    Remove { package: String },

    /// Show the list
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check root access, configuration and policy storage
    Check,

    /// List running processes
    Scan {
        /// Only show processes in this tier
        #[arg(long, value_enum)]
        tier: Option<TierArg>,

        /// Apply a scenario filter (aggressive scenarios hide allowed packages)
        #[arg(long)]
        scenario: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Kill processes by pid
    Kill {
        /// Target pids
        #[arg(required = true)]
        pids: Vec<u32>,

        /// Skip the policy check against a fresh scan
        #[arg(long)]
        force: bool,
    },

    /// Force-stop an application package
    ForceStop { package: String },

    /// Force-stop every running package on the deny list
    KillDenied {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Kill every process owned by an application uid
    KillUid { uid: u32 },

    /// Manage the user allow list
    Allow {
        #[command(subcommand)]
        action: ListAction,
    },

    /// Manage the user deny list
    Deny {
        #[command(subcommand)]
        action: ListAction,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
