//! proc-sentinel
//!
//! Command-line front end for the process governance engine. Parses
//! arguments, resolves configuration, sets up logging and runs the chosen
//! subcommand on a blocking worker.

mod cli;
mod commands;
mod config;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use proc_sentinel::{JsonFileStore, PrivilegedShell, SentinelContext, SharedContext};
use std::sync::Arc;
use tracing::{debug, info, level_filters::LevelFilter};

use cli::{Args, Commands, LogLevel};
use commands::{
    command_check, command_config, command_force_stop, command_kill, command_kill_denied,
    command_kill_uid, command_policy, command_scan, CmdResult, PolicyList,
};
use config::{
    parse_log_level, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_LOG_LEVEL,
};

/// Initializes tracing with CLI level > config level > default; output goes to stderr.
fn setup_logging(config: &Config, args: &Args) {
    let level = args
        .log_level
        .or_else(|| config.log_level.as_deref().and_then(parse_log_level))
        .or_else(|| parse_log_level(DEFAULT_LOG_LEVEL))
        .unwrap_or(LogLevel::Warn);

    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("⚠️  Failed to set tracing subscriber: {e}");
        return;
    }

    debug!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

fn build_context(config: &Config) -> anyhow::Result<SharedContext> {
    let policy_dir = config.policy_dir();
    if policy_dir.exists() && !policy_dir.is_dir() {
        bail!("policy_dir {} exists but is not a directory", policy_dir.display());
    }

    let shell = Arc::new(PrivilegedShell::new(config.shell_settings()));
    let store = JsonFileStore::new(policy_dir);
    Ok(SentinelContext::new(shell, Box::new(store), config.engine_settings()).shared())
}

fn requires_root(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Scan { .. }
            | Commands::Kill { .. }
            | Commands::ForceStop { .. }
            | Commands::KillDenied { .. }
            | Commands::KillUid { .. }
    )
}

fn dispatch(ctx: &SentinelContext, command: Commands, config: &Config) -> CmdResult {
    match command {
        Commands::Check => command_check(ctx, config),
        Commands::Scan {
            tier,
            scenario,
            format,
        } => command_scan(ctx, tier, scenario, format),
        Commands::Kill { pids, force } => command_kill(ctx, pids, force),
        Commands::ForceStop { package } => command_force_stop(ctx, &package),
        Commands::KillDenied { format } => command_kill_denied(ctx, format),
        Commands::KillUid { uid } => command_kill_uid(ctx, uid),
        Commands::Allow { action } => command_policy(ctx, PolicyList::Allow, action),
        Commands::Deny { action } => command_policy(ctx, PolicyList::Deny, action),
        Commands::Config { .. } => unreachable!("Config handled before context setup"),
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    let command = match args.command.take() {
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => {
            return command_config(output, format, commented)
                .map_err(|e| e as Box<dyn std::error::Error>);
        }
        Some(command) => command,
        None => {
            Args::command().print_help()?;
            return Ok(());
        }
    };

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    let ctx = build_context(&config).context("Failed to initialize engine")?;
    info!("Starting proc-sentinel {}", env!("CARGO_PKG_VERSION"));

    let needs_root = requires_root(&command);
    let result = tokio::task::spawn_blocking(move || -> CmdResult {
        if needs_root {
            let status = ctx.root_status();
            if !status.is_granted() {
                eprintln!("❌ {status}: this command needs a working su binary");
                std::process::exit(1);
            }
            info!("{status}");
        }
        dispatch(&ctx, command, &config)
    })
    .await
    .context("Command worker panicked")?;

    result.map_err(|e| e as Box<dyn std::error::Error>)
}
