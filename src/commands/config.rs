//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::commands::CmdResult;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> CmdResult {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("proc-sentinel.yaml"),
    };

    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(&config)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# proc-sentinel Configuration
# ===========================
#
# Privileged Shell
# ----------------
# su_binary: "su"                          # Binary that opens a root shell
# command_timeout_secs: 30                 # Deadline for every shell session
#
# Scanning
# --------
# list_command: "ps -A -o PID,UID,CMDLINE" # Primary listing: pid uid raw cmdline
# list_header_lines: 1                     # Leading lines dropped from the listing
# pid_list_command: "ls /proc | grep '^[0-9]'"  # Fallback pid enumeration
# batch_threshold: 48                      # Up to N pids: one session per pid
# max_parallel_sessions: 4                 # Concurrent sessions for per-pid reads
# aggressive_scenarios:                    # Scenarios that hide allowed packages
#   - screen_off
#   - game_mode
#   - performance_mode
#
# Policy Storage
# --------------
# policy_dir: "/data/local/tmp/proc-sentinel"  # Directory of <store>.json files
# policy_store_name: "whitelist_prefs"     # Store file name without extension
#
# Termination Commands
# --------------------
# kill_pid_command: "kill -9 {pid}"
# force_stop_command: "am force-stop {package}"
# kill_uid_command: "killall -u {uid}"
#
# Logging
# -------
# log_level: "warn"                        # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
