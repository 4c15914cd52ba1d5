//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::alerts::ChannelId;
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Health-check scheduler with alert escalation
///
/// Samples probes on an interval, escalates sustained breaches and routes
/// alerts to chat, mail, webhook and console channels.
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler until Ctrl-C
    Run(RunArgs),

    /// Run one health-check cycle and print the snapshot
    Check(OverrideArgs),

    /// Show the status written by a running engine
    Status {
        /// Status file (defaults to `engine.status_file`)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Send a synthetic alert through one channel
    TestChannel {
        /// Channel to test (chat, mail, webhook, console)
        channel: ChannelId,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Settings that override the configuration file
#[derive(Parser, Debug, Default)]
pub struct OverrideArgs {
    /// Seconds between cycles
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Consecutive breaching cycles before alerting
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub consecutive: Option<u32>,

    /// Seconds between two alerts for the same key
    #[arg(long)]
    pub dedup_window: Option<u64>,

    /// Upper bound for one cycle in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_runtime: Option<u64>,
}

/// Arguments for config commands
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Destination (defaults to the user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration and routing table
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to --config or the default locations)
        path: Option<PathBuf>,
    },
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check() {
        let args = Cli::try_parse_from(["vigil", "check"]).unwrap();
        assert!(matches!(args.command, Commands::Check(_)));
    }

    #[test]
    fn test_cli_parse_verbose_count() {
        let args = Cli::try_parse_from(["vigil", "-vv", "check"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_parse_run_args() {
        let args = Cli::try_parse_from([
            "vigil",
            "run",
            "--interval",
            "30",
            "--consecutive",
            "5",
            "--once",
        ])
        .unwrap();

        if let Commands::Run(run) = args.command {
            assert!(run.once);
            assert_eq!(run.overrides.interval, Some(30));
            assert_eq!(run.overrides.consecutive, Some(5));
            assert_eq!(run.overrides.dedup_window, None);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_interval_validation() {
        let result = Cli::try_parse_from(["vigil", "run", "--interval", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_test_channel() {
        let args = Cli::try_parse_from(["vigil", "test-channel", "email"]).unwrap();
        if let Commands::TestChannel { channel } = args.command {
            assert_eq!(channel, ChannelId::Mail);
        } else {
            panic!("Expected TestChannel command");
        }

        assert!(Cli::try_parse_from(["vigil", "test-channel", "pager"]).is_err());
    }

    #[test]
    fn test_cli_parse_config_init() {
        let args =
            Cli::try_parse_from(["vigil", "config", "init", "/tmp/vigil.toml", "--force"]).unwrap();
        if let Commands::Config(ConfigArgs {
            command: ConfigCommands::Init { path, force },
        }) = args.command
        {
            assert_eq!(path, Some(PathBuf::from("/tmp/vigil.toml")));
            assert!(force);
        } else {
            panic!("Expected Config Init command");
        }
    }
}
