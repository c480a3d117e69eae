//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mail Relay - drains email queues into two delivery backends
#[derive(Parser, Debug)]
#[command(
    name = "mail-relay",
    author,
    version,
    about = "Queue-driven email relay with two health-tracked backends",
    long_about = "Continuously drains email send requests from source queues and delivers \n\
                  them through two interchangeable backends.\n\n\
                  Load shifts away from a failing backend, which keeps receiving a \n\
                  single canary item per batch until it recovers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MAIL_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MAIL_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay loop
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "MAIL_RELAY_CONFIG")]
    pub config: PathBuf,

    /// JSON-lines file of payloads enqueued on the first queue before starting
    #[arg(long, env = "MAIL_RELAY_SEED")]
    pub seed: Option<PathBuf>,

    /// Stop after this many iterations (0 = run until the process is stopped)
    #[arg(long, default_value = "0", env = "MAIL_RELAY_MAX_ITERATIONS")]
    pub max_iterations: u64,

    /// Override the minimum iteration duration in milliseconds
    #[arg(long, env = "MAIL_RELAY_MIN_ITERATION_MS")]
    pub min_iteration_ms: Option<u64>,

    /// Override the collaborator call timeout in seconds
    #[arg(long, env = "MAIL_RELAY_CLIENT_TIMEOUT_SECS")]
    pub client_timeout_secs: Option<u64>,

    /// Validate configuration and exit without running the relay
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MAIL_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
