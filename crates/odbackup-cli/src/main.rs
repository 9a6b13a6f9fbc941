//! odbackup CLI - One-way OneDrive backup
//!
//! Provides commands for:
//! - Running every backup job once (`sync`)
//! - Running jobs on their interval until stopped (`daemon`)
//! - Showing what the last runs left behind (`status`)
//! - Checking the configuration file (`config`)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use odbackup_core::config::{Config, LoggingConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand, daemon::DaemonCommand, resolve_config_path, status::StatusCommand,
    sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "odbackup", version, about = "One-way OneDrive backup to local directories")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every backup job once
    Sync(SyncCommand),
    /// Run backup jobs on their interval until SIGINT/SIGTERM
    Daemon(DaemonCommand),
    /// Show the checkpoint summary of each job
    Status(StatusCommand),
    /// Inspect the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins; otherwise the configured level, raised by `-v`. Logs go
/// to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    // Commands load the file strictly; here it only picks the log settings.
    let logging = Config::load_or_default(&config_path).logging;
    init_tracing(cli.verbose, &logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config_path, format).await,
        Commands::Daemon(cmd) => cmd.execute(&config_path, format).await,
        Commands::Status(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}
