//! Daemon command - Scheduled mode
//!
//! Provides the `odbackup daemon` CLI command, which runs every configured
//! job on its own interval until SIGINT or SIGTERM. A job whose previous
//! run is still going when its interval elapses skips that tick.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use odbackup_sync::JobScheduler;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{build_runner, load_config};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DaemonCommand {}

impl DaemonCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;

        let scheduler = Arc::new(JobScheduler::new(build_runner(&config)?, config.jobs.clone())?);
        for job in scheduler.jobs() {
            formatter.field(
                &job.account_name,
                &format!(
                    "every {} min, {} mode, into {}",
                    job.interval_minutes,
                    job.sync_mode,
                    job.local_target_directory.display()
                ),
            );
        }
        formatter.success("odbackup daemon started");

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(signal_token).await;
        });

        scheduler.run(shutdown).await;
        info!("odbackup daemon shut down gracefully");
        formatter.success("odbackup daemon stopped");
        Ok(())
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
