//! Status command - Show what the last runs left behind
//!
//! Provides the `odbackup status` CLI command which reads each job's
//! checkpoint from its target directory and prints the last backup time,
//! the number of tracked files and folders, and whether a delta cursor is
//! stored. Nothing is contacted remotely.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use odbackup_core::config::BackupJobConfig;
use odbackup_core::domain::SyncCheckpoint;
use odbackup_sync::CheckpointStore;

use super::{load_config, select_jobs};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Only show the job of this account
    #[arg(long)]
    pub account: Option<String>,
}

impl StatusCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let jobs = select_jobs(&config, self.account.as_deref())?;

        let mut reports = Vec::new();
        for job in &jobs {
            let store = CheckpointStore::for_target(&job.local_target_directory);
            let checkpoint = store.load().await;
            reports.push(status_to_json(job, &checkpoint));

            if format == OutputFormat::Human {
                match checkpoint.last_backup_time() {
                    Some(at) => formatter.success(&format!(
                        "{}: last backup {}",
                        job.account_name,
                        at.format("%Y-%m-%d %H:%M:%S UTC")
                    )),
                    None => formatter.warn(&format!("{}: never backed up", job.account_name)),
                }
                formatter.field("Target", &job.local_target_directory.display().to_string());
                formatter.field("Mode", &job.sync_mode.to_string());
                formatter.field(
                    "Tracked",
                    &format!(
                        "{}, {}",
                        plural(checkpoint.files().len() as u64, "file"),
                        plural(checkpoint.folders().len() as u64, "folder")
                    ),
                );
                if checkpoint.delta_cursor().is_some() {
                    formatter.field("Delta", "cursor stored");
                }
            }
        }

        if format == OutputFormat::Json {
            formatter.print_json(&serde_json::json!({ "jobs": reports }));
        }
        Ok(())
    }
}

fn status_to_json(job: &BackupJobConfig, checkpoint: &SyncCheckpoint) -> serde_json::Value {
    serde_json::json!({
        "account": job.account_name,
        "target": job.local_target_directory.display().to_string(),
        "sync_mode": job.sync_mode,
        "last_backup_time": checkpoint.last_backup_time(),
        "total_files_backed_up": checkpoint.total_files_backed_up(),
        "files": checkpoint.files().len(),
        "folders": checkpoint.folders().len(),
        "has_delta_cursor": checkpoint.delta_cursor().is_some(),
    })
}
