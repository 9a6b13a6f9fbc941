//! Sync command - Run the configured backup jobs once
//!
//! Provides the `odbackup sync` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Builds the Graph adapters and the job runner
//! 3. Runs every selected job concurrently
//! 4. Prints one summary per job and exits non-zero if any job failed

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use odbackup_core::domain::{JobRun, JobState};
use odbackup_sync::{JobOutcome, JobScheduler};
use tracing::info;

use super::{build_runner, load_config, select_jobs};
use crate::output::{format_duration_ms, get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only run the job of this account
    #[arg(long)]
    pub account: Option<String>,
}

impl SyncCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let jobs = select_jobs(&config, self.account.as_deref())?;
        info!(config_path = %config_path.display(), jobs = jobs.len(), "Running backup jobs once");

        let scheduler = JobScheduler::new(build_runner(&config)?, jobs)?;
        let outcomes = scheduler.run_once().await;

        let mut failed = 0usize;
        let mut reports = Vec::new();
        for (account, outcome) in &outcomes {
            match outcome {
                JobOutcome::Completed(run) => {
                    if run.state() != JobState::Persisted {
                        failed += 1;
                    }
                    if format == OutputFormat::Json {
                        reports.push(run_to_json(run));
                    } else {
                        print_run(&*formatter, run);
                    }
                }
                JobOutcome::Skipped => {
                    if format == OutputFormat::Json {
                        reports.push(serde_json::json!({"account": account, "state": "skipped"}));
                    } else {
                        formatter.warn(&format!("{}: skipped, a run is already in progress", account));
                    }
                }
            }
        }

        if format == OutputFormat::Json {
            formatter.print_json(&serde_json::json!({ "jobs": reports }));
        }

        if failed > 0 {
            bail!("{} of {} jobs failed", failed, outcomes.len());
        }
        Ok(())
    }
}

fn print_run(formatter: &dyn OutputFormatter, run: &JobRun) {
    if let Some(error) = run.error() {
        formatter.error(&format!("{}: {}", run.account(), error));
        return;
    }

    let stats = run.stats();
    if stats.mutations() == 0 && stats.failures() == 0 {
        formatter.success(&format!("{}: already up to date", run.account()));
        return;
    }

    formatter.success(&format!(
        "{}: completed in {}",
        run.account(),
        format_duration_ms(run.duration_ms())
    ));
    if stats.files_downloaded > 0 {
        formatter.field("Downloaded", &plural(stats.files_downloaded, "file"));
    }
    if stats.files_moved + stats.folders_moved > 0 {
        formatter.field(
            "Moved",
            &format!(
                "{}, {}",
                plural(stats.files_moved, "file"),
                plural(stats.folders_moved, "folder")
            ),
        );
    }
    if stats.files_deleted + stats.folders_deleted > 0 {
        formatter.field(
            "Deleted",
            &format!(
                "{}, {}",
                plural(stats.files_deleted, "file"),
                plural(stats.folders_deleted, "folder")
            ),
        );
    }
    if stats.folders_created > 0 {
        formatter.field("Created", &plural(stats.folders_created, "folder"));
    }
    if stats.failures() > 0 {
        formatter.warn(&format!(
            "{}: {} will be retried next run",
            run.account(),
            plural(stats.failures(), "item")
        ));
    }
}

fn run_to_json(run: &JobRun) -> serde_json::Value {
    serde_json::json!({
        "account": run.account(),
        "state": run.state(),
        "error": run.error(),
        "duration_ms": run.duration_ms(),
        "stats": run.stats(),
    })
}
