//! Job scheduling and the run-in-progress guard
//!
//! Jobs of different accounts run independently and concurrently. The only
//! state they share is the [`RunGuard`], which makes sure a job never has
//! two runs at once: a tick that finds the job still running is skipped,
//! not queued.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──→ RunGuard::try_acquire ──→ BackupJobRunner::run
//!                        │ (held)
//!                        └──→ skip this tick
//! ```

use std::sync::Arc;

use dashmap::DashSet;
use futures_util::future::join_all;
use odbackup_core::config::BackupJobConfig;
use odbackup_core::domain::{BackupError, JobRun};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::runner::BackupJobRunner;

// ============================================================================
// RunGuard
// ============================================================================

/// Set of job identities that currently have a run in progress
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    active: Arc<DashSet<String>>,
}

/// Proof that a job's run is in progress; releases the job on drop
#[derive(Debug)]
pub struct RunPermit {
    active: Arc<DashSet<String>>,
    identity: String,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `identity` for a run
    ///
    /// # Returns
    /// `None` if a run for the same identity is already in progress
    pub fn try_acquire(&self, identity: &str) -> Option<RunPermit> {
        if self.active.insert(identity.to_string()) {
            Some(RunPermit {
                active: Arc::clone(&self.active),
                identity: identity.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, identity: &str) -> bool {
        self.active.contains(identity)
    }

    /// Number of runs in progress
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.active.remove(&self.identity);
    }
}

// ============================================================================
// JobScheduler
// ============================================================================

/// Outcome of asking the scheduler to run one job
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The run happened (successfully or not)
    Completed(JobRun),
    /// A run of the same job was still in progress
    Skipped,
}

/// Runs every configured job, once or on its interval
#[derive(Debug)]
pub struct JobScheduler {
    runner: BackupJobRunner,
    jobs: Vec<BackupJobConfig>,
    guard: RunGuard,
}

impl JobScheduler {
    /// Creates a scheduler for `jobs`
    ///
    /// # Errors
    /// [`BackupError::Config`] if no job is configured or a job has a zero
    /// interval.
    pub fn new(runner: BackupJobRunner, jobs: Vec<BackupJobConfig>) -> Result<Self, BackupError> {
        if jobs.is_empty() {
            return Err(BackupError::Config(
                "at least one backup job must be configured".to_string(),
            ));
        }
        if let Some(job) = jobs.iter().find(|j| j.interval_minutes == 0) {
            return Err(BackupError::Config(format!(
                "job {}: interval_minutes must be greater than 0",
                job.account_name
            )));
        }
        Ok(Self {
            runner,
            jobs,
            guard: RunGuard::new(),
        })
    }

    pub fn jobs(&self) -> &[BackupJobConfig] {
        &self.jobs
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Runs one job unless it is already running
    pub async fn run_job(&self, job: &BackupJobConfig) -> JobOutcome {
        let Some(_permit) = self.guard.try_acquire(&job.identity()) else {
            info!(account = %job.account_name, "Previous run still in progress, skipping");
            return JobOutcome::Skipped;
        };
        JobOutcome::Completed(self.runner.run(job).await)
    }

    /// Runs every job once, concurrently
    ///
    /// # Returns
    /// `(account name, outcome)` in configuration order
    pub async fn run_once(&self) -> Vec<(String, JobOutcome)> {
        let runs = self.jobs.iter().map(|job| async move {
            (job.account_name.clone(), self.run_job(job).await)
        });
        join_all(runs).await
    }

    /// Runs every job on its own interval until `shutdown` is cancelled
    ///
    /// The first run of each job starts immediately. Each run is spawned, so
    /// a slow run never delays the ticks of other jobs; a tick that finds its
    /// own job still running is skipped.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(jobs = self.jobs.len(), "Scheduler started");

        let loops = (0..self.jobs.len()).map(|index| {
            let scheduler = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.job_loop(index, shutdown).await })
        });

        for result in join_all(loops).await {
            if let Err(e) = result {
                warn!(error = %e, "Job loop terminated abnormally");
            }
        }
        info!("Scheduler stopped");
    }

    async fn job_loop(self: Arc<Self>, index: usize, shutdown: CancellationToken) {
        let job = &self.jobs[index];
        let mut ticker = tokio::time::interval(job.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(
            account = %job.account_name,
            interval_secs = job.interval().as_secs(),
            "Job loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        let job = &scheduler.jobs[index];
                        scheduler.run_job(job).await
                    });
                }
            }
        }
        debug!(account = %job.account_name, "Job loop stopped");
    }
}
