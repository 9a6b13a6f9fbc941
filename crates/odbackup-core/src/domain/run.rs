//! Backup job run lifecycle
//!
//! A run walks a fixed sequence of states. The checkpoint is written only in
//! the `Downloaded → Persisted` step, so a run that fails anywhere earlier
//! leaves the previous checkpoint in effect.
//!
//! ```text
//! Idle → TokenAcquired → Observed → Reconciled → Downloaded → Persisted → Idle
//!   └──────────┴────────────┴───────────┴────────────┴──→ Failed → Idle
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::BackupError;

/// State of a backup job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No run in progress
    Idle,
    /// A bearer token has been obtained
    TokenAcquired,
    /// The remote snapshot or delta round has been fetched
    Observed,
    /// Structural local changes have been applied
    Reconciled,
    /// Content transfer has finished
    Downloaded,
    /// The checkpoint has been saved
    Persisted,
    /// The run ended early; the checkpoint was not saved
    Failed,
}

impl JobState {
    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, TokenAcquired)
                | (TokenAcquired, Observed)
                | (Observed, Reconciled)
                | (Reconciled, Downloaded)
                | (Downloaded, Persisted)
                | (Persisted, Idle)
                | (Failed, Idle)
                | (Idle, Failed)
                | (TokenAcquired, Failed)
                | (Observed, Failed)
                | (Reconciled, Failed)
                | (Downloaded, Failed)
        )
    }

    /// Returns true once the run has ended, successfully or not
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Persisted | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Idle => "Idle",
            JobState::TokenAcquired => "TokenAcquired",
            JobState::Observed => "Observed",
            JobState::Reconciled => "Reconciled",
            JobState::Downloaded => "Downloaded",
            JobState::Persisted => "Persisted",
            JobState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Counters collected while reconciling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub files_downloaded: u64,
    /// Files whose local copy was already current
    pub files_skipped: u64,
    pub files_moved: u64,
    pub files_deleted: u64,
    pub folders_created: u64,
    pub folders_moved: u64,
    pub folders_deleted: u64,
    pub download_failures: u64,
    pub local_io_failures: u64,
}

impl RunStats {
    /// Adds every counter of `other` to `self`
    pub fn merge(&mut self, other: &RunStats) {
        self.files_downloaded += other.files_downloaded;
        self.files_skipped += other.files_skipped;
        self.files_moved += other.files_moved;
        self.files_deleted += other.files_deleted;
        self.folders_created += other.folders_created;
        self.folders_moved += other.folders_moved;
        self.folders_deleted += other.folders_deleted;
        self.download_failures += other.download_failures;
        self.local_io_failures += other.local_io_failures;
    }

    /// Number of local filesystem changes made (downloads included)
    pub fn mutations(&self) -> u64 {
        self.files_downloaded
            + self.files_moved
            + self.files_deleted
            + self.folders_created
            + self.folders_moved
            + self.folders_deleted
    }

    /// Number of recoverable per-item failures
    pub fn failures(&self) -> u64 {
        self.download_failures + self.local_io_failures
    }
}

/// Tracks one run of a backup job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    account: String,
    state: JobState,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    stats: RunStats,
    error: Option<String>,
}

impl JobRun {
    /// Starts tracking a run for `account` in the `Idle` state
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            state: JobState::Idle,
            started_at: Utc::now(),
            finished_at: None,
            stats: RunStats::default(),
            error: None,
        }
    }

    /// Moves the run to `next`
    ///
    /// # Errors
    /// Returns [`BackupError::InvalidState`] if the step is not allowed.
    pub fn advance(&mut self, next: JobState) -> Result<(), BackupError> {
        if !self.state.can_transition_to(next) {
            return Err(BackupError::InvalidState {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        if next.is_finished() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Marks the run failed, keeping the error message
    ///
    /// Has no effect on a run that already finished.
    pub fn fail(&mut self, error: &BackupError) {
        if self.state.is_finished() {
            return;
        }
        self.state = JobState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.to_string());
    }

    /// Adds per-phase counters to the run
    pub fn record(&mut self, stats: &RunStats) {
        self.stats.merge(stats);
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Error message of a failed run
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Wall-clock duration in milliseconds (up to now if still running)
    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}
