//! One run of one backup job
//!
//! [`BackupJobRunner`] drives a [`JobRun`] through its states:
//!
//! ```text
//! Idle → TokenAcquired → Observed → Reconciled → Downloaded → Persisted
//! ```
//!
//! The listing/delta strategy is chosen by [`SyncMode`]; token
//! acquisition, checkpoint load/save and the download pool are shared by
//! both. The checkpoint is saved exactly once, after the download phase, and
//! only if every earlier step succeeded.

use std::sync::Arc;

use chrono::Utc;
use odbackup_core::config::{BackupJobConfig, SyncMode};
use odbackup_core::domain::{
    BackupError, DeltaRound, JobRun, JobState, SyncCheckpoint, UpdateBatch,
};
use odbackup_core::ports::{IAuthProvider, IRemoteDrive};
use tracing::{error, info, info_span, warn, Instrument};

use crate::checkpoint::CheckpointStore;
use crate::delta::DeltaReconciler;
use crate::download::DownloadExecutor;
use crate::filesystem::LocalTree;
use crate::full_listing::LocalTreeReconciler;

/// Runs backup jobs against a remote drive
#[derive(Clone)]
pub struct BackupJobRunner {
    auth: Arc<dyn IAuthProvider>,
    drive: Arc<dyn IRemoteDrive>,
}

impl BackupJobRunner {
    pub fn new(auth: Arc<dyn IAuthProvider>, drive: Arc<dyn IRemoteDrive>) -> Self {
        Self { auth, drive }
    }

    /// Runs `job` once
    ///
    /// # Returns
    /// The finished run: `Persisted` on success, `Failed` with the error
    /// message otherwise. Failures are also logged with the account.
    pub async fn run(&self, job: &BackupJobConfig) -> JobRun {
        let span = info_span!("job", account = %job.account_name, mode = %job.sync_mode);
        async {
            let mut run = JobRun::new(&job.account_name);
            info!(target_dir = %job.local_target_directory.display(), "Backup run started");

            match self.execute(job, &mut run).await {
                Ok(()) => {
                    let stats = run.stats();
                    info!(
                        downloaded = stats.files_downloaded,
                        skipped = stats.files_skipped,
                        moved = stats.files_moved,
                        deleted = stats.files_deleted,
                        folders_created = stats.folders_created,
                        failures = stats.failures(),
                        duration_ms = run.duration_ms(),
                        "Backup run finished"
                    );
                }
                Err(e) => {
                    run.fail(&e);
                    error!(error = %e, state = %run.state(), "Backup run failed");
                }
            }
            run
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &BackupJobConfig, run: &mut JobRun) -> Result<(), BackupError> {
        let tree = LocalTree::new(&job.local_target_directory);
        let store = CheckpointStore::for_target(tree.root());
        let mut checkpoint = store.load().await;

        let tokens = self.auth.refresh(&job.credentials()).await?;
        run.advance(JobState::TokenAcquired)?;
        tree.ensure_root().await?;
        sweep_leftovers(&tree, &store, &checkpoint).await;

        let downloads = DownloadExecutor::new(
            Arc::clone(&self.drive),
            tokens.access_token.clone(),
            tree.clone(),
            job.max_concurrency,
        );
        let filter = job.exclusion_filter();
        let root = job.normalized_root();

        match job.sync_mode {
            SyncMode::FullListing => {
                let snapshot = self
                    .drive
                    .list_tree(&tokens.access_token, &root, &filter)
                    .await?;
                run.advance(JobState::Observed)?;

                let reconciler = LocalTreeReconciler::new(&tree, &downloads);
                let stats = reconciler.apply_structure(&snapshot).await?;
                run.record(&stats);
                run.advance(JobState::Reconciled)?;

                let stats = reconciler
                    .download_changed(&snapshot, &mut checkpoint)
                    .await?;
                run.record(&stats);
                reconciler.prune_checkpoint(&snapshot, &mut checkpoint);
                run.advance(JobState::Downloaded)?;
            }
            SyncMode::Delta => {
                let round = self
                    .observe_delta(&tokens.access_token, &root, &checkpoint)
                    .await?;
                run.advance(JobState::Observed)?;

                let reconciler = DeltaReconciler::new(&tree, &downloads, &filter);
                let stats = reconciler.retry_pending(&mut checkpoint).await?;
                run.record(&stats);

                let batch = UpdateBatch::from_changes(round.changes, &checkpoint);
                let stats = reconciler.apply(batch, &mut checkpoint).await?;
                run.record(&stats);
                // Content transfer is part of each file's upsert in this mode.
                run.advance(JobState::Reconciled)?;
                run.advance(JobState::Downloaded)?;

                checkpoint.set_delta_cursor(round.cursor);
            }
        }

        checkpoint.record_backup(Utc::now());
        store.save(&checkpoint).await?;
        run.advance(JobState::Persisted)?;
        Ok(())
    }

    /// Fetches the delta round, re-bootstrapping once if the cursor expired
    async fn observe_delta(
        &self,
        access_token: &str,
        root: &str,
        checkpoint: &SyncCheckpoint,
    ) -> Result<DeltaRound, BackupError> {
        let cursor = checkpoint.delta_cursor();
        match self.drive.get_delta(access_token, root, cursor).await {
            Err(BackupError::CursorExpired) if cursor.is_some() => {
                warn!("Delta cursor expired, re-enumerating from the root");
                self.drive.get_delta(access_token, root, None).await
            }
            other => other,
        }
    }
}

/// Clears staged files an interrupted run left in the target directory
///
/// Failures are logged and do not fail the run.
async fn sweep_leftovers(tree: &LocalTree, store: &CheckpointStore, checkpoint: &SyncCheckpoint) {
    if let Err(e) = store.discard_staged().await {
        warn!(error = %e, "Failed to remove staged checkpoint");
    }
    match tree
        .sweep_partial_downloads(|path| checkpoint.file(path).is_some())
        .await
    {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed interrupted downloads"),
        Err(e) => warn!(error = %e, "Failed to sweep interrupted downloads"),
    }
}

impl std::fmt::Debug for BackupJobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupJobRunner").finish_non_exhaustive()
    }
}
