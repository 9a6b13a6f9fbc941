//! Incremental reconciliation (delta mode)
//!
//! Entities are correlated across rounds by stable Id: an upsert whose Id is
//! already in the checkpoint under another path is a move, not a new item.
//!
//! ## Ordering within one round
//!
//! 1. Folder upserts, one at a time
//! 2. File upserts, on a worker pool bounded by the job's concurrency
//! 3. File deletions
//! 4. Folder deletions
//!
//! The feed reports a rename as an upsert, never as delete + create, so
//! applying deletions last cannot destroy content that merely moved.
//!
//! ## Failed downloads
//!
//! The feed never reports an unchanged file again, so a file whose download
//! fails is marked pending in the checkpoint. [`DeltaReconciler::retry_pending`]
//! re-attempts those entries on every later run until one succeeds or a
//! tombstone removes the entry.

use std::collections::HashSet;
use std::sync::Mutex;

use futures_util::stream::{self, StreamExt};
use odbackup_core::domain::remote_item::validate_relative_path;
use odbackup_core::domain::{
    BackupError, ExclusionFilter, RemoteFile, RemoteFolder, RunStats, SyncCheckpoint,
    UpdateBatch,
};
use tracing::{debug, info, warn};

use crate::download::DownloadExecutor;
use crate::filesystem::{DirMove, LocalTree};
use crate::full_listing::count_failure;

type SharedCheckpoint<'c> = Mutex<&'c mut SyncCheckpoint>;

/// Applies one [`UpdateBatch`] to the local mirror and the checkpoint
pub struct DeltaReconciler<'a> {
    tree: &'a LocalTree,
    downloads: &'a DownloadExecutor,
    filter: &'a ExclusionFilter,
}

impl<'a> DeltaReconciler<'a> {
    pub fn new(
        tree: &'a LocalTree,
        downloads: &'a DownloadExecutor,
        filter: &'a ExclusionFilter,
    ) -> Self {
        Self {
            tree,
            downloads,
            filter,
        }
    }

    /// Applies a whole round
    ///
    /// Per-item failures are logged and counted.
    ///
    /// # Errors
    /// A download error for which [`BackupError::is_fatal`] holds; the
    /// checkpoint is then left half-applied and must not be saved.
    pub async fn apply(
        &self,
        batch: UpdateBatch,
        checkpoint: &mut SyncCheckpoint,
    ) -> Result<RunStats, BackupError> {
        let mut stats = RunStats::default();
        info!(
            files = batch.files.len(),
            folders = batch.folders.len(),
            deleted_files = batch.deleted_file_ids.len(),
            deleted_folders = batch.deleted_folder_ids.len(),
            "Applying delta batch"
        );

        for folder in batch.folders {
            stats.merge(&self.apply_folder(folder, checkpoint).await);
        }

        let files = last_per_id(batch.files);
        let file_stats: Vec<Result<RunStats, BackupError>> = {
            let shared: SharedCheckpoint<'_> = Mutex::new(&mut *checkpoint);
            stream::iter(files)
                .map(|file| self.apply_file(file, &shared))
                .buffer_unordered(self.downloads.max_concurrency())
                .collect()
                .await
        };
        for s in file_stats {
            stats.merge(&s?);
        }

        for id in &batch.deleted_file_ids {
            stats.merge(&self.delete_file(id, checkpoint).await);
        }
        for id in &batch.deleted_folder_ids {
            stats.merge(&self.delete_folder(id, checkpoint).await);
        }

        info!(
            downloaded = stats.files_downloaded,
            skipped = stats.files_skipped,
            moved = stats.files_moved + stats.folders_moved,
            deleted = stats.files_deleted + stats.folders_deleted,
            failures = stats.failures(),
            "Delta batch applied"
        );
        Ok(stats)
    }

    /// Re-attempts every download left pending by an earlier run
    ///
    /// Entries that became excluded are dropped from the pending set
    /// without a transfer.
    ///
    /// # Errors
    /// A download error for which [`BackupError::is_fatal`] holds
    pub async fn retry_pending(
        &self,
        checkpoint: &mut SyncCheckpoint,
    ) -> Result<RunStats, BackupError> {
        let mut stats = RunStats::default();
        let mut retry = Vec::new();
        let pending: Vec<String> = checkpoint.pending_downloads().iter().cloned().collect();
        for id in pending {
            match checkpoint.file_by_id(&id) {
                Some(file) if !file.excluded => retry.push(file.clone()),
                _ => {
                    checkpoint.clear_download_pending(&id);
                }
            }
        }
        if retry.is_empty() {
            return Ok(stats);
        }

        info!(files = retry.len(), "Retrying downloads left from an earlier run");
        for (file, result) in self.downloads.download_all(retry).await {
            match result {
                Ok(_) => {
                    stats.files_downloaded += 1;
                    checkpoint.clear_download_pending(&file.id);
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "Download failed again, will retry next run");
                    count_failure(&mut stats, e)?;
                }
            }
        }
        Ok(stats)
    }

    /// Applies one folder upsert
    async fn apply_folder(
        &self,
        mut folder: RemoteFolder,
        checkpoint: &mut SyncCheckpoint,
    ) -> RunStats {
        let mut stats = RunStats::default();
        if let Err(e) = validate_relative_path(&folder.path) {
            warn!(id = %folder.id, error = %e, "Skipping folder with unsafe path");
            stats.local_io_failures += 1;
            return stats;
        }

        folder.excluded = self.filter.is_excluded(&folder.path);
        let excluded = folder.excluded;
        let path = folder.path.clone();
        let prior = checkpoint.upsert_folder(folder);

        if let Some(prior) = &prior {
            if prior.path != path {
                let rekeyed = checkpoint.rebase_descendants(&prior.path, &path, self.filter);
                debug!(from = %prior.path, to = %path, rekeyed, "Folder moved remotely");
            }
        }

        match prior {
            Some(prior) if !prior.excluded && excluded => {
                match self.tree.delete_dir(&prior.path).await {
                    Ok(true) => stats.folders_deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(path = %prior.path, error = %e, "Failed to remove newly excluded folder");
                        stats.local_io_failures += 1;
                    }
                }
            }
            Some(prior) if !prior.excluded && prior.path != path => {
                match self.tree.move_dir(&prior.path, &path).await {
                    Ok(DirMove::Moved) => stats.folders_moved += 1,
                    Ok(DirMove::DestinationExists) => {
                        warn!(from = %prior.path, to = %path, "Destination folder already exists, leaving source in place");
                    }
                    Ok(DirMove::SourceMissing) => self.create_folder(&path, &mut stats).await,
                    Err(e) => {
                        warn!(from = %prior.path, to = %path, error = %e, "Failed to move folder");
                        stats.local_io_failures += 1;
                    }
                }
            }
            _ if !excluded => self.create_folder(&path, &mut stats).await,
            _ => {}
        }

        stats
    }

    async fn create_folder(&self, path: &str, stats: &mut RunStats) {
        match self.tree.ensure_dir(path).await {
            Ok(true) => stats.folders_created += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to create folder");
                stats.local_io_failures += 1;
            }
        }
    }

    /// Applies one file upsert
    ///
    /// 1. recompute Excluded for the new path
    /// 2. find the prior entry by Id
    /// 3. record the file under its new path
    /// 4. if the prior entry was included: delete it locally when newly
    ///    excluded (and stop), or move it when the path changed
    /// 5. newly excluded files are not downloaded
    /// 6. download unless the CTag is unchanged, no earlier download is
    ///    pending and the local copy exists
    async fn apply_file(
        &self,
        mut file: RemoteFile,
        checkpoint: &SharedCheckpoint<'_>,
    ) -> Result<RunStats, BackupError> {
        let mut stats = RunStats::default();
        if let Err(e) = validate_relative_path(&file.path) {
            warn!(id = %file.id, error = %e, "Skipping file with unsafe path");
            stats.local_io_failures += 1;
            return Ok(stats);
        }

        file.excluded = self.filter.is_excluded(&file.path);
        let prior = lock(checkpoint).upsert_file(file.clone());

        if let Some(prior) = prior.as_ref().filter(|p| !p.excluded) {
            if file.excluded {
                match self.tree.delete_file(&prior.path).await {
                    Ok(true) => {
                        debug!(path = %prior.path, "Removed file that moved into an excluded path");
                        stats.files_deleted += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(path = %prior.path, error = %e, "Failed to remove newly excluded file");
                        stats.local_io_failures += 1;
                    }
                }
                lock(checkpoint).clear_download_pending(&file.id);
                return Ok(stats);
            }

            if prior.path != file.path {
                match self.tree.move_file(&prior.path, &file.path).await {
                    Ok(true) => stats.files_moved += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(from = %prior.path, to = %file.path, error = %e, "Failed to move file");
                        stats.local_io_failures += 1;
                    }
                }
            }
        }

        if file.excluded {
            return Ok(stats);
        }

        let same_content = prior.as_ref().is_some_and(|p| p.c_tag == file.c_tag);
        let pending = lock(checkpoint).pending_downloads().contains(&file.id);
        if same_content && !pending && self.tree.file_exists(&file.path).await {
            stats.files_skipped += 1;
            return Ok(stats);
        }

        match self.downloads.download(&file).await {
            Ok(_) => {
                stats.files_downloaded += 1;
                lock(checkpoint).clear_download_pending(&file.id);
            }
            Err(e) => {
                warn!(path = %file.path, error = %e, "Download failed, will retry next run");
                lock(checkpoint).mark_download_pending(&file.id);
                count_failure(&mut stats, e)?;
            }
        }
        Ok(stats)
    }

    /// Applies one file tombstone
    async fn delete_file(&self, id: &str, checkpoint: &mut SyncCheckpoint) -> RunStats {
        let mut stats = RunStats::default();
        let Some(entry) = checkpoint.remove_file_by_id(id) else {
            return stats;
        };
        if entry.excluded {
            return stats;
        }
        match self.tree.delete_file(&entry.path).await {
            Ok(true) => stats.files_deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(path = %entry.path, error = %e, "Failed to delete file");
                stats.local_io_failures += 1;
            }
        }
        stats
    }

    /// Applies one folder tombstone
    ///
    /// An Id without a checkpoint entry is a no-op.
    async fn delete_folder(&self, id: &str, checkpoint: &mut SyncCheckpoint) -> RunStats {
        let mut stats = RunStats::default();
        let Some(entry) = checkpoint.remove_folder_by_id(id) else {
            debug!(id, "Tombstone for unknown folder, ignoring");
            return stats;
        };
        checkpoint.remove_descendants(&entry.path);
        if entry.excluded {
            return stats;
        }
        match self.tree.delete_dir(&entry.path).await {
            Ok(true) => stats.folders_deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(path = %entry.path, error = %e, "Failed to delete folder");
                stats.local_io_failures += 1;
            }
        }
        stats
    }
}

fn lock<'g, 'c>(
    checkpoint: &'g SharedCheckpoint<'c>,
) -> std::sync::MutexGuard<'g, &'c mut SyncCheckpoint> {
    checkpoint.lock().unwrap_or_else(|e| e.into_inner())
}

/// Keeps only the last upsert of each Id, preserving feed order
///
/// A later page can report the same item again; two workers must never
/// race on one entity.
fn last_per_id(files: Vec<RemoteFile>) -> Vec<RemoteFile> {
    let mut seen = HashSet::new();
    let mut kept: Vec<RemoteFile> = files
        .into_iter()
        .rev()
        .filter(|f| seen.insert(f.id.clone()))
        .collect();
    kept.reverse();
    kept
}
