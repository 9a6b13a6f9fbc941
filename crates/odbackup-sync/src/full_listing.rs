//! Snapshot reconciliation (full-listing mode)
//!
//! The remote listing is ground truth on every run. No identity correlation
//! is attempted: a rename shows up as a missing old path (deleted locally)
//! and a new path (downloaded). The checkpoint only serves as a change
//! detection cache keyed by path and ETag.
//!
//! ## Passes
//!
//! 1. Delete local files absent from the remote file set
//! 2. Delete local directories absent from the remote folder set, deepest first
//! 3. Create remote directories missing locally
//! 4. Download every file whose ETag changed or whose local copy is missing
//!
//! Passes 1-3 are [`LocalTreeReconciler::apply_structure`], pass 4 is
//! [`LocalTreeReconciler::download_changed`].

use std::collections::HashSet;

use odbackup_core::domain::remote_item::validate_relative_path;
use odbackup_core::domain::{BackupError, RemoteFile, RemoteSnapshot, RunStats, SyncCheckpoint};
use tracing::{debug, info, warn};

use crate::download::DownloadExecutor;
use crate::filesystem::LocalTree;

/// Applies a full remote snapshot to the local mirror
pub struct LocalTreeReconciler<'a> {
    tree: &'a LocalTree,
    downloads: &'a DownloadExecutor,
}

impl<'a> LocalTreeReconciler<'a> {
    pub fn new(tree: &'a LocalTree, downloads: &'a DownloadExecutor) -> Self {
        Self { tree, downloads }
    }

    /// Deletes orphans and creates missing directories
    ///
    /// Individual delete/create failures are logged and counted; processing
    /// continues.
    ///
    /// # Errors
    /// [`BackupError::LocalIo`] if the local tree cannot be scanned.
    pub async fn apply_structure(&self, snapshot: &RemoteSnapshot) -> Result<RunStats, BackupError> {
        let mut stats = RunStats::default();
        let local = self.tree.scan().await?;

        let remote_files = snapshot.file_paths();
        let keep_dirs = dirs_to_keep(snapshot);

        for path in local.files.iter().filter(|p| !remote_files.contains(p.as_str())) {
            match self.tree.delete_file(path).await {
                Ok(true) => {
                    debug!(path = %path, "Deleted orphan file");
                    stats.files_deleted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to delete orphan file");
                    stats.local_io_failures += 1;
                }
            }
        }

        let mut orphan_dirs: Vec<&String> = local
            .dirs
            .iter()
            .filter(|p| !keep_dirs.contains(p.as_str()))
            .collect();
        orphan_dirs.sort_by_key(|p| std::cmp::Reverse(depth(p)));

        for path in orphan_dirs {
            match self.tree.delete_dir(path).await {
                Ok(true) => {
                    debug!(path = %path, "Deleted orphan directory");
                    stats.folders_deleted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to delete orphan directory");
                    stats.local_io_failures += 1;
                }
            }
        }

        let mut folders: Vec<&str> = snapshot.folder_paths().into_iter().collect();
        folders.sort_unstable();
        for path in folders.into_iter().filter(|p| !local.dirs.contains(*p)) {
            match self.tree.ensure_dir(path).await {
                Ok(true) => stats.folders_created += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to create directory");
                    stats.local_io_failures += 1;
                }
            }
        }

        info!(
            deleted_files = stats.files_deleted,
            deleted_dirs = stats.folders_deleted,
            created_dirs = stats.folders_created,
            "Local structure reconciled"
        );
        Ok(stats)
    }

    /// Downloads new and changed files, recording each success in `checkpoint`
    ///
    /// A file is skipped when the checkpoint holds the same ETag for its
    /// path and the local copy exists. A failed download leaves both the
    /// local file and the checkpoint entry untouched.
    ///
    /// # Errors
    /// A download error for which [`BackupError::is_fatal`] holds
    pub async fn download_changed(
        &self,
        snapshot: &RemoteSnapshot,
        checkpoint: &mut SyncCheckpoint,
    ) -> Result<RunStats, BackupError> {
        let mut stats = RunStats::default();
        let mut pending: Vec<RemoteFile> = Vec::new();

        for file in &snapshot.files {
            if let Err(e) = validate_relative_path(&file.path) {
                warn!(path = %file.path, error = %e, "Skipping file with unsafe path");
                stats.local_io_failures += 1;
                continue;
            }
            let unchanged = checkpoint
                .file(&file.path)
                .is_some_and(|known| known.e_tag == file.e_tag);
            if unchanged && self.tree.file_exists(&file.path).await {
                stats.files_skipped += 1;
                continue;
            }
            pending.push(file.clone());
        }

        debug!(pending = pending.len(), skipped = stats.files_skipped, "Downloading changed files");

        for (file, result) in self.downloads.download_all(pending).await {
            match result {
                Ok(_) => {
                    stats.files_downloaded += 1;
                    checkpoint.clear_download_pending(&file.id);
                    checkpoint.upsert_file(file);
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "Download failed, will retry next run");
                    count_failure(&mut stats, e)?;
                }
            }
        }

        Ok(stats)
    }

    /// Drops checkpoint entries the snapshot no longer contains
    ///
    /// File entries absent from the snapshot are removed; the folder map is
    /// replaced by the observed folders.
    pub fn prune_checkpoint(&self, snapshot: &RemoteSnapshot, checkpoint: &mut SyncCheckpoint) {
        let remote_files = snapshot.file_paths();
        let removed = checkpoint.retain_files(|f| remote_files.contains(f.path.as_str()));
        checkpoint.replace_folders(snapshot.folders.iter().cloned());
        if !removed.is_empty() {
            debug!(removed = removed.len(), "Pruned checkpoint file entries");
        }
    }
}

/// Remote folders plus every ancestor of them
///
/// Ancestors matter when the configured root is nested: with root
/// `/a/b`, the local directory `/a` must survive.
fn dirs_to_keep(snapshot: &RemoteSnapshot) -> HashSet<String> {
    let mut keep = HashSet::new();
    for folder in &snapshot.folders {
        let mut path = folder.path.as_str();
        loop {
            if path.is_empty() || !keep.insert(path.to_string()) {
                break;
            }
            path = match path.rfind('/') {
                Some(i) => &path[..i],
                None => "",
            };
        }
    }
    for file in &snapshot.files {
        if let Some(i) = file.path.rfind('/') {
            let parent = &file.path[..i];
            if !parent.is_empty() {
                keep.insert(parent.to_string());
            }
        }
    }
    keep
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Counts a failed transfer against the run
///
/// Item-level errors are absorbed; an error that must end the run (an
/// expired token, say) is handed back instead.
pub(crate) fn count_failure(stats: &mut RunStats, error: BackupError) -> Result<(), BackupError> {
    match error {
        e if e.is_fatal() => return Err(e),
        BackupError::Download { .. } => stats.download_failures += 1,
        _ => stats.local_io_failures += 1,
    }
    Ok(())
}
