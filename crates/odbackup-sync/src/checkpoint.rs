//! Checkpoint persistence
//!
//! The checkpoint lives inside the local target directory as a single JSON
//! document. It is read once when a run starts and written once when a run
//! succeeds; nothing in between touches the file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use odbackup_core::domain::{BackupError, SyncCheckpoint, CHECKPOINT_FILE_NAME};
use tracing::{debug, instrument, warn};

/// Loads and saves the checkpoint of one job
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store for the checkpoint at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the checkpoint inside a job's local target directory
    pub fn for_target(target_dir: &Path) -> Self {
        Self::new(target_dir.join(CHECKPOINT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a save is written before it replaces the checkpoint
    pub fn staging_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    }

    /// Removes a staged save left behind by an interrupted run
    ///
    /// # Returns
    /// `true` if a leftover was removed
    pub async fn discard_staged(&self) -> Result<bool, BackupError> {
        let staged = self.staging_path();
        match tokio::fs::remove_file(&staged).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackupError::local_io(staged.display(), &e)),
        }
    }

    /// Reads the checkpoint
    ///
    /// An absent file means a first run. An unreadable or corrupt file is
    /// logged and also treated as a first run; the next successful run
    /// overwrites it.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> SyncCheckpoint {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No checkpoint yet, starting empty");
                return SyncCheckpoint::new();
            }
            Err(e) => {
                warn!(error = %e, "Checkpoint unreadable, starting empty");
                return SyncCheckpoint::new();
            }
        };

        match serde_json::from_slice::<SyncCheckpoint>(&bytes) {
            Ok(checkpoint) => {
                debug!(
                    files = checkpoint.files().len(),
                    folders = checkpoint.folders().len(),
                    has_cursor = checkpoint.delta_cursor().is_some(),
                    "Checkpoint loaded"
                );
                checkpoint
            }
            Err(e) => {
                warn!(error = %e, "Checkpoint corrupt, starting empty");
                SyncCheckpoint::new()
            }
        }
    }

    /// Writes the whole checkpoint, replacing the previous file
    ///
    /// The document is written next to the target and renamed over it, so
    /// readers see either the old or the new checkpoint.
    ///
    /// # Errors
    /// [`BackupError::LocalIo`] if serialization, the write or the rename fails.
    #[instrument(skip(self, checkpoint), fields(path = %self.path.display()))]
    pub async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), BackupError> {
        let json = serde_json::to_vec_pretty(checkpoint).map_err(|e| BackupError::LocalIo {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackupError::local_io(parent.display(), &e))?;
        }

        let tmp_path = self.staging_path();

        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| BackupError::local_io(tmp_path.display(), &e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(BackupError::local_io(self.path.display(), &e));
        }

        debug!(
            bytes = json.len(),
            files = checkpoint.files().len(),
            "Checkpoint saved"
        );
        Ok(())
    }
}
