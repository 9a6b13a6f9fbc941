//! Bounded-concurrency content transfer
//!
//! Every download of a job goes through one [`DownloadExecutor`], which
//! holds the job's permit pool. Whoever calls it (the full-listing pass or
//! the delta worker pool), at most `max_concurrency` transfers are in flight.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use odbackup_core::domain::{BackupError, RemoteFile};
use odbackup_core::ports::IRemoteDrive;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use crate::filesystem::LocalTree;

/// Fetches remote file content into the local mirror
#[derive(Clone)]
pub struct DownloadExecutor {
    drive: Arc<dyn IRemoteDrive>,
    access_token: String,
    tree: LocalTree,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl DownloadExecutor {
    /// Creates an executor for one run
    ///
    /// # Arguments
    /// * `drive` - Remote drive adapter
    /// * `access_token` - Bearer token of the run
    /// * `tree` - Local mirror the files land in
    /// * `max_concurrency` - Permit count, at least 1
    pub fn new(
        drive: Arc<dyn IRemoteDrive>,
        access_token: impl Into<String>,
        tree: LocalTree,
        max_concurrency: usize,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            drive,
            access_token: access_token.into(),
            tree,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn tree(&self) -> &LocalTree {
        &self.tree
    }

    /// Downloads one file to its mirror location
    ///
    /// Waits for a permit first. On failure the local file is left as it was.
    ///
    /// # Returns
    /// Number of bytes written
    ///
    /// # Errors
    /// - [`BackupError::InvalidPath`] if the path cannot be mapped locally
    /// - [`BackupError::Download`] / [`BackupError::LocalIo`] from the transfer
    #[instrument(skip(self, file), fields(path = %file.path))]
    pub async fn download(&self, file: &RemoteFile) -> Result<u64, BackupError> {
        let target = self.tree.local_path(&file.path)?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BackupError::Download {
                path: file.path.clone(),
                reason: "download pool closed".to_string(),
            })?;

        let bytes = self
            .drive
            .download_file(&self.access_token, file, &target)
            .await?;
        debug!(bytes, "Downloaded");
        Ok(bytes)
    }

    /// Downloads many files, at most `max_concurrency` at a time
    ///
    /// # Returns
    /// Each file with its outcome, in completion order
    pub async fn download_all(
        &self,
        files: Vec<RemoteFile>,
    ) -> Vec<(RemoteFile, Result<u64, BackupError>)> {
        stream::iter(files)
            .map(|file| async move {
                let result = self.download(&file).await;
                (file, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }
}

impl std::fmt::Debug for DownloadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadExecutor")
            .field("root", &self.tree.root())
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
