//! Local mirror tree operations
//!
//! [`LocalTree`] maps remote relative paths (`/a/b.txt`) onto the job's
//! local target directory and performs the structural mutations the
//! reconcilers need: scan, create, move and delete.
//!
//! ## Design Decisions
//!
//! - **Path safety**: every relative path is validated before it is joined
//!   to the root, so a remote name can never address anything outside the
//!   target directory.
//! - **Reserved file**: the checkpoint file at the root is invisible to
//!   scans and refused by the delete operations.
//! - **Missing is not an error**: deleting or moving something that is
//!   already gone reports `false` instead of failing; the mirror converges
//!   either way.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use odbackup_core::domain::remote_item::validate_relative_path;
use odbackup_core::domain::{BackupError, CHECKPOINT_FILE_NAME};
use odbackup_core::ports::PARTIAL_DOWNLOAD_SUFFIX;
use tracing::{debug, instrument};

/// Result of a directory move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirMove {
    /// The directory now lives at the destination
    Moved,
    /// Nothing existed at the source
    SourceMissing,
    /// The destination already exists; nothing was changed
    DestinationExists,
}

/// Relative paths found under the local target directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalScan {
    pub files: BTreeSet<String>,
    pub dirs: BTreeSet<String>,
}

/// The local mirror of one job
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
}

impl LocalTree {
    /// Creates a tree rooted at the job's local target directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_FILE_NAME)
    }

    /// Maps a remote relative path to its local location
    ///
    /// # Errors
    /// [`BackupError::InvalidPath`] if the path is empty, contains `.` / `..`
    /// components or names the checkpoint file.
    pub fn local_path(&self, relative: &str) -> Result<PathBuf, BackupError> {
        validate_relative_path(relative)?;
        let trimmed = relative.trim_start_matches('/');
        if trimmed == CHECKPOINT_FILE_NAME {
            return Err(BackupError::InvalidPath(format!(
                "{relative} is reserved for the checkpoint"
            )));
        }
        Ok(self.root.join(trimmed))
    }

    /// Creates the target directory itself
    pub async fn ensure_root(&self) -> Result<(), BackupError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BackupError::local_io(self.root.display(), &e))
    }

    /// Lists every file and directory below the root
    ///
    /// The checkpoint file at the root is skipped. Symlinks are reported as
    /// files and never followed.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn scan(&self) -> Result<LocalScan, BackupError> {
        let mut scan = LocalScan::default();
        let mut stack = vec![(self.root.clone(), String::new())];

        while let Some((dir, relative)) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| BackupError::local_io(dir.display(), &e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| BackupError::local_io(dir.display(), &e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                if relative.is_empty() && name == CHECKPOINT_FILE_NAME {
                    continue;
                }
                let child = format!("{relative}/{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| BackupError::local_io(entry.path().display(), &e))?;

                if file_type.is_dir() {
                    stack.push((entry.path(), child.clone()));
                    scan.dirs.insert(child);
                } else {
                    scan.files.insert(child);
                }
            }
        }

        debug!(
            files = scan.files.len(),
            dirs = scan.dirs.len(),
            "Local scan complete"
        );
        Ok(scan)
    }

    /// Returns true if a regular file exists at `relative`
    pub async fn file_exists(&self, relative: &str) -> bool {
        match self.local_path(relative) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Removes staged downloads left behind by an interrupted run
    ///
    /// A file ending in [`PARTIAL_DOWNLOAD_SUFFIX`] is kept when `is_tracked`
    /// says it is a real remote file of that name.
    ///
    /// # Returns
    /// Number of files removed
    #[instrument(skip(self, is_tracked), fields(root = %self.root.display()))]
    pub async fn sweep_partial_downloads<F>(&self, is_tracked: F) -> Result<usize, BackupError>
    where
        F: Fn(&str) -> bool,
    {
        let scan = self.scan().await?;
        let mut removed = 0;
        for relative in scan
            .files
            .iter()
            .filter(|f| f.ends_with(PARTIAL_DOWNLOAD_SUFFIX) && !is_tracked(f.as_str()))
        {
            if self.delete_file(relative).await? {
                debug!(path = %relative, "Removed interrupted download");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Creates a directory and its parents
    ///
    /// # Returns
    /// `true` if the directory did not exist before
    #[instrument(skip(self))]
    pub async fn ensure_dir(&self, relative: &str) -> Result<bool, BackupError> {
        let path = self.local_path(relative)?;
        if tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| BackupError::local_io(path.display(), &e))?;
        debug!("Created directory");
        Ok(true)
    }

    /// Deletes a file
    ///
    /// # Returns
    /// `false` if there was nothing to delete
    #[instrument(skip(self))]
    pub async fn delete_file(&self, relative: &str) -> Result<bool, BackupError> {
        let path = self.local_path(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackupError::local_io(path.display(), &e)),
        }
    }

    /// Deletes a directory and everything below it
    ///
    /// # Returns
    /// `false` if there was nothing to delete
    #[instrument(skip(self))]
    pub async fn delete_dir(&self, relative: &str) -> Result<bool, BackupError> {
        let path = self.local_path(relative)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!("Deleted directory");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackupError::local_io(path.display(), &e)),
        }
    }

    /// Moves a file, replacing whatever is at the destination
    ///
    /// # Returns
    /// `false` if the source does not exist
    #[instrument(skip(self))]
    pub async fn move_file(&self, from: &str, to: &str) -> Result<bool, BackupError> {
        let source = self.local_path(from)?;
        let target = self.local_path(to)?;

        if tokio::fs::metadata(&source).await.is_err() {
            return Ok(false);
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackupError::local_io(parent.display(), &e))?;
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| BackupError::local_io(source.display(), &e))?;
        debug!("Moved file");
        Ok(true)
    }

    /// Moves a directory unless the destination already exists
    #[instrument(skip(self))]
    pub async fn move_dir(&self, from: &str, to: &str) -> Result<DirMove, BackupError> {
        let source = self.local_path(from)?;
        let target = self.local_path(to)?;

        if tokio::fs::metadata(&source).await.is_err() {
            return Ok(DirMove::SourceMissing);
        }
        if tokio::fs::metadata(&target).await.is_ok() {
            return Ok(DirMove::DestinationExists);
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackupError::local_io(parent.display(), &e))?;
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| BackupError::local_io(source.display(), &e))?;
        debug!("Moved directory");
        Ok(DirMove::Moved)
    }
}
