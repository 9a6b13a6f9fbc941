//! Remote drive port
//!
//! Everything the engine needs from the remote store. Calls take the bearer
//! token obtained at the start of the run, so one adapter instance can serve
//! every configured account.
//!
//! ## Design Notes
//!
//! - Returns [`BackupError`] rather than `anyhow::Result` because the runner
//!   must tell a stale delta cursor apart from other transport failures.
//! - Implementations apply the exclusion filter during listing so excluded
//!   subtrees are never fetched.

use std::path::Path;

use crate::domain::delta::DeltaRound;
use crate::domain::errors::BackupError;
use crate::domain::exclusion::ExclusionFilter;
use crate::domain::remote_item::{RemoteFile, RemoteSnapshot};

/// Suffix of the sibling file a download is staged in before it replaces
/// its target
///
/// A leftover with this suffix means a transfer was interrupted.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".partial";

/// Read access to a remote hierarchical file store
#[async_trait::async_trait]
pub trait IRemoteDrive: Send + Sync {
    /// Enumerates the whole tree below `root`, depth-first
    ///
    /// # Arguments
    /// * `access_token` - Bearer token for this run
    /// * `root` - Normalized root (`""` for the drive root, else `/a/b`)
    /// * `filter` - Excluded folders are not descended into, excluded files are omitted
    ///
    /// # Errors
    /// Any failed page fetch aborts the listing with [`BackupError::Transport`].
    async fn list_tree(
        &self,
        access_token: &str,
        root: &str,
        filter: &ExclusionFilter,
    ) -> Result<RemoteSnapshot, BackupError>;

    /// Fetches one complete delta round
    ///
    /// With `cursor = None` a fresh feed scoped to `root` is started.
    ///
    /// # Errors
    /// [`BackupError::CursorExpired`] when the cursor is no longer accepted,
    /// [`BackupError::Transport`] for any other failure.
    async fn get_delta(
        &self,
        access_token: &str,
        root: &str,
        cursor: Option<&str>,
    ) -> Result<DeltaRound, BackupError>;

    /// Streams a file's content to `target`, creating parent directories
    ///
    /// `target` is only replaced once the whole body has been received; until
    /// then content goes to `target` + [`PARTIAL_DOWNLOAD_SUFFIX`].
    ///
    /// # Returns
    /// Number of bytes written
    ///
    /// # Errors
    /// [`BackupError::Download`] for a non-success response or broken stream,
    /// [`BackupError::LocalIo`] when the local write fails.
    async fn download_file(
        &self,
        access_token: &str,
        file: &RemoteFile,
        target: &Path,
    ) -> Result<u64, BackupError>;
}
