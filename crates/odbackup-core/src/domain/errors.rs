//! Domain error types
//!
//! One taxonomy covers a whole backup run. Whether an error ends the run or
//! is only logged is decided by [`BackupError::is_fatal`]:
//!
//! - `Auth`, `Transport`, `CursorExpired`, `Config`, `InvalidState` end the run
//!   before the checkpoint is saved.
//! - `Download`, `LocalIo`, `InvalidPath` affect a single item; the item is
//!   skipped and reconciliation carries on.

use thiserror::Error;

/// Errors that can occur while running a backup job
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackupError {
    /// Credential refresh was rejected or could not be performed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A listing, delta or page fetch failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The stored delta cursor is no longer accepted by the remote
    #[error("Delta cursor expired, a fresh enumeration is required")]
    CursorExpired,

    /// A single content fetch failed
    #[error("Download failed for {path}: {reason}")]
    Download {
        /// Relative path of the file being fetched
        path: String,
        /// Status or transport detail
        reason: String,
    },

    /// A local create/move/delete/write failed
    #[error("Local I/O error on {path}: {reason}")]
    LocalIo {
        /// Local path involved
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// A remote path cannot be mapped safely under the local target
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid job state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackupError {
    /// Builds a [`BackupError::LocalIo`] from an `std::io::Error`
    pub fn local_io(path: impl std::fmt::Display, err: &std::io::Error) -> Self {
        BackupError::LocalIo {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    /// Returns true if the error must abort the current run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackupError::Auth(_)
                | BackupError::Transport(_)
                | BackupError::CursorExpired
                | BackupError::Config(_)
                | BackupError::InvalidState { .. }
        )
    }
}
