//! Incremental change feed types
//!
//! The remote delta feed yields a flat list of [`DeltaChange`]s per round.
//! Before reconciliation they are grouped into an [`UpdateBatch`], which is
//! where tombstones get their kind: a tombstone only carries an Id, so the
//! checkpoint decides whether it names a file, a folder, or nothing known.

use super::checkpoint::SyncCheckpoint;
use super::remote_item::{RemoteFile, RemoteFolder};

/// A single item reported by the delta feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaChange {
    /// A file was created, changed, renamed or moved
    File(RemoteFile),
    /// A folder was created, renamed or moved
    Folder(RemoteFolder),
    /// An item was deleted; only its Id is known
    Deleted {
        /// Stable Id of the deleted item
        id: String,
    },
}

/// All pages of one delta round, merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRound {
    /// Changes in feed order
    pub changes: Vec<DeltaChange>,
    /// Terminal cursor to resume from next time
    pub cursor: String,
}

/// One full incremental round, ready for reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    /// Upserted files, in feed order
    pub files: Vec<RemoteFile>,
    /// Upserted folders, in feed order
    pub folders: Vec<RemoteFolder>,
    /// Ids of deleted files known to the checkpoint
    pub deleted_file_ids: Vec<String>,
    /// Ids of deleted folders known to the checkpoint
    pub deleted_folder_ids: Vec<String>,
}

impl UpdateBatch {
    /// Groups a round's changes, classifying tombstones against `checkpoint`
    ///
    /// Tombstones whose Id is neither a known file nor a known folder are
    /// dropped.
    pub fn from_changes(changes: Vec<DeltaChange>, checkpoint: &SyncCheckpoint) -> Self {
        let mut batch = UpdateBatch::default();
        for change in changes {
            match change {
                DeltaChange::File(file) => batch.files.push(file),
                DeltaChange::Folder(folder) => batch.folders.push(folder),
                DeltaChange::Deleted { id } => {
                    if checkpoint.file_by_id(&id).is_some() {
                        batch.deleted_file_ids.push(id.clone());
                    }
                    if checkpoint.folder_by_id(&id).is_some() {
                        batch.deleted_folder_ids.push(id);
                    }
                }
            }
        }
        batch
    }

    /// Total number of entries in the batch
    pub fn len(&self) -> usize {
        self.files.len()
            + self.folders.len()
            + self.deleted_file_ids.len()
            + self.deleted_folder_ids.len()
    }

    /// Returns true if the round reported nothing actionable
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
