//! SyncCheckpoint domain entity
//!
//! The checkpoint is the persisted memory of a job: what was last seen
//! remotely and where the incremental feed should resume.
//!
//! ## Indexes
//!
//! The primary maps are keyed by *current* relative path, which is also what
//! gets persisted. Delta reconciliation correlates entities by stable Id, so an
//! in-memory Id → path index is kept next to each map and rebuilt on load.
//! Every mutation goes through methods that keep both sides in step.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exclusion::ExclusionFilter;
use super::remote_item::{is_descendant, rebase_path, RemoteFile, RemoteFolder};

/// Reserved name of the checkpoint file inside the local target directory
///
/// Never deleted by reconciliation and skipped by every local tree scan.
pub const CHECKPOINT_FILE_NAME: &str = ".onedrive-backup-metadata.json";

/// Persisted synchronization state of one job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CheckpointRecord", into = "CheckpointRecord")]
pub struct SyncCheckpoint {
    last_backup_time: Option<DateTime<Utc>>,
    total_files_backed_up: u64,
    files: BTreeMap<String, RemoteFile>,
    folders: BTreeMap<String, RemoteFolder>,
    delta_cursor: Option<String>,
    /// File Ids whose last download attempt failed
    pending_downloads: BTreeSet<String>,
    /// Id → path for `files`
    file_ids: HashMap<String, String>,
    /// Id → path for `folders`
    folder_ids: HashMap<String, String>,
}

/// On-disk shape of the checkpoint
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointRecord {
    #[serde(default)]
    last_backup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    total_files_backed_up: u64,
    #[serde(default)]
    files: BTreeMap<String, RemoteFile>,
    #[serde(default)]
    folders: BTreeMap<String, RemoteFolder>,
    #[serde(default)]
    delta_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pending_downloads: BTreeSet<String>,
}

impl From<CheckpointRecord> for SyncCheckpoint {
    fn from(record: CheckpointRecord) -> Self {
        let mut checkpoint = SyncCheckpoint {
            last_backup_time: record.last_backup_time,
            total_files_backed_up: record.total_files_backed_up,
            delta_cursor: record.delta_cursor,
            ..SyncCheckpoint::default()
        };
        // The map key is authoritative for the path.
        for (path, mut file) in record.files {
            file.path = path;
            checkpoint.upsert_file(file);
        }
        for (path, mut folder) in record.folders {
            folder.path = path;
            checkpoint.upsert_folder(folder);
        }
        checkpoint.pending_downloads = record
            .pending_downloads
            .into_iter()
            .filter(|id| checkpoint.file_ids.contains_key(id))
            .collect();
        checkpoint
    }
}

impl From<SyncCheckpoint> for CheckpointRecord {
    fn from(checkpoint: SyncCheckpoint) -> Self {
        CheckpointRecord {
            last_backup_time: checkpoint.last_backup_time,
            total_files_backed_up: checkpoint.total_files_backed_up,
            files: checkpoint.files,
            folders: checkpoint.folders,
            delta_cursor: checkpoint.delta_cursor,
            pending_downloads: checkpoint.pending_downloads,
        }
    }
}

impl SyncCheckpoint {
    /// Creates an empty checkpoint (first run)
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// When the last successful run finished
    pub fn last_backup_time(&self) -> Option<DateTime<Utc>> {
        self.last_backup_time
    }

    /// File count recorded by the last successful run
    pub fn total_files_backed_up(&self) -> u64 {
        self.total_files_backed_up
    }

    /// Resume point of the incremental feed
    pub fn delta_cursor(&self) -> Option<&str> {
        self.delta_cursor.as_deref()
    }

    /// File entries keyed by path
    pub fn files(&self) -> &BTreeMap<String, RemoteFile> {
        &self.files
    }

    /// Folder entries keyed by path
    pub fn folders(&self) -> &BTreeMap<String, RemoteFolder> {
        &self.folders
    }

    /// File entry at `path`
    pub fn file(&self, path: &str) -> Option<&RemoteFile> {
        self.files.get(path)
    }

    /// File entry with the given Id
    pub fn file_by_id(&self, id: &str) -> Option<&RemoteFile> {
        self.file_ids.get(id).and_then(|path| self.files.get(path))
    }

    /// Ids of files still waiting for a successful download
    pub fn pending_downloads(&self) -> &BTreeSet<String> {
        &self.pending_downloads
    }

    /// Folder entry with the given Id
    pub fn folder_by_id(&self, id: &str) -> Option<&RemoteFolder> {
        self.folder_ids.get(id).and_then(|path| self.folders.get(path))
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Inserts or overwrites a file entry under its current path
    ///
    /// If an entry with the same Id exists under another path, that old-path
    /// entry is removed. An unrelated entry occupying the new path is
    /// replaced and dropped from the Id index.
    ///
    /// # Returns
    /// The entry previously recorded for this Id, if any
    pub fn upsert_file(&mut self, file: RemoteFile) -> Option<RemoteFile> {
        let prior = self
            .file_ids
            .get(&file.id)
            .and_then(|path| self.files.get(path))
            .cloned();

        if let Some(prior) = &prior {
            if prior.path != file.path {
                self.files.remove(&prior.path);
            }
        }
        if let Some(occupant) = self.files.get(&file.path) {
            if occupant.id != file.id {
                self.file_ids.remove(&occupant.id);
                self.pending_downloads.remove(&occupant.id);
            }
        }

        self.file_ids.insert(file.id.clone(), file.path.clone());
        self.files.insert(file.path.clone(), file);
        prior
    }

    /// Inserts or overwrites a folder entry; same rules as [`upsert_file`](Self::upsert_file)
    pub fn upsert_folder(&mut self, folder: RemoteFolder) -> Option<RemoteFolder> {
        let prior = self
            .folder_ids
            .get(&folder.id)
            .and_then(|path| self.folders.get(path))
            .cloned();

        if let Some(prior) = &prior {
            if prior.path != folder.path {
                self.folders.remove(&prior.path);
            }
        }
        if let Some(occupant) = self.folders.get(&folder.path) {
            if occupant.id != folder.id {
                self.folder_ids.remove(&occupant.id);
            }
        }

        self.folder_ids.insert(folder.id.clone(), folder.path.clone());
        self.folders.insert(folder.path.clone(), folder);
        prior
    }

    /// Removes the file entry with the given Id
    pub fn remove_file_by_id(&mut self, id: &str) -> Option<RemoteFile> {
        let path = self.file_ids.remove(id)?;
        self.pending_downloads.remove(id);
        self.files.remove(&path)
    }

    /// Removes the folder entry with the given Id
    pub fn remove_folder_by_id(&mut self, id: &str) -> Option<RemoteFolder> {
        let path = self.folder_ids.remove(id)?;
        self.folders.remove(&path)
    }

    /// Records that the content of a known file still has to be fetched
    ///
    /// Unknown Ids are ignored.
    pub fn mark_download_pending(&mut self, id: &str) {
        if self.file_ids.contains_key(id) {
            self.pending_downloads.insert(id.to_string());
        }
    }

    /// Clears the pending mark after a successful download
    pub fn clear_download_pending(&mut self, id: &str) -> bool {
        self.pending_downloads.remove(id)
    }

    /// Drops every file entry for which `keep` returns false
    ///
    /// # Returns
    /// The removed entries
    pub fn retain_files<F>(&mut self, mut keep: F) -> Vec<RemoteFile>
    where
        F: FnMut(&RemoteFile) -> bool,
    {
        let doomed: Vec<String> = self
            .files
            .values()
            .filter(|f| !keep(f))
            .map(|f| f.path.clone())
            .collect();

        doomed
            .into_iter()
            .filter_map(|path| {
                let file = self.files.remove(&path)?;
                self.file_ids.remove(&file.id);
                self.pending_downloads.remove(&file.id);
                Some(file)
            })
            .collect()
    }

    /// Replaces the whole folder map
    pub fn replace_folders(&mut self, folders: impl IntoIterator<Item = RemoteFolder>) {
        self.folders.clear();
        self.folder_ids.clear();
        for folder in folders {
            self.upsert_folder(folder);
        }
    }

    /// Re-keys every entry strictly below `old_prefix` to live below `new_prefix`
    ///
    /// The Excluded flag of each moved entry is recomputed for its new path.
    ///
    /// # Returns
    /// Number of entries re-keyed
    pub fn rebase_descendants(
        &mut self,
        old_prefix: &str,
        new_prefix: &str,
        filter: &ExclusionFilter,
    ) -> usize {
        let files: Vec<RemoteFile> = self
            .files
            .values()
            .filter(|f| is_descendant(&f.path, old_prefix))
            .cloned()
            .collect();
        let folders: Vec<RemoteFolder> = self
            .folders
            .values()
            .filter(|f| is_descendant(&f.path, old_prefix))
            .cloned()
            .collect();
        let count = files.len() + folders.len();

        for mut file in files {
            if let Some(path) = rebase_path(&file.path, old_prefix, new_prefix) {
                file.excluded = filter.is_excluded(&path);
                file.path = path;
                self.upsert_file(file);
            }
        }
        for mut folder in folders {
            if let Some(path) = rebase_path(&folder.path, old_prefix, new_prefix) {
                folder.excluded = filter.is_excluded(&path);
                folder.path = path;
                self.upsert_folder(folder);
            }
        }
        count
    }

    /// Removes every entry strictly below `prefix`
    ///
    /// # Returns
    /// Number of entries removed
    pub fn remove_descendants(&mut self, prefix: &str) -> usize {
        let removed_files = self.retain_files(|f| !is_descendant(&f.path, prefix)).len();

        let doomed: Vec<String> = self
            .folders
            .keys()
            .filter(|path| is_descendant(path, prefix))
            .cloned()
            .collect();
        for path in &doomed {
            if let Some(folder) = self.folders.remove(path) {
                self.folder_ids.remove(&folder.id);
            }
        }
        removed_files + doomed.len()
    }

    /// Advances the incremental feed resume point
    pub fn set_delta_cursor(&mut self, cursor: impl Into<String>) {
        self.delta_cursor = Some(cursor.into());
    }

    /// Stamps a successful run
    pub fn record_backup(&mut self, at: DateTime<Utc>) {
        self.last_backup_time = Some(at);
        self.total_files_backed_up = self.files.len() as u64;
    }
}
