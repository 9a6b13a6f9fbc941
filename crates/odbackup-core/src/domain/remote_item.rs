//! Remote entities as last observed
//!
//! Relative paths are `/`-separated and rooted at the drive root, e.g.
//! `/Documents/report.pdf`. The same path is used as the checkpoint key and,
//! below the local target directory, as the mirror location.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::BackupError;

/// A remote file as last observed
///
/// Serialized field names match the persisted checkpoint record
/// (`fileName` holds the relative path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Stable remote identifier, survives renames and moves
    pub id: String,
    /// Current relative path
    #[serde(rename = "fileName")]
    pub path: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Last modification time reported by the remote
    #[serde(default)]
    pub last_modified: DateTime<Utc>,
    /// Identity/metadata version stamp
    #[serde(default)]
    pub e_tag: String,
    /// Content version stamp
    #[serde(default)]
    pub c_tag: String,
    /// Derived from the exclusion patterns at observation time
    #[serde(default)]
    pub excluded: bool,
}

impl RemoteFile {
    /// Creates a file entry with empty version stamps
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            size: 0,
            last_modified: DateTime::<Utc>::default(),
            e_tag: String::new(),
            c_tag: String::new(),
            excluded: false,
        }
    }

    /// Sets both version stamps
    pub fn with_tags(mut self, e_tag: impl Into<String>, c_tag: impl Into<String>) -> Self {
        self.e_tag = e_tag.into();
        self.c_tag = c_tag.into();
        self
    }

    /// Sets the size in bytes
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// A remote folder as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFolder {
    /// Stable remote identifier
    pub id: String,
    /// Current relative path
    pub path: String,
    /// Derived from the exclusion patterns at observation time
    #[serde(default)]
    pub excluded: bool,
}

impl RemoteFolder {
    /// Creates a non-excluded folder entry
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            excluded: false,
        }
    }
}

/// Result of a full remote enumeration
///
/// Holds only non-excluded entities: excluded files are omitted and excluded
/// folders are neither listed nor descended into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    /// Every visible file
    pub files: Vec<RemoteFile>,
    /// Every visible folder, including the configured root when it is not the drive root
    pub folders: Vec<RemoteFolder>,
}

impl RemoteSnapshot {
    /// Set of file paths in the snapshot
    pub fn file_paths(&self) -> HashSet<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }

    /// Set of folder paths in the snapshot
    pub fn folder_paths(&self) -> HashSet<&str> {
        self.folders.iter().map(|f| f.path.as_str()).collect()
    }
}

// ============================================================================
// Path helpers
// ============================================================================

/// Normalizes a configured remote root to `""` (drive root) or `/a/b`
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Joins a parent relative path and a child name
///
/// ```
/// use odbackup_core::domain::remote_item::join_path;
/// assert_eq!(join_path("", "a.txt"), "/a.txt");
/// assert_eq!(join_path("/Docs/", "a.txt"), "/Docs/a.txt");
/// ```
pub fn join_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

/// Returns true if `path` lies strictly below `ancestor`
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Re-roots `path` from `old_prefix` to `new_prefix`
///
/// Returns `None` when `path` is neither `old_prefix` nor below it.
pub fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        Some(new_prefix.to_string())
    } else if is_descendant(path, old_prefix) {
        Some(format!(
            "{}{}",
            new_prefix.trim_end_matches('/'),
            &path[old_prefix.trim_end_matches('/').len()..]
        ))
    } else {
        None
    }
}

/// Checks that a relative path can be placed under the local target safely
///
/// # Errors
/// Returns [`BackupError::InvalidPath`] when the path is not rooted or
/// contains empty, `.` or `..` components.
pub fn validate_relative_path(path: &str) -> Result<(), BackupError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(BackupError::InvalidPath(format!("{path} is not rooted")));
    };
    if rest.is_empty() {
        return Err(BackupError::InvalidPath("empty relative path".to_string()));
    }
    if rest
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(BackupError::InvalidPath(format!(
            "{path} contains an empty or relative component"
        )));
    }
    Ok(())
}
