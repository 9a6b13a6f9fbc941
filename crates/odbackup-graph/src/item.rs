//! Microsoft Graph driveItem wire types
//!
//! Shared by the children listing and the delta feed, which both return
//! pages of `driveItem` resources.
//!
//! See: <https://learn.microsoft.com/en-us/graph/api/resources/driveitem>

use chrono::{DateTime, Utc};
use serde::Deserialize;

use odbackup_core::domain::{RemoteFile, RemoteFolder};

/// Prefix Graph puts in front of `parentReference.path`
const DRIVE_ROOT_PREFIX: &str = "/drive/root:";

/// One page of a collection response (`children` or `delta`)
#[derive(Debug, Deserialize)]
pub struct GraphItemPage {
    /// Items on this page
    #[serde(default)]
    pub value: Vec<GraphDriveItem>,

    /// URL for the next page of results (present when more pages exist)
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,

    /// Terminal delta cursor (present only on the last page of a delta round)
    #[serde(rename = "@odata.deltaLink")]
    pub delta_link: Option<String>,
}

/// A drive item as returned by Microsoft Graph
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDriveItem {
    /// Unique identifier of the item within the drive
    pub id: String,

    /// Name of the item (filename or folder name)
    #[serde(default)]
    pub name: String,

    /// Size of the item in bytes
    pub size: Option<u64>,

    /// Last modified date and time
    pub last_modified_date_time: Option<DateTime<Utc>>,

    /// Identity/metadata version
    pub e_tag: Option<String>,

    /// Content version
    pub c_tag: Option<String>,

    /// Reference to the parent item
    pub parent_reference: Option<GraphParentReference>,

    /// File facet (present if the item is a file)
    pub file: Option<serde_json::Value>,

    /// Folder facet (present if the item is a folder)
    pub folder: Option<serde_json::Value>,

    /// Deleted facet (present if the item has been deleted)
    pub deleted: Option<serde_json::Value>,
}

/// Parent reference information for a drive item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphParentReference {
    /// Unique identifier of the parent item
    pub id: Option<String>,

    /// Path of the parent in the drive, e.g. `/drive/root:/Documents`
    pub path: Option<String>,
}

impl GraphDriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    /// Relative path derived from `parentReference.path` and `name`
    ///
    /// Returns `None` for items without a parent path (the drive root).
    pub fn relative_path(&self) -> Option<String> {
        let parent = self.parent_reference.as_ref()?.path.as_deref()?;
        Some(normalize_parent_path(parent, &self.name))
    }

    /// Converts into a [`RemoteFile`] at `path`
    ///
    /// Missing version stamps become empty strings, which never match a
    /// recorded stamp.
    pub fn to_remote_file(&self, path: String) -> RemoteFile {
        RemoteFile {
            id: self.id.clone(),
            path,
            size: self.size.unwrap_or(0),
            last_modified: self.last_modified_date_time.unwrap_or_default(),
            e_tag: self.e_tag.clone().unwrap_or_default(),
            c_tag: self.c_tag.clone().unwrap_or_default(),
            excluded: false,
        }
    }

    /// Converts into a [`RemoteFolder`] at `path`
    pub fn to_remote_folder(&self, path: String) -> RemoteFolder {
        RemoteFolder::new(self.id.clone(), path)
    }
}

/// Strips the `/drive/root:` prefix and appends the item name
///
/// Graph returns parent paths like `/drive/root:/Documents/Sub`, or
/// `/drive/root:` for children of the root.
pub fn normalize_parent_path(parent_path: &str, name: &str) -> String {
    let stripped = parent_path
        .strip_prefix(DRIVE_ROOT_PREFIX)
        .unwrap_or(parent_path)
        .trim_end_matches('/');

    if stripped.is_empty() {
        format!("/{name}")
    } else if stripped.starts_with('/') {
        format!("{stripped}/{name}")
    } else {
        format!("/{stripped}/{name}")
    }
}
