//! Full enumeration of the remote tree
//!
//! Walks the drive depth-first from the configured root, one `children`
//! collection per folder, following `@odata.nextLink` until each collection
//! is exhausted. Exclusion is applied while walking: an excluded folder is
//! neither reported nor descended into, an excluded file is omitted.
//!
//! Any failure aborts the whole listing; callers never see a partial
//! snapshot.

use tracing::{debug, info};

use odbackup_core::domain::remote_item::{join_path, normalize_root};
use odbackup_core::domain::{ExclusionFilter, RemoteSnapshot};

use crate::client::GraphClient;
use crate::item::{GraphDriveItem, GraphItemPage};
use crate::GraphError;

/// Page size requested for children collections
const PAGE_SIZE_QUERY: &str = "$top=999";

/// Resolves the item addressed by a configured root
///
/// `""` addresses the drive root (`/me/drive/root`), anything else the item
/// at that path (`/me/drive/root:/a/b`).
pub async fn get_root_item(client: &GraphClient, root: &str) -> Result<GraphDriveItem, GraphError> {
    let url = if root.is_empty() {
        client.url_for("/me/drive/root")
    } else {
        client.encoded_url(&format!("/me/drive/root:{root}"), None)?
    };
    client.get_json(&url).await
}

/// Lists every page of one folder's children
pub async fn list_children(
    client: &GraphClient,
    folder_id: &str,
) -> Result<Vec<GraphDriveItem>, GraphError> {
    let mut url = client.encoded_url(
        &format!("/me/drive/items/{folder_id}/children"),
        Some(PAGE_SIZE_QUERY),
    )?;
    let mut items = Vec::new();
    let mut pages: u32 = 0;

    loop {
        let page: GraphItemPage = client.get_json(&url).await?;
        pages += 1;
        items.extend(page.value);

        match page.next_link {
            Some(next) => url = next,
            None => break,
        }
    }

    debug!(folder_id, pages, items = items.len(), "Listed folder children");
    Ok(items)
}

/// Enumerates the whole tree under `root`
///
/// # Arguments
/// * `client` - Authenticated Graph client
/// * `root` - Configured remote root (`""`, `/`, or `/a/b`)
/// * `filter` - Exclusion patterns applied during the walk
///
/// # Returns
/// All non-excluded files and folders. The root folder itself is part of the
/// folder set unless it is the drive root.
///
/// # Errors
/// The first transport or decoding failure.
pub async fn list_tree(
    client: &GraphClient,
    root: &str,
    filter: &ExclusionFilter,
) -> Result<RemoteSnapshot, GraphError> {
    let root = normalize_root(root);
    let root_item = get_root_item(client, &root).await?;

    let mut snapshot = RemoteSnapshot::default();
    if !root.is_empty() {
        if filter.is_excluded(&root) {
            info!(root = %root, "Remote root is excluded, nothing to list");
            return Ok(snapshot);
        }
        snapshot.folders.push(root_item.to_remote_folder(root.clone()));
    }

    let mut stack = vec![(root_item.id, root)];
    while let Some((folder_id, folder_path)) = stack.pop() {
        for item in list_children(client, &folder_id).await? {
            let path = join_path(&folder_path, &item.name);
            if filter.is_excluded(&path) {
                debug!(path = %path, "Skipping excluded item");
                continue;
            }

            if item.is_folder() {
                snapshot.folders.push(item.to_remote_folder(path.clone()));
                stack.push((item.id, path));
            } else {
                snapshot.files.push(item.to_remote_file(path));
            }
        }
    }

    info!(
        files = snapshot.files.len(),
        folders = snapshot.folders.len(),
        "Remote listing complete"
    );
    Ok(snapshot)
}
