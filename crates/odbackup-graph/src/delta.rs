//! Microsoft Graph Delta API for incremental runs
//!
//! Implements the delta query pattern for OneDrive, which returns only the
//! items that changed since a stored cursor.
//!
//! ## Delta Query Flow
//!
//! 1. **Bootstrap**: call [`get_delta`] with `cursor = None`; the feed starts
//!    from the configured root and reports every item as a change
//! 2. **Follow pages**: `@odata.nextLink` pages are followed automatically
//! 3. **Terminal cursor**: the last page carries `@odata.deltaLink`, which is
//!    returned verbatim as [`DeltaRound::cursor`]
//! 4. **Resume**: pass the stored cursor back to get only later changes
//!
//! A cursor the service no longer accepts yields HTTP 410 Gone, surfaced as
//! [`GraphError::Gone`].

use tracing::{debug, warn};

use odbackup_core::domain::{DeltaChange, DeltaRound};

use crate::client::GraphClient;
use crate::item::{GraphDriveItem, GraphItemPage};
use crate::GraphError;

/// Delta endpoint path for a normalized root (`""` or `/a/b`)
pub fn delta_path(root: &str) -> String {
    if root.is_empty() {
        "/me/drive/root/delta".to_string()
    } else {
        format!("/me/drive/root:{root}:/delta")
    }
}

// ============================================================================
// DeltaParser - converts Graph items to change feed entries
// ============================================================================

/// Classifies Graph delta items into [`DeltaChange`]s
pub struct DeltaParser;

impl DeltaParser {
    /// Classifies one item
    ///
    /// - a `deleted` facet makes a tombstone carrying only the Id
    /// - a `folder` facet makes a folder upsert
    /// - anything else is a file upsert
    ///
    /// Returns `None` for a live item without a parent path, which is how
    /// the drive root shows up in the feed.
    pub fn parse_item(item: GraphDriveItem) -> Option<DeltaChange> {
        if item.is_deleted() {
            return Some(DeltaChange::Deleted { id: item.id });
        }

        let path = item.relative_path()?;
        if item.is_folder() {
            Some(DeltaChange::Folder(item.to_remote_folder(path)))
        } else {
            Some(DeltaChange::File(item.to_remote_file(path)))
        }
    }

    /// Classifies every item of a page, in order
    pub fn parse_page(items: Vec<GraphDriveItem>) -> Vec<DeltaChange> {
        items.into_iter().filter_map(Self::parse_item).collect()
    }
}

// ============================================================================
// Delta query
// ============================================================================

/// Fetches one complete delta round, following pagination
///
/// # Arguments
/// * `client` - Authenticated Graph client
/// * `root` - Normalized remote root, used only when bootstrapping
/// * `cursor` - Stored `@odata.deltaLink`, or `None` to bootstrap
///
/// # Returns
/// Every change of every page plus the terminal cursor.
///
/// # Errors
/// - [`GraphError::Gone`] if the cursor has expired
/// - [`GraphError::InvalidResponse`] if the last page has no `@odata.deltaLink`
/// - any transport or decoding failure
pub async fn get_delta(
    client: &GraphClient,
    root: &str,
    cursor: Option<&str>,
) -> Result<DeltaRound, GraphError> {
    let mut url = match cursor {
        Some(link) => link.to_string(),
        None => client.encoded_url(&delta_path(root), None)?,
    };

    debug!(resuming = cursor.is_some(), "Starting delta query");

    let mut changes = Vec::new();
    let mut pages: u32 = 0;
    loop {
        let page = get_delta_page(client, &url).await?;
        pages += 1;

        debug!(
            page = pages,
            items = page.value.len(),
            has_next = page.next_link.is_some(),
            "Received delta page"
        );
        changes.extend(DeltaParser::parse_page(page.value));

        if let Some(next) = page.next_link {
            url = next;
            continue;
        }

        return match page.delta_link {
            Some(cursor) => {
                debug!(total_changes = changes.len(), pages, "Delta query complete");
                Ok(DeltaRound { changes, cursor })
            }
            None => {
                warn!(pages, "Delta round ended without a deltaLink");
                Err(GraphError::InvalidResponse(
                    "delta round ended without @odata.deltaLink".to_string(),
                ))
            }
        };
    }
}

/// Fetches a single delta page from an absolute URL
///
/// # Errors
/// Returns an error if the request fails or the body cannot be decoded.
pub async fn get_delta_page(client: &GraphClient, url: &str) -> Result<GraphItemPage, GraphError> {
    client.get_json(url).await
}
