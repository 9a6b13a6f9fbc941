//! Streamed content download
//!
//! Content is written to a sibling `*.partial` file and renamed over the
//! target only once the body has been fully received, so an interrupted
//! transfer never leaves a truncated file at the mirror path.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use odbackup_core::ports::PARTIAL_DOWNLOAD_SUFFIX;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::client::GraphClient;
use crate::GraphError;

/// Content endpoint for a drive item
pub fn content_path(item_id: &str) -> String {
    format!("/me/drive/items/{item_id}/content")
}

/// Downloads an item's content to `target`
///
/// Parent directories are created as needed. Graph answers the content
/// request with a redirect to a pre-authenticated URL, which `reqwest`
/// follows.
///
/// # Returns
/// Number of bytes written
///
/// # Errors
/// - a classified HTTP error for a non-success response (nothing is written)
/// - [`GraphError::NetworkError`] if the body stream breaks
/// - [`GraphError::Io`] if the local write or rename fails
#[instrument(skip(client), fields(target = %target.display()))]
pub async fn download_to_path(
    client: &GraphClient,
    item_id: &str,
    target: &Path,
) -> Result<u64, GraphError> {
    let url = client.encoded_url(&content_path(item_id), None)?;
    let response = client.get(&url).await?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let partial = partial_path(target);
    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok::<u64, GraphError>(written)
    }
    .await;

    let written = match written {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&partial, target).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }

    debug!(bytes = written, "Download complete");
    Ok(written)
}

/// Temporary path next to `target`: `a.txt` → `a.txt.partial`
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(PARTIAL_DOWNLOAD_SUFFIX);
    PathBuf::from(name)
}
