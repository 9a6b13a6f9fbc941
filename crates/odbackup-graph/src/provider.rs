//! [`IRemoteDrive`] implementation backed by Microsoft Graph
//!
//! `GraphDrive` is shared by every job; it owns one `reqwest::Client`
//! (connection pool) and builds a [`GraphClient`] per call from the bearer
//! token the job obtained for its run.

use std::path::Path;

use tracing::warn;

use odbackup_core::config::GraphConfig;
use odbackup_core::domain::{BackupError, DeltaRound, ExclusionFilter, RemoteFile, RemoteSnapshot};
use odbackup_core::ports::IRemoteDrive;

use crate::client::{GraphClient, GRAPH_BASE_URL};
use crate::{delta, download, listing, GraphError};

/// Microsoft Graph adapter for the remote drive port
#[derive(Debug, Clone)]
pub struct GraphDrive {
    http: reqwest::Client,
    base_url: String,
}

impl GraphDrive {
    /// Creates an adapter for the public Graph endpoint
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, GRAPH_BASE_URL)
    }

    /// Creates an adapter against a custom base URL (useful for testing)
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Creates an adapter from the `graph` configuration section
    pub fn from_config(http: reqwest::Client, config: &GraphConfig) -> Self {
        Self::with_base_url(http, config.base_url.clone())
    }

    fn client(&self, access_token: &str) -> GraphClient {
        GraphClient::with_http_client(self.http.clone(), self.base_url.clone(), access_token)
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for GraphDrive {
    async fn list_tree(
        &self,
        access_token: &str,
        root: &str,
        filter: &ExclusionFilter,
    ) -> Result<RemoteSnapshot, BackupError> {
        let client = self.client(access_token);
        Ok(listing::list_tree(&client, root, filter).await?)
    }

    async fn get_delta(
        &self,
        access_token: &str,
        root: &str,
        cursor: Option<&str>,
    ) -> Result<DeltaRound, BackupError> {
        let client = self.client(access_token);
        Ok(delta::get_delta(&client, root, cursor).await?)
    }

    async fn download_file(
        &self,
        access_token: &str,
        file: &RemoteFile,
        target: &Path,
    ) -> Result<u64, BackupError> {
        let client = self.client(access_token);
        download::download_to_path(&client, &file.id, target)
            .await
            .map_err(|e| match e {
                GraphError::Io(io) => {
                    warn!(path = %file.path, error = %io, "Local write failed during download");
                    BackupError::local_io(target.display(), &io)
                }
                other => BackupError::Download {
                    path: file.path.clone(),
                    reason: other.to_string(),
                },
            })
    }
}
