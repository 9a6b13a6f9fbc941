//! odbackup Graph - Microsoft Graph API adapter
//!
//! Provides async access to a OneDrive drive for the backup engine:
//! - OAuth2 refresh-token exchange
//! - Recursive children listing
//! - Delta queries for incremental runs
//! - Streamed content download
//!
//! ## Modules
//!
//! - [`auth`] - Refresh-token grant against the Microsoft account endpoint
//! - [`client`] - Authenticated HTTP client with 429 handling
//! - [`listing`] - Depth-first children enumeration
//! - [`delta`] - Delta feed pagination and item classification
//! - [`download`] - Content streaming into a local file
//! - [`provider`] - [`IRemoteDrive`](odbackup_core::ports::IRemoteDrive) implementation

pub mod auth;
pub mod client;
pub mod delta;
pub mod download;
pub mod item;
pub mod listing;
pub mod provider;

use std::time::Duration;

use odbackup_core::domain::errors::BackupError;
use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Longest response body excerpt kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Errors that can occur when communicating with the Microsoft Graph API
#[derive(Debug, Error)]
pub enum GraphError {
    /// The bearer token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The delta cursor has expired (410 Gone)
    #[error("Gone: {0}")]
    Gone(String),

    /// Rate limit still exceeded after the configured retries
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked us to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Writing downloaded content failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Classifies a non-success response, consuming its body for the message
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        let message = if excerpt.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {excerpt}")
        };

        match status {
            StatusCode::UNAUTHORIZED => GraphError::Unauthorized(message),
            StatusCode::FORBIDDEN => GraphError::Forbidden(message),
            StatusCode::NOT_FOUND => GraphError::NotFound(message),
            StatusCode::GONE => GraphError::Gone(message),
            s if s.is_server_error() => GraphError::ServerError(message),
            s => GraphError::UnexpectedStatus {
                status: s.as_u16(),
                message,
            },
        }
    }
}

impl From<GraphError> for BackupError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Gone(_) => BackupError::CursorExpired,
            other => BackupError::Transport(other.to_string()),
        }
    }
}
