//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for the Microsoft Graph API. Handles the
//! bearer header, URL construction, status classification and 429 back-off.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use odbackup_graph::client::GraphClient;
//! use odbackup_graph::item::GraphDriveItem;
//!
//! # async fn example() -> Result<(), odbackup_graph::GraphError> {
//! let client = GraphClient::new("access-token-here");
//! let root: GraphDriveItem = client.get_json(&client.url_for("/me/drive/root")).await?;
//! println!("root id {}", root.id);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::GraphError;

/// Base URL for Microsoft Graph API v1.0
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default retry-after duration when header is missing (30 seconds)
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Longest wait accepted from a Retry-After HTTP date
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Number of retries for 429 responses
const DEFAULT_MAX_RETRIES: u32 = 3;

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with the bearer token of one run and the base URL.
/// Cloning a `reqwest::Client` is cheap, so one is shared by every job and a
/// `GraphClient` is built per run.
#[derive(Debug, Clone)]
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// OAuth2 access token for this run
    access_token: String,
    /// Retries allowed after a 429 response
    max_retries: u32,
}

impl GraphClient {
    /// Creates a new GraphClient with the given access token
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token for Microsoft Graph
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GRAPH_BASE_URL)
    }

    /// Creates a new GraphClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `base_url` - Custom base URL for API requests
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), base_url, access_token)
    }

    /// Creates a GraphClient that reuses an existing `reqwest::Client`
    pub fn with_http_client(
        client: Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the number of 429 retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a fixed API path (may carry a query string)
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Absolute URL for a path that embeds user-controlled names
    ///
    /// Characters that are not valid in a URL path (spaces, `#`, `?`, ...) are
    /// percent-encoded; `query` is appended untouched.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidResponse`] if the base URL cannot be parsed.
    pub fn encoded_url(&self, path: &str, query: Option<&str>) -> Result<String, GraphError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GraphError::InvalidResponse(format!("invalid base URL: {e}")))?;
        let full_path = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&full_path);
        url.set_query(query);
        Ok(url.into())
    }

    /// GET builder for an absolute URL carrying the bearer header
    fn authorized_get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.access_token)
    }

    // ========================================================================
    // GET with 429 handling
    // ========================================================================

    /// Sends an authenticated GET to an absolute URL
    ///
    /// Absolute URLs are needed for `@odata.nextLink` / `@odata.deltaLink`
    /// values, which already contain the host. On HTTP 429 the
    /// `Retry-After` header is honoured up to `max_retries` times.
    ///
    /// # Returns
    /// The response, guaranteed to have a success status
    ///
    /// # Errors
    /// Returns a classified [`GraphError`] for any non-success status or
    /// network failure.
    pub async fn get(&self, url: &str) -> Result<Response, GraphError> {
        for attempt in 0..=self.max_retries {
            let response = self.authorized_get(url).send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER);

                if attempt >= self.max_retries {
                    warn!(url, attempts = attempt + 1, "429 retry limit exhausted");
                    return Err(GraphError::TooManyRequests { retry_after });
                }

                info!(
                    url,
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if !response.status().is_success() {
                return Err(GraphError::from_response(response).await);
            }

            if attempt > 0 {
                debug!(url, attempt, "Request succeeded after retry");
            }
            return Ok(response);
        }

        Err(GraphError::InvalidResponse(format!(
            "retry loop exited unexpectedly for {url}"
        )))
    }

    /// Sends a GET and decodes the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GraphError> {
        let response = self.get(url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GraphError::InvalidResponse(format!("failed to decode {url}: {e}")))
    }
}

// ============================================================================
// Retry-After parsing
// ============================================================================

/// Parses a `Retry-After` header value
///
/// Accepts either a number of seconds or an HTTP date. Dates more than an
/// hour ahead, dates in the past, and unparseable values yield `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if let Ok(wait) = (target - now).to_std() {
            if wait <= MAX_RETRY_AFTER {
                return wait;
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
