//! Refresh-token authentication for Microsoft accounts
//!
//! Each run exchanges the account's long-lived refresh token for a bearer
//! token using the OAuth2 `refresh_token` grant. Client credentials travel
//! in the request body, together with the `redirect_uri` the refresh token
//! was originally issued for.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use odbackup_core::ports::{ClientCredentials, IAuthProvider};
//! use odbackup_graph::auth::GraphAuth;
//!
//! # async fn example() -> Result<(), odbackup_core::domain::BackupError> {
//! let auth = GraphAuth::new(reqwest::Client::new());
//! let credentials = ClientCredentials {
//!     client_id: "app-id".into(),
//!     client_secret: String::new(),
//!     refresh_token: "M.R3_...".into(),
//! };
//! let tokens = auth.refresh(&credentials).await?;
//! println!("expires at {}", tokens.expires_at);
//! # Ok(())
//! # }
//! ```

use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthType, ClientId, ClientSecret, RefreshToken, RequestTokenError,
    TokenResponse, TokenUrl,
};
use tracing::{debug, info};

use odbackup_core::config::{DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_URL};
use odbackup_core::domain::BackupError;
use odbackup_core::ports::{ClientCredentials, IAuthProvider, Tokens};

/// Lifetime assumed when the token response omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// ============================================================================
// GraphAuth
// ============================================================================

/// [`IAuthProvider`] backed by the Microsoft account token endpoint
#[derive(Debug, Clone)]
pub struct GraphAuth {
    http: reqwest::Client,
    token_url: String,
    redirect_uri: String,
}

impl GraphAuth {
    /// Creates a provider using the default Microsoft account endpoint
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoints(http, DEFAULT_TOKEN_URL, DEFAULT_REDIRECT_URI)
    }

    /// Creates a provider against a custom token endpoint (useful for testing)
    pub fn with_endpoints(
        http: reqwest::Client,
        token_url: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait::async_trait]
impl IAuthProvider for GraphAuth {
    async fn refresh(&self, credentials: &ClientCredentials) -> Result<Tokens, BackupError> {
        debug!(client_id = %credentials.client_id, "Refreshing access token");

        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| BackupError::Config(format!("invalid token URL: {e}")))?;

        let mut client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_token_uri(token_url)
            .set_auth_type(AuthType::RequestBody);
        if !credentials.client_secret.is_empty() {
            client = client.set_client_secret(ClientSecret::new(credentials.client_secret.clone()));
        }

        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(credentials.refresh_token.clone()))
            .add_extra_param("redirect_uri", self.redirect_uri.clone())
            .request_async(&self.http)
            .await
            .map_err(|e| {
                let reason = match e {
                    RequestTokenError::ServerResponse(resp) => resp.to_string(),
                    other => other.to_string(),
                };
                BackupError::Auth(reason)
            })?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        let rotated = token_result
            .refresh_token()
            .map(|t| t.secret().to_string())
            .filter(|t| *t != credentials.refresh_token);
        if rotated.is_some() {
            info!(
                client_id = %credentials.client_id,
                "Identity provider issued a new refresh token; the configured one keeps working until it expires"
            );
        }

        Ok(Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: rotated,
            expires_at,
        })
    }
}
