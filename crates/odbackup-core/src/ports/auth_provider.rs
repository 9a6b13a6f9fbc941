//! Authentication provider port
//!
//! Only the refresh step is modelled here. Obtaining the initial refresh
//! token is an interactive flow that happens outside this tool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::BackupError;

// ============================================================================
// Tokens struct
// ============================================================================

/// OAuth tokens received from the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Refresh token returned with the access token, if the provider rotated it
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Credentials of one configured account
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    /// Empty for public clients
    pub client_secret: String,
    pub refresh_token: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// IAuthProvider trait
// ============================================================================

/// Exchanges a refresh credential for a bearer token
#[async_trait::async_trait]
pub trait IAuthProvider: Send + Sync {
    /// Refreshes the access token for an account
    ///
    /// # Errors
    /// Returns [`BackupError::Auth`] when the identity provider rejects the
    /// request or cannot be reached.
    async fn refresh(&self, credentials: &ClientCredentials) -> Result<Tokens, BackupError>;
}
