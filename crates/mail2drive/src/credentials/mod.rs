//! Per-user access credentials for the mailbox and storage APIs.

pub mod cache;
pub mod oauth;
pub mod stored;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub use cache::CachedCredentialResolver;
pub use oauth::{GoogleTokenClient, RefreshError, RefreshedToken, TokenRefresher};
pub use stored::{store_connection, ConnectionInput, StoredCredentialResolver};

/// A bearer token usable against the provider APIs.
pub struct Credential {
    access_token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: SecretString, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True if the token is still valid `margin` from now. Tokens without
    /// a known expiry are assumed valid.
    pub fn is_valid_for(&self, margin: chrono::Duration) -> bool {
        self.expires_at.is_none_or(|at| at > Utc::now() + margin)
    }
}

// SecretString is not Clone; copy through the exposed value.
impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            access_token: SecretString::from(self.access_token.expose_secret().to_string()),
            expires_at: self.expires_at,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    /// No usable connection is stored for the user.
    #[error("Google account is not connected")]
    NotConnected,

    /// The connection exists but a fresh access token could not be obtained.
    #[error("Token refresh failed: {0}. Reconnect Google.")]
    RefreshFailed(String),

    /// The credential store itself failed.
    #[error("Credential store error: {0}")]
    Store(String),
}

impl CredentialError {
    pub fn code(&self) -> &'static str {
        match self {
            CredentialError::NotConnected => "not_connected",
            CredentialError::RefreshFailed(_) => "refresh_failed",
            CredentialError::Store(_) => "credential_store_error",
        }
    }
}

impl From<crate::db::DatabaseError> for CredentialError {
    fn from(err: crate::db::DatabaseError) -> Self {
        CredentialError::Store(err.to_string())
    }
}

/// Resolves a usable credential for a user.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<Credential, CredentialError>;

    /// Forgets anything remembered about `user_id`. Called after the stored
    /// connection changes.
    async fn invalidate(&self, _user_id: &str) {}
}
