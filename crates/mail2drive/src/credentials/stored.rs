//! Credentials backed by the `google_connections` table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::oauth::{RefreshError, TokenRefresher};
use super::{Credential, CredentialError, CredentialResolver};
use crate::db::connection_repo::{self, GoogleConnectionRow, STATUS_CONNECTED, STATUS_NEEDS_RECONNECT};
use crate::db::{format_timestamp, now_timestamp, Database};
use crate::error::{Mail2DriveError, Result};
use crate::secrets::TokenEncryptor;

/// Access tokens expiring within this window are refreshed first.
const REFRESH_MARGIN_SECS: u64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Resolves credentials from stored, encrypted OAuth tokens and refreshes
/// them when they are about to expire.
pub struct StoredCredentialResolver<R> {
    db: Database,
    encryptor: Arc<TokenEncryptor>,
    refresher: R,
}

impl<R: TokenRefresher> StoredCredentialResolver<R> {
    pub fn new(db: Database, encryptor: Arc<TokenEncryptor>, refresher: R) -> Self {
        Self {
            db,
            encryptor,
            refresher,
        }
    }

    fn decrypt(&self, value: &str) -> std::result::Result<SecretString, CredentialError> {
        self.encryptor
            .decrypt_secret(value)
            .map_err(|e| CredentialError::Store(e.to_string()))
    }

    fn cached_access(&self, row: &GoogleConnectionRow) -> std::result::Result<Option<Credential>, CredentialError> {
        if row.is_expired(REFRESH_MARGIN_SECS) {
            return Ok(None);
        }
        let (Some(access), Some(expiry)) = (row.access_token_enc.as_deref(), row.token_expiry_at.as_deref()) else {
            return Ok(None);
        };
        let expires_at = DateTime::parse_from_rfc3339(expiry)
            .map(|t| t.with_timezone(&Utc))
            .ok();
        Ok(Some(Credential::new(self.decrypt(access)?, expires_at)))
    }
}

#[async_trait]
impl<R: TokenRefresher> CredentialResolver for StoredCredentialResolver<R> {
    async fn resolve(&self, user_id: &str) -> std::result::Result<Credential, CredentialError> {
        let row = connection_repo::find(&self.db, user_id)?.ok_or(CredentialError::NotConnected)?;
        match row.status.as_str() {
            STATUS_CONNECTED => {}
            STATUS_NEEDS_RECONNECT => {
                return Err(CredentialError::RefreshFailed("reconnect required".to_string()));
            }
            _ => return Err(CredentialError::NotConnected),
        }

        if let Some(credential) = self.cached_access(&row)? {
            return Ok(credential);
        }

        let refresh_enc = row
            .refresh_token_enc
            .as_deref()
            .ok_or_else(|| CredentialError::RefreshFailed("refresh token missing".to_string()))?;
        let refresh_token = self.decrypt(refresh_enc)?;

        let refreshed = match self.refresher.refresh(&refresh_token).await {
            Ok(token) => token,
            Err(RefreshError::InvalidGrant(reason)) => {
                tracing::warn!("Refresh token rejected; connection needs reconnect");
                connection_repo::set_status(&self.db, user_id, STATUS_NEEDS_RECONNECT, &now_timestamp())?;
                return Err(CredentialError::RefreshFailed(reason));
            }
            Err(e) => return Err(CredentialError::RefreshFailed(e.to_string())),
        };

        let lifetime = refreshed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime.min(i64::MAX as u64) as i64);
        let access_enc = self
            .encryptor
            .encrypt(refreshed.access_token.expose_secret())
            .map_err(|e| CredentialError::Store(e.to_string()))?;
        connection_repo::update_access_token(
            &self.db,
            user_id,
            &access_enc,
            &format_timestamp(expires_at),
            &now_timestamp(),
        )?;

        Ok(Credential::new(refreshed.access_token, Some(expires_at)))
    }
}

/// Tokens handed over after the OAuth consent flow.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionInput {
    #[serde(default)]
    pub provider_token: Option<String>,
    #[serde(default)]
    pub provider_refresh_token: Option<String>,
    /// Access token expiry as Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scopes: Option<String>,
}

/// Stores (or replaces) the user's Google connection. A refresh token is
/// required; tokens are encrypted before they are written.
pub fn store_connection(
    db: &Database,
    encryptor: &TokenEncryptor,
    user_id: &str,
    input: ConnectionInput,
) -> Result<()> {
    let refresh = input
        .provider_refresh_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Mail2DriveError::InvalidInput("provider_refresh_token is empty".to_string()))?;

    let access_token_enc = input
        .provider_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| encryptor.encrypt(t))
        .transpose()?;
    let token_expiry_at = input
        .expires_at
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(format_timestamp);

    let now = now_timestamp();
    let row = GoogleConnectionRow {
        user_id: user_id.to_string(),
        status: STATUS_CONNECTED.to_string(),
        access_token_enc,
        refresh_token_enc: Some(encryptor.encrypt(refresh)?),
        token_expiry_at,
        scopes: input.scopes,
        last_verified_at: Some(now.clone()),
        created_at: now.clone(),
        updated_at: now,
    };
    connection_repo::upsert(db, &row)?;
    log::info!("Stored Google connection");
    Ok(())
}
