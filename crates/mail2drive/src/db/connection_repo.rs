//! Google connection repository: the `google_connections` table.
//!
//! Tokens are stored encrypted; this module never sees plaintext.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// Status value for a usable connection.
pub const STATUS_CONNECTED: &str = "connected";
/// Status value after the provider rejected the refresh token.
pub const STATUS_NEEDS_RECONNECT: &str = "needs_reconnect";

/// A raw connection row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleConnectionRow {
    pub user_id: String,
    pub status: String,
    pub access_token_enc: Option<String>,
    pub refresh_token_enc: Option<String>,
    pub token_expiry_at: Option<String>,
    pub scopes: Option<String>,
    pub last_verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl GoogleConnectionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            user_id: row.get("user_id")?,
            status: row.get("status")?,
            access_token_enc: row.get("access_token_enc")?,
            refresh_token_enc: row.get("refresh_token_enc")?,
            token_expiry_at: row.get("token_expiry_at")?,
            scopes: row.get("scopes")?,
            last_verified_at: row.get("last_verified_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// True if there is no usable access token, or it expires within
    /// `buffer_seconds`.
    pub fn is_expired(&self, buffer_seconds: u64) -> bool {
        if self.access_token_enc.is_none() {
            return true;
        }
        let Some(expiry) = self.token_expiry_at.as_deref() else {
            return true;
        };
        let Ok(expires) = chrono::DateTime::parse_from_rfc3339(expiry) else {
            return true;
        };
        let buffer = chrono::Duration::seconds(buffer_seconds.min(365 * 24 * 3600) as i64);
        expires <= chrono::Utc::now() + buffer
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token_enc.is_some()
    }
}

/// Inserts or replaces a user's connection. `created_at` is kept on update.
pub fn upsert(db: &Database, row: &GoogleConnectionRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO google_connections (user_id, status, access_token_enc, refresh_token_enc,
             token_expiry_at, scopes, last_verified_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id) DO UPDATE SET
               status = ?2,
               access_token_enc = ?3,
               refresh_token_enc = ?4,
               token_expiry_at = ?5,
               scopes = ?6,
               last_verified_at = ?7,
               updated_at = ?9",
            params![
                row.user_id,
                row.status,
                row.access_token_enc,
                row.refresh_token_enc,
                row.token_expiry_at,
                row.scopes,
                row.last_verified_at,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a user's connection in any status.
pub fn find(db: &Database, user_id: &str) -> Result<Option<GoogleConnectionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, status, access_token_enc, refresh_token_enc, token_expiry_at,
             scopes, last_verified_at, created_at, updated_at
             FROM google_connections WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![user_id], GoogleConnectionRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Stores a refreshed access token and its expiry.
pub fn update_access_token(
    db: &Database,
    user_id: &str,
    access_token_enc: &str,
    token_expiry_at: &str,
    verified_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE google_connections SET access_token_enc = ?2, token_expiry_at = ?3,
             last_verified_at = ?4, updated_at = ?4
             WHERE user_id = ?1",
            params![user_id, access_token_enc, token_expiry_at, verified_at],
        )?;
        Ok(())
    })
}

/// Changes the status of a user's connection.
pub fn set_status(db: &Database, user_id: &str, status: &str, updated_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE google_connections SET status = ?2, updated_at = ?3 WHERE user_id = ?1",
            params![user_id, status, updated_at],
        )?;
        Ok(())
    })
}
