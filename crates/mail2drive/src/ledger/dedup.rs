//! Dedup ledger: insert-to-claim over `processed_messages`.

use std::fmt;

use uuid::Uuid;

use crate::db::processed_repo::{self, InsertOutcome, ProcessedMessageRow};
use crate::db::{now_timestamp, Database, DatabaseError};

/// Identifier of a claim row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimId(String);

impl ClaimId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now owns the message for this rule.
    Claimed(ClaimId),
    /// Some run (this one, a concurrent one or a past one) already owns it.
    AlreadyClaimed,
}

/// Gate deciding which messages a run may process.
///
/// Correctness under concurrent runs of the same rule rests entirely on
/// the storage-level uniqueness of `(rule_id, message_id)`.
#[derive(Clone)]
pub struct DedupLedger {
    db: Database,
}

impl DedupLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Claims `message_id` for `rule_id`.
    pub fn claim(&self, rule_id: &str, user_id: &str, message_id: &str) -> Result<ClaimOutcome, DatabaseError> {
        let row = ProcessedMessageRow {
            id: Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            user_id: user_id.to_string(),
            message_id: message_id.to_string(),
            drive_file_id: None,
            claimed_at: now_timestamp(),
        };

        match processed_repo::insert_claim(&self.db, &row)? {
            InsertOutcome::Inserted => Ok(ClaimOutcome::Claimed(ClaimId(row.id))),
            InsertOutcome::Duplicate => Ok(ClaimOutcome::AlreadyClaimed),
        }
    }

    /// Attaches the storage file ID to a claim. Callers treat failure as
    /// best-effort.
    pub fn record_storage_ref(&self, claim: &ClaimId, file_id: &str) -> Result<(), DatabaseError> {
        if !processed_repo::set_drive_file_id(&self.db, claim.as_str(), file_id)? {
            log::warn!("Claim {} already has a storage reference or no longer exists", claim);
        }
        Ok(())
    }

    /// Deletes a claim so a later run can pick the message up again.
    pub fn release(&self, claim: &ClaimId) -> Result<(), DatabaseError> {
        processed_repo::delete(&self.db, claim.as_str())?;
        Ok(())
    }

    /// Whether `message_id` is already claimed for `rule_id`.
    pub fn is_claimed(&self, rule_id: &str, message_id: &str) -> Result<bool, DatabaseError> {
        Ok(processed_repo::find(&self.db, rule_id, message_id)?.is_some())
    }

    /// Storage file ID recorded for a message, if any.
    pub fn storage_ref(&self, rule_id: &str, message_id: &str) -> Result<Option<String>, DatabaseError> {
        Ok(processed_repo::find(&self.db, rule_id, message_id)?.and_then(|row| row.drive_file_id))
    }
}
