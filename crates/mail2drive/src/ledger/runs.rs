//! Run ledger: one audited row per execution attempt.

use std::fmt;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{RunStatus, Trigger};
use crate::db::run_repo::{self, RunRow};
use crate::db::{format_timestamp, now_timestamp, Database, DatabaseError};

/// Error code recorded on runs closed by [`RunLedger::reconcile_stale`].
pub const STALE_RUN_CODE: &str = "stale_run";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A decoded run row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub id: RunId,
    pub rule_id: String,
    pub user_id: String,
    pub trigger: Trigger,
    pub status: RunStatus,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub error_step: Option<String>,
    pub processed_count: u32,
    pub saved_count: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl TryFrom<RunRow> for RunRecord {
    type Error = DatabaseError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let trigger = row.trigger.parse().map_err(|reason| DatabaseError::Decode {
            column: "trigger",
            reason,
        })?;
        let status = row.status.parse().map_err(|reason| DatabaseError::Decode {
            column: "status",
            reason,
        })?;

        Ok(Self {
            id: RunId(row.id),
            rule_id: row.rule_id,
            user_id: row.user_id,
            trigger,
            status,
            message: row.message,
            error_code: row.error_code,
            error_step: row.error_step,
            processed_count: row.processed_count,
            saved_count: row.saved_count,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

fn decode_all(rows: Vec<RunRow>) -> Result<Vec<RunRecord>, DatabaseError> {
    rows.into_iter().map(RunRecord::try_from).collect()
}

/// Append/update log of execution attempts.
///
/// Each run is finalized at most once: the first terminal write wins and
/// later finalize calls report `false` without touching the row.
#[derive(Clone)]
pub struct RunLedger {
    db: Database,
}

impl RunLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens a run in `running` state.
    pub fn open(&self, rule_id: &str, user_id: &str, trigger: Trigger) -> Result<RunId, DatabaseError> {
        let row = RunRow {
            id: Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            user_id: user_id.to_string(),
            trigger: trigger.as_str().to_string(),
            status: RunStatus::Running.as_str().to_string(),
            message: None,
            error_code: None,
            error_step: None,
            processed_count: 0,
            saved_count: 0,
            started_at: now_timestamp(),
            finished_at: None,
        };
        run_repo::insert(&self.db, &row)?;
        Ok(RunId(row.id))
    }

    pub fn finalize_success(
        &self,
        run: &RunId,
        processed: u32,
        saved: u32,
        summary: &str,
    ) -> Result<bool, DatabaseError> {
        run_repo::finish_success(&self.db, run.as_str(), processed, saved, summary, &now_timestamp())
    }

    pub fn finalize_error(
        &self,
        run: &RunId,
        message: &str,
        code: Option<&str>,
        step: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        run_repo::finish_error(&self.db, run.as_str(), message, code, step, &now_timestamp())
    }

    pub fn get(&self, run: &RunId) -> Result<Option<RunRecord>, DatabaseError> {
        run_repo::find_by_id(&self.db, run.as_str())?
            .map(RunRecord::try_from)
            .transpose()
    }

    /// Most recent run of each of the user's rules.
    pub fn latest_by_rule(&self, user_id: &str) -> Result<Vec<RunRecord>, DatabaseError> {
        decode_all(run_repo::latest_per_rule(&self.db, user_id)?)
    }

    /// Run history of one rule, newest first.
    pub fn history(&self, rule_id: &str, limit: u32) -> Result<Vec<RunRecord>, DatabaseError> {
        decode_all(run_repo::list_by_rule(&self.db, rule_id, limit)?)
    }

    /// Fails runs stuck in `running` for longer than `older_than`.
    pub fn reconcile_stale(&self, older_than: chrono::Duration) -> Result<usize, DatabaseError> {
        let cutoff = format_timestamp(Utc::now() - older_than);
        let closed = run_repo::fail_stale(
            &self.db,
            &cutoff,
            "run abandoned before completion",
            STALE_RUN_CODE,
            &now_timestamp(),
        )?;
        if closed > 0 {
            log::warn!("Marked {} stale run(s) as failed", closed);
        }
        Ok(closed)
    }
}
