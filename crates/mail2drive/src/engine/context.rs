use std::time::Instant;

use serde::Serialize;

use super::error::RunError;
use crate::ledger::{RunId, RunStatus, Trigger};

/// Mutable tally carried through one run.
pub struct RunContext {
    // Input
    pub rule_id: String,
    pub user_id: String,
    pub trigger: Trigger,
    pub run_id: RunId,
    started: Instant,

    // Set by the search step
    pub candidates: usize,

    // Item loop results
    pub processed: u32,
    pub skipped: u32,
    pub saved: u32,
    pub file_ids: Vec<String>,
    pub processed_subjects: Vec<String>,

    // Best-effort failures that did not stop the run
    pub warnings: Vec<String>,
}

impl RunContext {
    pub fn new(rule_id: &str, user_id: &str, trigger: Trigger, run_id: RunId) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            user_id: user_id.to_string(),
            trigger,
            run_id,
            started: Instant::now(),
            candidates: 0,
            processed: 0,
            skipped: 0,
            saved: 0,
            file_ids: Vec::new(),
            processed_subjects: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// `processed=P skipped=S saved=V`, the message stored on success.
    pub fn summary(&self) -> String {
        format!(
            "processed={} skipped={} saved={}",
            self.processed, self.skipped, self.saved
        )
    }

    pub fn into_outcome(self, error: Option<RunError>) -> RunOutcome {
        let status = if error.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Success
        };
        RunOutcome {
            summary: self.summary(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            run_id: self.run_id,
            rule_id: self.rule_id,
            trigger: self.trigger,
            status,
            candidates: self.candidates,
            processed: self.processed,
            skipped: self.skipped,
            saved: self.saved,
            file_ids: self.file_ids,
            processed_subjects: self.processed_subjects,
            warnings: self.warnings,
            error,
        }
    }
}

/// What a caller gets back from a run that reached the run ledger.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub rule_id: String,
    pub trigger: Trigger,
    pub status: RunStatus,
    /// Message ids returned by the search.
    pub candidates: usize,
    pub processed: u32,
    pub skipped: u32,
    pub saved: u32,
    pub summary: String,
    pub file_ids: Vec<String>,
    pub processed_subjects: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub elapsed_ms: u64,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
