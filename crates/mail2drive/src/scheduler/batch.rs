use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use crate::db::{now_timestamp, rule_repo, Database, DatabaseError};
use crate::engine::{RuleRunner, RunOutcome};
use crate::ledger::{RunLedger, Trigger};

/// Runs still `running` after this many seconds are considered abandoned.
pub const DEFAULT_STALE_RUN_AFTER_SECS: i64 = 3600;

/// Reason recorded for enabled rules that cannot run.
const NEEDS_SETUP: &str = "needs_setup";

/// Outcome for one rule in a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BatchResult {
    /// The engine ran and recorded a run (successful or not).
    Ran(RunOutcome),
    /// The rule was not run.
    Skipped { reason: String },
    /// The engine refused before opening a run.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub rule_id: String,
    #[serde(flatten)]
    pub result: BatchResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub started_at: String,
    pub reconciled: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub saved: u32,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn push(&mut self, rule_id: &str, result: BatchResult) {
        match &result {
            BatchResult::Ran(outcome) if outcome.is_success() => self.succeeded += 1,
            BatchResult::Ran(_) => self.errored += 1,
            BatchResult::Skipped { .. } => self.skipped += 1,
            BatchResult::Failed { .. } => self.failed += 1,
        }
        if let BatchResult::Ran(outcome) = &result {
            self.saved += outcome.saved;
        }
        self.entries.push(BatchEntry {
            rule_id: rule_id.to_string(),
            result,
        });
    }
}

/// Runs every enabled, ready rule once, sequentially, as its owner.
pub struct BatchTrigger {
    db: Database,
    runner: Arc<RuleRunner>,
    stale_after: chrono::Duration,
}

impl BatchTrigger {
    pub fn new(db: Database, runner: Arc<RuleRunner>) -> Self {
        Self {
            db,
            runner,
            stale_after: chrono::Duration::seconds(DEFAULT_STALE_RUN_AFTER_SECS),
        }
    }

    pub fn with_stale_after(mut self, stale_after: chrono::Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Closes abandoned runs. Failure is logged and reported as zero.
    pub fn reconcile_stale_runs(&self) -> usize {
        match RunLedger::new(self.db.clone()).reconcile_stale(self.stale_after) {
            Ok(closed) => closed,
            Err(e) => {
                error!("Stale run reconciliation failed: {}", e);
                0
            }
        }
    }

    /// A failing rule never stops the batch; only failing to list the
    /// rules does.
    pub async fn run_enabled(&self, trigger: Trigger) -> Result<BatchReport, DatabaseError> {
        let span = info_span!("batch", trigger = %trigger);
        async {
            let mut report = BatchReport {
                started_at: now_timestamp(),
                reconciled: self.reconcile_stale_runs(),
                ..Default::default()
            };

            let rules = rule_repo::list_active(&self.db)?;
            info!("Batch: {} enabled rule(s)", rules.len());

            for rule in rules {
                if !rule.status().is_ready() {
                    report.push(
                        &rule.id,
                        BatchResult::Skipped {
                            reason: NEEDS_SETUP.to_string(),
                        },
                    );
                    continue;
                }

                let result = match self.runner.run(&rule.id, &rule.user_id, trigger).await {
                    Ok(outcome) => BatchResult::Ran(outcome),
                    Err(e) => {
                        error!("Rule {} could not be run: {}", rule.id, e);
                        BatchResult::Failed { error: e.to_string() }
                    }
                };
                report.push(&rule.id, result);
            }

            info!(
                "Batch finished: {} succeeded, {} errored, {} skipped, {} failed",
                report.succeeded, report.errored, report.skipped, report.failed
            );
            Ok::<_, DatabaseError>(report)
        }
        .instrument(span)
        .await
    }
}
