//! Run event sink. Best-effort failures end up here instead of in the
//! run result.

use tracing::{info, warn};

use crate::ledger::{RunId, RunStatus};
use crate::sanitize;

#[derive(Debug, Clone)]
pub enum RunEvent {
    ItemClaimed {
        message_id: String,
    },
    ItemSkipped {
        message_id: String,
    },
    ItemSaved {
        message_id: String,
        file_id: String,
    },
    BestEffortFailed {
        operation: &'static str,
        error: String,
    },
    RunFinished {
        run_id: RunId,
        status: RunStatus,
        summary: String,
    },
}

pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Observer for tests and callers that only need the returned outcome.
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_event(&self, _event: &RunEvent) {}
}

/// Logs events through `tracing`; message ids are hashed.
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::ItemClaimed { message_id } => {
                info!(message = %sanitize::hash_id(message_id), "Claimed message");
            }
            RunEvent::ItemSkipped { message_id } => {
                info!(message = %sanitize::hash_id(message_id), "Skipped already claimed message");
            }
            RunEvent::ItemSaved { message_id, file_id } => {
                info!(message = %sanitize::hash_id(message_id), file_id = %file_id, "Saved document");
            }
            RunEvent::BestEffortFailed { operation, error } => {
                warn!(operation = *operation, "Best-effort step failed: {}", error);
            }
            RunEvent::RunFinished {
                run_id,
                status,
                summary,
            } => {
                info!(run_id = %run_id, status = %status, "Run finished: {}", summary);
            }
        }
    }
}
