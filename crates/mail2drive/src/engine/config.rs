use serde::{Deserialize, Serialize};

/// Search results considered per run unless configured otherwise.
pub const DEFAULT_MAX_RESULTS: u32 = 5;

/// What happens to a claim when processing the claimed message fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimPolicy {
    /// The claim stays; a failed message is never retried (at-most-once).
    #[default]
    ClaimOnAttempt,
    /// The claim is released so a later run picks the message up again.
    ClaimOnSuccess,
}

impl ClaimPolicy {
    pub fn releases_on_failure(&self) -> bool {
        matches!(self, ClaimPolicy::ClaimOnSuccess)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_results: u32,
    pub claim_policy: ClaimPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            claim_policy: ClaimPolicy::default(),
        }
    }
}
