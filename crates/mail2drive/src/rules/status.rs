//! Rule readiness evaluation.

use std::fmt;

use serde::Serialize;

use super::model::{non_empty, Rule};

/// Why a rule cannot run yet. Serialized as a stable human-readable string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SetupReason {
    #[serde(rename = "search criteria not set")]
    MissingSearchCriterion,
    #[serde(rename = "destination folder not set")]
    MissingDestination,
}

impl SetupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupReason::MissingSearchCriterion => "search criteria not set",
            SetupReason::MissingDestination => "destination folder not set",
        }
    }
}

impl fmt::Display for SetupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived operational state of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    Ready,
    Disabled,
    NeedsSetup { reasons: Vec<SetupReason> },
}

impl RuleStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, RuleStatus::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Ready => "ready",
            RuleStatus::Disabled => "disabled",
            RuleStatus::NeedsSetup { .. } => "needs_setup",
        }
    }
}

/// Explicit query, label filter or at least one keyword.
pub fn has_search_criterion(rule: &Rule) -> bool {
    non_empty(rule.gmail_query.as_deref()).is_some()
        || non_empty(rule.label_id.as_deref()).is_some()
        || rule.subject_keywords.iter().any(|k| !k.trim().is_empty())
}

pub fn has_destination(rule: &Rule) -> bool {
    rule.destination().is_some()
}

/// Computes readiness. Missing configuration wins over the stored active flag.
pub fn evaluate(rule: &Rule) -> RuleStatus {
    let has_criterion = has_search_criterion(rule);
    let has_destination = has_destination(rule);

    if !has_criterion || !has_destination {
        let mut reasons = Vec::with_capacity(2);
        if !has_criterion {
            reasons.push(SetupReason::MissingSearchCriterion);
        }
        if !has_destination {
            reasons.push(SetupReason::MissingDestination);
        }
        return RuleStatus::NeedsSetup { reasons };
    }

    if !rule.is_active {
        return RuleStatus::Disabled;
    }

    RuleStatus::Ready
}
