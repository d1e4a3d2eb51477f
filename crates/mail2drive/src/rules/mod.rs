//! Automation rules: typed model, readiness, search expressions and
//! management operations.

pub mod model;
pub mod query;
pub mod service;
pub mod status;

pub use model::{KeywordsInput, Rule, RuleInput, RulePatch, DEFAULT_RUN_TIMING};
pub use query::{build_search_expression, effective_search_expression, BASE_FILTER};
pub use service::{create_rule, get_rule, list_rules, update_rule, RuleSummary};
pub use status::{evaluate, RuleStatus, SetupReason};
