//! Typed rule model and the ingress normalization that produces it.
//!
//! Client payloads are loose: keywords arrive as a list or as a comma/newline
//! separated string, the active flag may be spelled `is_active` or `enabled`,
//! and any field may be absent or null. All of that is resolved here, once,
//! so the evaluator, query builder and engine only ever see a [`Rule`].

use serde::{Deserialize, Deserializer, Serialize};

use super::query;
use super::status::{self, RuleStatus};

/// Default run-timing descriptor for newly created rules.
pub const DEFAULT_RUN_TIMING: &str = "manual";

/// A stored automation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    /// Explicit mailbox search expression. Takes precedence over keywords.
    pub gmail_query: Option<String>,
    /// Label / folder filter.
    pub label_id: Option<String>,
    pub subject_keywords: Vec<String>,
    /// Destination folder in the storage backend.
    pub drive_folder_id: Option<String>,
    /// Free-form timing descriptor ("manual", a cron-like string, ...).
    pub run_timing: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Rule {
    /// Derived readiness of this rule.
    pub fn status(&self) -> RuleStatus {
        status::evaluate(self)
    }

    /// The expression handed to the mailbox search for this rule.
    pub fn search_expression(&self) -> String {
        query::effective_search_expression(self)
    }

    /// Trimmed destination folder, if one is configured.
    pub fn destination(&self) -> Option<&str> {
        non_empty(self.drive_folder_id.as_deref())
    }

    /// Whether search and destination are both configured.
    pub fn is_configured(&self) -> bool {
        status::has_search_criterion(self) && status::has_destination(self)
    }
}

/// Returns the trimmed value if it is present and non-empty.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn normalized_text(value: Option<String>) -> Option<String> {
    non_empty(value.as_deref()).map(str::to_string)
}

/// Splits a delimited keyword string on commas and newlines.
pub fn split_keywords(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keywords as accepted from clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KeywordsInput {
    List(Vec<serde_json::Value>),
    Text(String),
}

impl KeywordsInput {
    /// Trims every keyword and drops empties. Non-string list items are
    /// stringified; nulls are dropped.
    pub fn normalize(&self) -> Vec<String> {
        match self {
            KeywordsInput::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s.trim().to_string()),
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            KeywordsInput::Text(text) => split_keywords(text),
        }
    }
}

/// Distinguishes an absent field from an explicit `null`.
///
/// Absent -> `None` (via `#[serde(default)]`), `null` -> `Some(None)`,
/// value -> `Some(Some(v))`.
fn explicit<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Raw rule fields from a create or update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleInput {
    #[serde(default, deserialize_with = "explicit")]
    pub drive_folder_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit")]
    pub subject_keywords: Option<Option<KeywordsInput>>,
    #[serde(default, deserialize_with = "explicit")]
    pub gmail_query: Option<Option<String>>,
    #[serde(default, alias = "gmail_label_id", deserialize_with = "explicit")]
    pub label_id: Option<Option<String>>,
    #[serde(default, alias = "enabled")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub run_timing: Option<String>,
}

impl RuleInput {
    /// Normalizes the raw input into a typed patch.
    pub fn into_patch(self) -> RulePatch {
        RulePatch {
            drive_folder_id: self.drive_folder_id.map(normalized_text),
            subject_keywords: self
                .subject_keywords
                .map(|kw| kw.map(|k| k.normalize()).unwrap_or_default()),
            gmail_query: self.gmail_query.map(normalized_text),
            label_id: self.label_id.map(normalized_text),
            is_active: self.is_active,
            run_timing: normalized_text(self.run_timing),
        }
    }
}

/// A normalized partial update. `None` means "leave unchanged"; for the
/// nullable text fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulePatch {
    pub drive_folder_id: Option<Option<String>>,
    pub subject_keywords: Option<Vec<String>>,
    pub gmail_query: Option<Option<String>>,
    pub label_id: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub run_timing: Option<String>,
}

impl RulePatch {
    /// True when no recognized field is present.
    pub fn is_empty(&self) -> bool {
        self.drive_folder_id.is_none()
            && self.subject_keywords.is_none()
            && self.gmail_query.is_none()
            && self.label_id.is_none()
            && self.is_active.is_none()
            && self.run_timing.is_none()
    }

    /// True when the patch changes a field that readiness depends on.
    pub fn touches_readiness(&self) -> bool {
        self.drive_folder_id.is_some()
            || self.subject_keywords.is_some()
            || self.gmail_query.is_some()
            || self.label_id.is_some()
    }

    /// Merges the patch onto `current`.
    ///
    /// The active flag is re-derived from the merged configuration when a
    /// readiness field changed, unless the patch sets it explicitly.
    pub fn apply(&self, current: &Rule, updated_at: String) -> Rule {
        let mut merged = current.clone();
        if let Some(v) = &self.drive_folder_id {
            merged.drive_folder_id = v.clone();
        }
        if let Some(v) = &self.subject_keywords {
            merged.subject_keywords = v.clone();
        }
        if let Some(v) = &self.gmail_query {
            merged.gmail_query = v.clone();
        }
        if let Some(v) = &self.label_id {
            merged.label_id = v.clone();
        }
        if let Some(v) = &self.run_timing {
            merged.run_timing = v.clone();
        }

        merged.is_active = match self.is_active {
            Some(explicit) => explicit,
            None if self.touches_readiness() => merged.is_configured(),
            None => current.is_active,
        };
        merged.updated_at = updated_at;
        merged
    }
}
