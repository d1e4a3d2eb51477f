//! Builders for test rules.

#![allow(dead_code)]

use mail2drive::db::{now_timestamp, rule_repo};
use mail2drive::{Database, Rule};

/// Builder for `Rule` rows, bypassing the management service so tests can
/// store states the service would never produce.
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    /// An active rule owned by `user_id` with no search criteria and no
    /// destination.
    pub fn new(id: &str, user_id: &str) -> Self {
        let now = now_timestamp();
        Self {
            rule: Rule {
                id: id.to_string(),
                user_id: user_id.to_string(),
                is_active: true,
                gmail_query: None,
                label_id: None,
                subject_keywords: vec![],
                drive_folder_id: None,
                run_timing: "manual".to_string(),
                created_at: now.clone(),
                updated_at: now,
            },
        }
    }

    /// Active rule with keywords `請求書` and destination `F1`.
    pub fn ready(id: &str, user_id: &str) -> Self {
        Self::new(id, user_id).keywords(&["請求書"]).destination("F1")
    }

    pub fn query(mut self, query: &str) -> Self {
        self.rule.gmail_query = Some(query.to_string());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.rule.label_id = Some(label.to_string());
        self
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.rule.subject_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn destination(mut self, folder: &str) -> Self {
        self.rule.drive_folder_id = Some(folder.to_string());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.rule.is_active = active;
        self
    }

    pub fn build(self) -> Rule {
        self.rule
    }

    /// Inserts the rule and returns it.
    pub fn insert(self, db: &Database) -> Rule {
        rule_repo::insert(db, &self.rule).expect("Failed to insert test rule");
        self.rule
    }
}

/// Message ids `m1..=mN`.
pub fn message_ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("m{}", i)).collect()
}
