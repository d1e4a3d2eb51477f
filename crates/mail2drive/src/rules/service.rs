//! Rule management operations backing the HTTP surface.

use serde::Serialize;
use uuid::Uuid;

use super::model::{Rule, RuleInput, DEFAULT_RUN_TIMING};
use super::status::RuleStatus;
use crate::db::{now_timestamp, rule_repo, Database};
use crate::error::{Mail2DriveError, Result};

/// A rule together with its derived readiness.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    #[serde(flatten)]
    pub rule: Rule,
    pub readiness: RuleStatus,
}

impl From<Rule> for RuleSummary {
    fn from(rule: Rule) -> Self {
        let readiness = rule.status();
        Self { rule, readiness }
    }
}

/// Creates a rule for `user_id`. A destination folder is required.
///
/// Unless the input sets the active flag, a new rule is active exactly when
/// it is fully configured.
pub fn create_rule(db: &Database, user_id: &str, input: RuleInput) -> Result<RuleSummary> {
    let patch = input.into_patch();
    let destination = patch
        .drive_folder_id
        .clone()
        .flatten()
        .ok_or_else(|| Mail2DriveError::InvalidInput("drive_folder_id is required".to_string()))?;

    let now = now_timestamp();
    let mut rule = Rule {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        is_active: false,
        gmail_query: patch.gmail_query.clone().flatten(),
        label_id: patch.label_id.clone().flatten(),
        subject_keywords: patch.subject_keywords.clone().unwrap_or_default(),
        drive_folder_id: Some(destination),
        run_timing: patch
            .run_timing
            .clone()
            .unwrap_or_else(|| DEFAULT_RUN_TIMING.to_string()),
        created_at: now.clone(),
        updated_at: now,
    };
    rule.is_active = patch.is_active.unwrap_or_else(|| rule.is_configured());

    rule_repo::insert(db, &rule)?;
    log::info!("Created rule {} ({})", rule.id, rule.status().as_str());
    Ok(rule.into())
}

/// Applies a partial update to one of the user's rules.
pub fn update_rule(db: &Database, user_id: &str, rule_id: &str, input: RuleInput) -> Result<RuleSummary> {
    let patch = input.into_patch();
    if patch.is_empty() {
        return Err(Mail2DriveError::InvalidInput("no updatable fields supplied".to_string()));
    }

    let current = owned_rule(db, user_id, rule_id)?;
    let merged = patch.apply(&current, now_timestamp());
    if !rule_repo::update(db, &merged)? {
        return Err(Mail2DriveError::NotFound(format!("rule {}", rule_id)));
    }

    log::info!("Updated rule {} ({})", merged.id, merged.status().as_str());
    Ok(merged.into())
}

/// Loads one of the user's rules.
pub fn get_rule(db: &Database, user_id: &str, rule_id: &str) -> Result<RuleSummary> {
    owned_rule(db, user_id, rule_id).map(Into::into)
}

/// Lists the user's rules, most recently updated first.
pub fn list_rules(db: &Database, user_id: &str) -> Result<Vec<RuleSummary>> {
    Ok(rule_repo::list_by_user(db, user_id)?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Rules owned by someone else are reported as missing.
fn owned_rule(db: &Database, user_id: &str, rule_id: &str) -> Result<Rule> {
    match rule_repo::find_by_id(db, rule_id)? {
        Some(rule) if rule.user_id == user_id => Ok(rule),
        _ => Err(Mail2DriveError::NotFound(format!("rule {}", rule_id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SetupReason;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn input(json: &str) -> RuleInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_create_requires_destination() {
        let db = test_db();
        let err = create_rule(&db, "u1", input(r#"{"subject_keywords": ["a"]}"#)).unwrap_err();
        assert!(matches!(err, Mail2DriveError::InvalidInput(_)));

        let err = create_rule(&db, "u1", input(r#"{"drive_folder_id": "  "}"#)).unwrap_err();
        assert!(matches!(err, Mail2DriveError::InvalidInput(_)));
    }

    #[test]
    fn test_create_without_criteria_needs_setup() {
        let db = test_db();
        let created = create_rule(&db, "u1", input(r#"{"drive_folder_id": "F1"}"#)).unwrap();
        assert!(!created.rule.is_active);
        assert_eq!(created.rule.run_timing, "manual");
        assert_eq!(
            created.readiness,
            RuleStatus::NeedsSetup {
                reasons: vec![SetupReason::MissingSearchCriterion]
            }
        );
    }

    #[test]
    fn test_create_configured_rule_is_ready() {
        let db = test_db();
        let created = create_rule(
            &db,
            "u1",
            input(r#"{"drive_folder_id": "F1", "subject_keywords": "請求書,領収書"}"#),
        )
        .unwrap();
        assert!(created.rule.is_active);
        assert_eq!(created.readiness, RuleStatus::Ready);
        assert_eq!(created.rule.subject_keywords.len(), 2);

        let loaded = get_rule(&db, "u1", &created.rule.id).unwrap();
        assert_eq!(loaded.rule, created.rule);
    }

    #[test]
    fn test_update_empty_patch_rejected() {
        let db = test_db();
        let created = create_rule(&db, "u1", input(r#"{"drive_folder_id": "F1"}"#)).unwrap();
        let err = update_rule(&db, "u1", &created.rule.id, input(r#"{"unknown": 1}"#)).unwrap_err();
        assert!(matches!(err, Mail2DriveError::InvalidInput(_)));
    }

    #[test]
    fn test_update_completes_configuration() {
        let db = test_db();
        let created = create_rule(&db, "u1", input(r#"{"drive_folder_id": "F1"}"#)).unwrap();
        let updated = update_rule(
            &db,
            "u1",
            &created.rule.id,
            input(r#"{"gmail_query": "from:billing@example.com"}"#),
        )
        .unwrap();
        assert!(updated.rule.is_active);
        assert_eq!(updated.readiness, RuleStatus::Ready);
    }

    #[test]
    fn test_update_clearing_destination_needs_setup() {
        let db = test_db();
        let created = create_rule(&db, "u1", input(r#"{"drive_folder_id": "F1", "subject_keywords": ["a"]}"#)).unwrap();
        let updated = update_rule(&db, "u1", &created.rule.id, input(r#"{"drive_folder_id": null}"#)).unwrap();
        assert!(!updated.rule.is_active);
        assert_eq!(
            updated.readiness,
            RuleStatus::NeedsSetup {
                reasons: vec![SetupReason::MissingDestination]
            }
        );
    }

    #[test]
    fn test_other_users_rules_are_not_found() {
        let db = test_db();
        let created = create_rule(&db, "u1", input(r#"{"drive_folder_id": "F1"}"#)).unwrap();

        assert!(matches!(get_rule(&db, "u2", &created.rule.id), Err(Mail2DriveError::NotFound(_))));
        assert!(matches!(
            update_rule(&db, "u2", &created.rule.id, input(r#"{"enabled": false}"#)),
            Err(Mail2DriveError::NotFound(_))
        ));
        assert!(list_rules(&db, "u2").unwrap().is_empty());
        assert_eq!(list_rules(&db, "u1").unwrap().len(), 1);
    }
}
