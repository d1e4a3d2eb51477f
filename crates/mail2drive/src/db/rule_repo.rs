//! Rule repository: CRUD operations for the `rules` table.

use rusqlite::types::Type;
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::rules::Rule;

const COLUMNS: &str = "id, user_id, is_active, gmail_query, label_id, subject_keywords,
     drive_folder_id, run_timing, created_at, updated_at";

fn rule_from_row(row: &Row<'_>) -> Result<Rule, rusqlite::Error> {
    let keywords_json: String = row.get("subject_keywords")?;
    let subject_keywords: Vec<String> = serde_json::from_str(&keywords_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
    })?;

    Ok(Rule {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        is_active: row.get("is_active")?,
        gmail_query: row.get("gmail_query")?,
        label_id: row.get("label_id")?,
        subject_keywords,
        drive_folder_id: row.get("drive_folder_id")?,
        run_timing: row.get("run_timing")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn keywords_json(rule: &Rule) -> Result<String, DatabaseError> {
    serde_json::to_string(&rule.subject_keywords).map_err(|e| DatabaseError::Decode {
        column: "subject_keywords",
        reason: e.to_string(),
    })
}

/// Inserts a new rule.
pub fn insert(db: &Database, rule: &Rule) -> Result<(), DatabaseError> {
    let keywords = keywords_json(rule)?;
    db.with_conn(|conn| {
        conn.execute(
            &format!("INSERT INTO rules ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                rule.id,
                rule.user_id,
                rule.is_active,
                rule.gmail_query,
                rule.label_id,
                keywords,
                rule.drive_folder_id,
                rule.run_timing,
                rule.created_at,
                rule.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites every mutable field of an existing rule. Returns false when
/// no row matched.
pub fn update(db: &Database, rule: &Rule) -> Result<bool, DatabaseError> {
    let keywords = keywords_json(rule)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE rules SET is_active = ?2, gmail_query = ?3, label_id = ?4,
             subject_keywords = ?5, drive_folder_id = ?6, run_timing = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                rule.id,
                rule.is_active,
                rule.gmail_query,
                rule.label_id,
                keywords,
                rule.drive_folder_id,
                rule.run_timing,
                rule.updated_at,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Finds a rule by ID regardless of owner.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Rule>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM rules WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], rule_from_row)?;
        match rows.next() {
            Some(Ok(rule)) => Ok(Some(rule)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists a user's rules, most recently updated first.
pub fn list_by_user(db: &Database, user_id: &str) -> Result<Vec<Rule>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM rules WHERE user_id = ?1 ORDER BY updated_at DESC, id"
        ))?;
        let rules = stmt
            .query_map(params![user_id], rule_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    })
}

/// Lists every rule with the active flag set, oldest first.
pub fn list_active(db: &Database) -> Result<Vec<Rule>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM rules WHERE is_active = 1 ORDER BY created_at, id"
        ))?;
        let rules = stmt
            .query_map([], rule_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    })
}
