//! Processed-message repository: the `processed_messages` table.
//!
//! The `UNIQUE (rule_id, message_id)` constraint is the arbiter for claims:
//! a plain INSERT either creates the row or fails with a unique violation,
//! which is reported as [`InsertOutcome::Duplicate`].

use rusqlite::{params, ErrorCode, Row};

use super::{Database, DatabaseError};

/// A raw processed-message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedMessageRow {
    pub id: String,
    pub rule_id: String,
    pub user_id: String,
    pub message_id: String,
    pub drive_file_id: Option<String>,
    pub claimed_at: String,
}

impl ProcessedMessageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            rule_id: row.get("rule_id")?,
            user_id: row.get("user_id")?,
            message_id: row.get("message_id")?,
            drive_file_id: row.get("drive_file_id")?,
            claimed_at: row.get("claimed_at")?,
        })
    }
}

/// Result of a claim insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Inserts a claim row. A conflicting `(rule_id, message_id)` pair yields
/// `Duplicate` instead of an error.
pub fn insert_claim(db: &Database, row: &ProcessedMessageRow) -> Result<InsertOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let result = conn.execute(
            "INSERT INTO processed_messages (id, rule_id, user_id, message_id, drive_file_id, claimed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.rule_id,
                row.user_id,
                row.message_id,
                row.drive_file_id,
                row.claimed_at,
            ],
        );
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(DatabaseError::Sqlite(e)),
        }
    })
}

/// Records the storage file ID on a claim. Only fills an empty slot;
/// returns false when the claim is gone or already has a file ID.
pub fn set_drive_file_id(db: &Database, id: &str, drive_file_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE processed_messages SET drive_file_id = ?2
             WHERE id = ?1 AND drive_file_id IS NULL",
            params![id, drive_file_id],
        )?;
        Ok(changed > 0)
    })
}

/// Deletes a claim by ID.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM processed_messages WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Finds the claim for a message under a rule.
pub fn find(
    db: &Database,
    rule_id: &str,
    message_id: &str,
) -> Result<Option<ProcessedMessageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, rule_id, user_id, message_id, drive_file_id, claimed_at
             FROM processed_messages WHERE rule_id = ?1 AND message_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![rule_id, message_id], ProcessedMessageRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all claims for a rule in claim order.
pub fn list_by_rule(db: &Database, rule_id: &str) -> Result<Vec<ProcessedMessageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, rule_id, user_id, message_id, drive_file_id, claimed_at
             FROM processed_messages WHERE rule_id = ?1 ORDER BY claimed_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![rule_id], ProcessedMessageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO rules (id, user_id, created_at, updated_at) VALUES ('r1', 'u1', 't', 't');
                 INSERT INTO rules (id, user_id, created_at, updated_at) VALUES ('r2', 'u1', 't', 't');",
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn claim(id: &str, rule_id: &str, message_id: &str) -> ProcessedMessageRow {
        ProcessedMessageRow {
            id: id.to_string(),
            rule_id: rule_id.to_string(),
            user_id: "u1".to_string(),
            message_id: message_id.to_string(),
            drive_file_id: None,
            claimed_at: "2026-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_insert_then_duplicate() {
        let db = test_db();
        assert_eq!(insert_claim(&db, &claim("p1", "r1", "m1")).unwrap(), InsertOutcome::Inserted);
        assert_eq!(insert_claim(&db, &claim("p2", "r1", "m1")).unwrap(), InsertOutcome::Duplicate);
        assert_eq!(list_by_rule(&db, "r1").unwrap().len(), 1);
    }

    #[test]
    fn test_same_message_under_different_rules() {
        let db = test_db();
        assert_eq!(insert_claim(&db, &claim("p1", "r1", "m1")).unwrap(), InsertOutcome::Inserted);
        assert_eq!(insert_claim(&db, &claim("p2", "r2", "m1")).unwrap(), InsertOutcome::Inserted);
    }

    #[test]
    fn test_foreign_key_failure_is_an_error() {
        let db = test_db();
        assert!(insert_claim(&db, &claim("p1", "no-such-rule", "m1")).is_err());
    }

    #[test]
    fn test_set_drive_file_id_only_once() {
        let db = test_db();
        insert_claim(&db, &claim("p1", "r1", "m1")).unwrap();

        assert!(set_drive_file_id(&db, "p1", "file-a").unwrap());
        assert!(!set_drive_file_id(&db, "p1", "file-b").unwrap());

        let row = find(&db, "r1", "m1").unwrap().unwrap();
        assert_eq!(row.drive_file_id.as_deref(), Some("file-a"));
    }

    #[test]
    fn test_delete_allows_reclaim() {
        let db = test_db();
        insert_claim(&db, &claim("p1", "r1", "m1")).unwrap();
        assert!(delete(&db, "p1").unwrap());
        assert!(find(&db, "r1", "m1").unwrap().is_none());
        assert_eq!(insert_claim(&db, &claim("p2", "r1", "m1")).unwrap(), InsertOutcome::Inserted);
    }
}
