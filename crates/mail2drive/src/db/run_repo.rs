//! Run repository: the `runs` table.
//!
//! Finalization is guarded by `status = 'running'`, so the first terminal
//! write wins and a finished run is never rewritten.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw run row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub id: String,
    pub rule_id: String,
    pub user_id: String,
    pub trigger: String,
    pub status: String,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub error_step: Option<String>,
    pub processed_count: u32,
    pub saved_count: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            rule_id: row.get("rule_id")?,
            user_id: row.get("user_id")?,
            trigger: row.get("trigger")?,
            status: row.get("status")?,
            message: row.get("message")?,
            error_code: row.get("error_code")?,
            error_step: row.get("error_step")?,
            processed_count: row.get("processed_count")?,
            saved_count: row.get("saved_count")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

const COLUMNS: &str = "id, rule_id, user_id, trigger, status, message, error_code, error_step,
     processed_count, saved_count, started_at, finished_at";

/// Inserts a new run row.
pub fn insert(db: &Database, run: &RunRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO runs ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                run.id,
                run.rule_id,
                run.user_id,
                run.trigger,
                run.status,
                run.message,
                run.error_code,
                run.error_step,
                run.processed_count,
                run.saved_count,
                run.started_at,
                run.finished_at,
            ],
        )?;
        Ok(())
    })
}

/// Marks a running run as successful. Returns false if it was already final.
pub fn finish_success(
    db: &Database,
    id: &str,
    processed_count: u32,
    saved_count: u32,
    message: &str,
    finished_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE runs SET status = 'success', processed_count = ?2, saved_count = ?3,
             message = ?4, finished_at = ?5
             WHERE id = ?1 AND status = 'running'",
            params![id, processed_count, saved_count, message, finished_at],
        )?;
        Ok(changed > 0)
    })
}

/// Marks a running run as failed. Returns false if it was already final.
pub fn finish_error(
    db: &Database,
    id: &str,
    message: &str,
    error_code: Option<&str>,
    error_step: Option<&str>,
    finished_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE runs SET status = 'error', message = ?2, error_code = ?3, error_step = ?4,
             finished_at = ?5
             WHERE id = ?1 AND status = 'running'",
            params![id, message, error_code, error_step, finished_at],
        )?;
        Ok(changed > 0)
    })
}

/// Finds a run by ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM runs WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], RunRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists runs of a rule, newest first.
pub fn list_by_rule(db: &Database, rule_id: &str, limit: u32) -> Result<Vec<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM runs WHERE rule_id = ?1
             ORDER BY started_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![rule_id, limit], RunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Latest run of each of a user's rules, newest first.
pub fn latest_per_rule(db: &Database, user_id: &str) -> Result<Vec<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM runs r
             WHERE r.user_id = ?1
               AND r.id = (
                 SELECT r2.id FROM runs r2 WHERE r2.rule_id = r.rule_id
                 ORDER BY r2.started_at DESC, r2.rowid DESC LIMIT 1
               )
             ORDER BY r.started_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], RunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Fails every run still `running` that started before `started_before`.
/// Returns the number of runs closed.
pub fn fail_stale(
    db: &Database,
    started_before: &str,
    message: &str,
    error_code: &str,
    finished_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE runs SET status = 'error', message = ?2, error_code = ?3, finished_at = ?4
             WHERE status = 'running' AND started_at < ?1",
            params![started_before, message, error_code, finished_at],
        )?;
        Ok(changed)
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
                 INSERT INTO rules (id, user_id, created_at, updated_at) VALUES ('r2', 'u1', 't', 't');
                 INSERT INTO rules (id, user_id, created_at, updated_at) VALUES ('r3', 'u2', 't', 't');",
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn running(id: &str, rule_id: &str, user_id: &str, started_at: &str) -> RunRow {
        RunRow {
            id: id.to_string(),
            rule_id: rule_id.to_string(),
            user_id: user_id.to_string(),
            trigger: "manual".to_string(),
            status: "running".to_string(),
            message: None,
            error_code: None,
            error_step: None,
            processed_count: 0,
            saved_count: 0,
            started_at: started_at.to_string(),
            finished_at: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let run = running("a", "r1", "u1", "2026-01-01T00:00:00.000000Z");
        insert(&db, &run).unwrap();
        assert_eq!(find_by_id(&db, "a").unwrap().unwrap(), run);
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_finish_success_once() {
        let db = test_db();
        insert(&db, &running("a", "r1", "u1", "2026-01-01T00:00:00.000000Z")).unwrap();

        assert!(finish_success(&db, "a", 3, 2, "processed=3 skipped=1 saved=2", "t2").unwrap());
        assert!(!finish_error(&db, "a", "late", Some("x"), None, "t3").unwrap());

        let row = find_by_id(&db, "a").unwrap().unwrap();
        assert_eq!(row.status, "success");
        assert_eq!(row.processed_count, 3);
        assert_eq!(row.saved_count, 2);
        assert_eq!(row.finished_at.as_deref(), Some("t2"));
        assert!(row.error_code.is_none());
    }

    #[test]
    fn test_finish_error_records_code_and_step() {
        let db = test_db();
        insert(&db, &running("a", "r1", "u1", "2026-01-01T00:00:00.000000Z")).unwrap();

        assert!(finish_error(&db, "a", "boom", Some("upload_failed"), Some("item"), "t2").unwrap());
        assert!(!finish_success(&db, "a", 1, 1, "late", "t3").unwrap());

        let row = find_by_id(&db, "a").unwrap().unwrap();
        assert_eq!(row.status, "error");
        assert_eq!(row.message.as_deref(), Some("boom"));
        assert_eq!(row.error_code.as_deref(), Some("upload_failed"));
        assert_eq!(row.error_step.as_deref(), Some("item"));
    }

    #[test]
    fn test_success_rejects_saved_above_processed() {
        let db = test_db();
        insert(&db, &running("a", "r1", "u1", "t1")).unwrap();
        assert!(finish_success(&db, "a", 1, 2, "bad", "t2").is_err());
    }

    #[test]
    fn test_latest_per_rule() {
        let db = test_db();
        insert(&db, &running("a", "r1", "u1", "2026-01-01T00:00:00.000000Z")).unwrap();
        insert(&db, &running("b", "r1", "u1", "2026-01-02T00:00:00.000000Z")).unwrap();
        insert(&db, &running("c", "r2", "u1", "2026-01-01T12:00:00.000000Z")).unwrap();
        insert(&db, &running("d", "r3", "u2", "2026-01-03T00:00:00.000000Z")).unwrap();

        let latest = latest_per_rule(&db, "u1").unwrap();
        let ids: Vec<&str> = latest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_list_by_rule_limit() {
        let db = test_db();
        insert(&db, &running("a", "r1", "u1", "2026-01-01T00:00:00.000000Z")).unwrap();
        insert(&db, &running("b", "r1", "u1", "2026-01-02T00:00:00.000000Z")).unwrap();

        let rows = list_by_rule(&db, "r1", 1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "b");
    }

    #[test]
    fn test_fail_stale() {
        let db = test_db();
        insert(&db, &running("old", "r1", "u1", "2026-01-01T00:00:00.000000Z")).unwrap();
        insert(&db, &running("new", "r1", "u1", "2026-01-05T00:00:00.000000Z")).unwrap();
        insert(&db, &running("done", "r2", "u1", "2026-01-01T00:00:00.000000Z")).unwrap();
        finish_success(&db, "done", 0, 0, "ok", "t").unwrap();

        let closed = fail_stale(&db, "2026-01-03T00:00:00.000000Z", "abandoned", "stale_run", "now").unwrap();
        assert_eq!(closed, 1);
        assert_eq!(find_by_id(&db, "old").unwrap().unwrap().status, "error");
        assert_eq!(find_by_id(&db, "new").unwrap().unwrap().status, "running");
        assert_eq!(find_by_id(&db, "done").unwrap().unwrap().status, "success");
    }
}
