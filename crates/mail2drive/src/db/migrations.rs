//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_rules_table",
        sql: include_str!("sql/001_create_rules.sql"),
    },
    Migration {
        version: 2,
        description: "create_processed_messages_table",
        sql: include_str!("sql/002_create_processed_messages.sql"),
    },
    Migration {
        version: 3,
        description: "create_runs_table",
        sql: include_str!("sql/003_create_runs.sql"),
    },
    Migration {
        version: 4,
        description: "create_google_connections_table",
        sql: include_str!("sql/004_create_google_connections.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = migrated();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = migrated();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table)).unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_runs_table_columns() {
        let conn = migrated();
        let cols = columns(&conn, "runs");
        for expected in ["status", "error_code", "error_step", "processed_count", "saved_count", "finished_at"] {
            assert!(cols.iter().any(|c| c == expected), "runs is missing {}", expected);
        }
    }

    #[test]
    fn test_processed_messages_unique_per_rule() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO rules (id, user_id, created_at, updated_at) VALUES ('r1', 'u1', 't', 't');
             INSERT INTO processed_messages (id, rule_id, user_id, message_id, claimed_at)
             VALUES ('p1', 'r1', 'u1', 'm1', 't');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO processed_messages (id, rule_id, user_id, message_id, claimed_at)
             VALUES ('p2', 'r1', 'u1', 'm1', 't')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_runs_reject_saved_above_processed() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO rules (id, user_id, created_at, updated_at) VALUES ('r1', 'u1', 't', 't');",
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO runs (id, rule_id, user_id, trigger, processed_count, saved_count, started_at)
             VALUES ('x', 'r1', 'u1', 'manual', 1, 2, 't')",
            [],
        );
        assert!(bad.is_err());
    }
}
