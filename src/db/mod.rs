pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection-scoped pragmas must run on every pooled connection
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// `BEGIN IMMEDIATE`: take the write lock before the first read so concurrent
/// read-then-write transactions wait on `busy_timeout` instead of failing.
pub fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Column named by a `UNIQUE constraint failed: table.column` error, if any.
pub fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            msg.strip_prefix("UNIQUE constraint failed: ")
        }
        _ => None,
    }
}

/// Build a `?1, ?2, ...` placeholder list for an `IN (...)` clause.
pub fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated_pool() -> (tempfile::TempDir, DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("test.db")).unwrap();
        run_migrations(&pool).unwrap();
        (tmp, pool)
    }

    #[test]
    fn unique_violation_names_the_column() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'a', '010')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'b', '010')",
                [],
            )
            .unwrap_err();
        assert_eq!(unique_violation(&err), Some("users.phone"));
        assert_eq!(unique_violation(&rusqlite::Error::QueryReturnedNoRows), None);
    }

    #[test]
    fn write_tx_serializes_writers() {
        let (_tmp, pool) = migrated_pool();
        let mut a = pool.get().unwrap();
        let tx = write_tx(&mut a).unwrap();
        tx.execute(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'a', '010')",
            [],
        )
        .unwrap();
        tx.commit().unwrap();

        let b = pool.get().unwrap();
        let count: i64 = b
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn every_connection_enforces_foreign_keys() {
        let (_tmp, pool) = migrated_pool();
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        for conn in [&a, &b] {
            let on: i64 = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert_eq!(on, 1);
        }
    }

    #[test]
    fn migrations_create_all_tables() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<rusqlite::Result<_>>()
                .unwrap()
        };
        for table in [
            "users",
            "user_settings",
            "user_follows",
            "posts",
            "post_images",
            "comments",
            "likes",
            "stories",
            "story_views",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let (_tmp, pool) = migrated_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn duplicate_phone_is_rejected_by_schema() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'a', '01011112222')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'b', '01011112222')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn self_follow_is_rejected_by_schema() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (signup_mode, username, phone) VALUES ('phone', 'a', '010')",
            [],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        let result = conn.execute(
            "INSERT INTO user_follows (follower_id, followee_id) VALUES (?1, ?1)",
            params![id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn placeholders_are_numbered() {
        assert_eq!(placeholders(3), "?1, ?2, ?3");
        assert_eq!(placeholders(0), "");
    }
}
