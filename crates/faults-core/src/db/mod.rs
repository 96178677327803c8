//! The problem store: one SQLite file per project.
//!
//! Destroying a problem relies on foreign keys to take its errs, notices
//! and comments with it, so every connection handed out here has them on.
//! File-backed stores additionally run in WAL mode with a busy timeout so a
//! `flt list` can read while a merge holds the write lock.

pub mod migrations;
pub mod query;
pub mod schema;
pub mod store;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// How long a writer waits on another writer's lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the project's problem store at `path`, creating the file and its
/// directory on first use, and bring the schema up to date.
///
/// # Errors
///
/// Fails when the directory or file cannot be created, or a pragma or
/// migration is rejected.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create store directory {}", dir.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;
    prepare(conn, true)
}

/// A throwaway store with the full schema; nothing touches disk.
///
/// # Errors
///
/// Fails when the schema cannot be applied.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory store")?;
    prepare(conn, false)
}

fn prepare(mut conn: Connection, on_disk: bool) -> Result<Connection> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    if on_disk {
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("set synchronous mode")?;
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("switch to WAL")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .context("set busy timeout")?;
    }
    let version = migrations::migrate(&mut conn).context("migrate problem store")?;
    tracing::debug!(version, on_disk, "problem store ready");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::db::store;
    use crate::problem::ProblemManager;

    #[test]
    fn store_file_is_created_under_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".faults/nested/faults.sqlite3");
        let conn = open_database(&path).expect("open");
        assert!(path.exists());

        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("journal_mode");
        assert!(mode.eq_ignore_ascii_case("wal"));
        let timeout_ms: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("busy_timeout");
        assert_eq!(timeout_ms, 5_000);
    }

    #[test]
    fn reopening_a_store_keeps_its_apps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("faults.sqlite3");
        {
            let conn = open_database(&path).expect("first open");
            store::create_app(&conn, "storefront").expect("app");
        }
        let conn = open_database(&path).expect("second open");
        let app = store::find_app_by_name(&conn, "storefront").expect("query");
        assert!(app.is_some());
        assert_eq!(
            migrations::current_schema_version(&conn).expect("version"),
            migrations::LATEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn deleting_a_problem_takes_its_errs_along() {
        let conn = open_in_memory().expect("store");
        let app = store::create_app(&conn, "storefront").expect("app");
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let (problem, err) = manager.open_err(app.id, "timeout").expect("open");

        store::delete_problem(&conn, problem.id).expect("delete");
        assert!(store::get_err(&conn, err.id).expect("query").is_none());
    }

    #[test]
    fn err_without_a_problem_is_rejected() {
        let conn = open_in_memory().expect("store");
        let orphan = conn.execute(
            "INSERT INTO errs (problem_id, app_id, fingerprint, created_at_us) \
             VALUES (99, 99, 'x', 0)",
            [],
        );
        assert!(orphan.is_err());
    }
}
