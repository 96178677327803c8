//! Versioned schema for the problem store.
//!
//! The applied version lives in `PRAGMA user_version` and is mirrored into
//! `store_meta.schema_version` for tools that only read tables.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Schema version written by this build.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// One schema step: the version it produces and the DDL that gets there.
struct Step {
    version: u32,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    // apps, deploys, problems, errs, notices, comments
    Step {
        version: 1,
        sql: schema::MIGRATION_V1_SQL,
    },
    // listing and cache-recompute indexes
    Step {
        version: 2,
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema version the store reports, 0 for a brand new file.
///
/// # Errors
///
/// Fails if the pragma cannot be read or holds a negative value.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))
}

/// Bring the store up to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at. Each step commits on its own, so a failed step leaves the
/// store at the previous version.
///
/// # Errors
///
/// Fails if any step's DDL or the version bookkeeping is rejected.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let start = current_schema_version(conn)?;
    let mut at = start;

    for step in STEPS.iter().filter(|step| step.version > start) {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", i64::from(step.version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(step.version)],
        )?;
        tx.commit()?;
        tracing::debug!(from = at, to = step.version, "migrated problem store");
        at = step.version;
    }

    Ok(at)
}
