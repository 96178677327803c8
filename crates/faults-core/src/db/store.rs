//! Record-level reads and writes against the faults store.
//!
//! These are the storage collaborator's primitives: create/read/update/destroy
//! for apps, deploys, problems, errs, notices, and comments, plus the two
//! recency queries cache recomputation depends on (notices of a problem
//! newest-first, most recent deploy for an app and environment).
//!
//! Every function takes a shared `&Connection` so it composes inside a
//! caller-managed transaction. None of them touch cached problem fields
//! except [`insert_problem`] and [`write_cache`].

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{
    App, AppId, Deploy, ErrId, ErrRecord, NewNotice, Notice, NoticeId, Problem, ProblemCache,
    ProblemId,
};

// ---------------------------------------------------------------------------
// Timestamp and integer conversions
// ---------------------------------------------------------------------------

/// Microseconds since the Unix epoch, the storage form of every timestamp.
#[must_use]
pub fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn micros_to_datetime(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {micros}us out of range").into(),
        )
    })
}

/// `at` as it will read back from the store.
fn stored_time(at: DateTime<Utc>) -> rusqlite::Result<DateTime<Utc>> {
    micros_to_datetime(0, to_micros(at))
}

fn column_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    micros_to_datetime(idx, row.get(idx)?)
}

fn column_opt_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|micros| micros_to_datetime(idx, micros))
        .transpose()
}

fn column_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn count_param(count: u64) -> rusqlite::Result<i64> {
    i64::try_from(count).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn query_count(conn: &Connection, sql: &str, id: i64) -> rusqlite::Result<u64> {
    conn.query_row(sql, params![id], |row| column_count(row, 0))
}

// ---------------------------------------------------------------------------
// Apps and deploys
// ---------------------------------------------------------------------------

fn row_to_app(row: &Row<'_>) -> rusqlite::Result<App> {
    Ok(App {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: column_datetime(row, 2)?,
    })
}

/// Register a new app.
///
/// # Errors
///
/// Returns an error if the name is blank or already taken.
pub fn create_app(conn: &Connection, name: &str) -> rusqlite::Result<App> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO apps (name, created_at_us) VALUES (?1, ?2)",
        params![name, to_micros(created_at)],
    )?;
    let id = AppId(conn.last_insert_rowid());
    get_app(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Fetch an app by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_app(conn: &Connection, id: AppId) -> rusqlite::Result<Option<App>> {
    conn.query_row(
        "SELECT app_id, name, created_at_us FROM apps WHERE app_id = ?1",
        params![id],
        row_to_app,
    )
    .optional()
}

/// Fetch an app by its unique name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_app_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<App>> {
    conn.query_row(
        "SELECT app_id, name, created_at_us FROM apps WHERE name = ?1",
        params![name],
        row_to_app,
    )
    .optional()
}

/// Record a deploy of `app_id` to `environment`, at `at` or now.
///
/// # Errors
///
/// Returns an error if the app does not exist or the insert fails.
pub fn record_deploy(
    conn: &Connection,
    app_id: AppId,
    environment: &str,
    revision: Option<&str>,
    at: Option<DateTime<Utc>>,
) -> rusqlite::Result<Deploy> {
    let created_at = stored_time(at.unwrap_or_else(Utc::now))?;
    conn.execute(
        "INSERT INTO deploys (app_id, environment, revision, created_at_us) \
         VALUES (?1, ?2, ?3, ?4)",
        params![app_id, environment, revision, to_micros(created_at)],
    )?;
    Ok(Deploy {
        app_id,
        environment: environment.to_string(),
        revision: revision.map(str::to_string),
        created_at,
    })
}

/// Creation time of the most recent deploy of `app_id` to `environment`.
///
/// A problem with no cached environment has no matching deploy.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_deploy_at(
    conn: &Connection,
    app_id: AppId,
    environment: Option<&str>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(environment) = environment else {
        return Ok(None);
    };
    conn.query_row(
        "SELECT MAX(created_at_us) FROM deploys WHERE app_id = ?1 AND environment = ?2",
        params![app_id, environment],
        |row| column_opt_datetime(row, 0),
    )
}

// ---------------------------------------------------------------------------
// Problems
// ---------------------------------------------------------------------------

pub(crate) const PROBLEM_COLUMNS: &str = "p.problem_id, p.app_id, p.resolved, p.issue_link, \
     p.app_name, p.notices_count, p.message, p.environment, p.klass, p.location, \
     p.notice_log, p.last_notice_at_us, p.last_deploy_at_us, p.created_at_us, p.updated_at_us";

pub(crate) fn row_to_problem(row: &Row<'_>) -> rusqlite::Result<Problem> {
    Ok(Problem {
        id: row.get(0)?,
        app_id: row.get(1)?,
        resolved: row.get(2)?,
        issue_link: row.get(3)?,
        cache: ProblemCache {
            app_name: row.get(4)?,
            notices_count: column_count(row, 5)?,
            message: row.get(6)?,
            environment: row.get(7)?,
            klass: row.get(8)?,
            location: row.get(9)?,
            notice_log: row.get(10)?,
            last_notice_at: column_opt_datetime(row, 11)?,
            last_deploy_at: column_opt_datetime(row, 12)?,
        },
        created_at: column_datetime(row, 13)?,
        updated_at: column_datetime(row, 14)?,
    })
}

/// Insert a problem row carrying an already computed cache.
///
/// # Errors
///
/// Returns an error if the app does not exist or the insert fails.
pub fn insert_problem(
    conn: &Connection,
    app_id: AppId,
    cache: &ProblemCache,
) -> rusqlite::Result<Problem> {
    let now = to_micros(Utc::now());
    conn.execute(
        "INSERT INTO problems (
            app_id, resolved, app_name, notices_count, message, environment, klass,
            location, notice_log, last_notice_at_us, last_deploy_at_us,
            created_at_us, updated_at_us
        ) VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            app_id,
            cache.app_name,
            count_param(cache.notices_count)?,
            cache.message,
            cache.environment,
            cache.klass,
            cache.location,
            cache.notice_log,
            cache.last_notice_at.map(to_micros),
            cache.last_deploy_at.map(to_micros),
            now,
        ],
    )?;
    let id = ProblemId(conn.last_insert_rowid());
    get_problem(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Fetch a problem by id.
///
/// # Errors
///
/// Returns an error if the query fails or a cached column is corrupt.
pub fn get_problem(conn: &Connection, id: ProblemId) -> rusqlite::Result<Option<Problem>> {
    let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems p WHERE p.problem_id = ?1");
    conn.query_row(&sql, params![id], row_to_problem).optional()
}

/// Ids of every problem, optionally restricted to one app, in id order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn problem_ids(conn: &Connection, app_id: Option<AppId>) -> rusqlite::Result<Vec<ProblemId>> {
    let mut stmt = conn.prepare(
        "SELECT problem_id FROM problems \
         WHERE ?1 IS NULL OR app_id = ?1 \
         ORDER BY problem_id ASC",
    )?;
    let rows = stmt.query_map(params![app_id], |row| row.get(0))?;
    rows.collect()
}

/// Apply a whole cache value to a problem in one statement.
///
/// Returns the number of rows updated (0 when the problem is gone).
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn write_cache(
    conn: &Connection,
    id: ProblemId,
    cache: &ProblemCache,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE problems SET
            app_name = ?2,
            notices_count = ?3,
            message = ?4,
            environment = ?5,
            klass = ?6,
            location = ?7,
            notice_log = ?8,
            last_notice_at_us = ?9,
            last_deploy_at_us = ?10,
            updated_at_us = ?11
         WHERE problem_id = ?1",
        params![
            id,
            cache.app_name,
            count_param(cache.notices_count)?,
            cache.message,
            cache.environment,
            cache.klass,
            cache.location,
            cache.notice_log,
            cache.last_notice_at.map(to_micros),
            cache.last_deploy_at.map(to_micros),
            to_micros(Utc::now()),
        ],
    )
}

/// Set the resolved flag. Returns the number of rows updated.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_resolved(conn: &Connection, id: ProblemId, resolved: bool) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE problems SET resolved = ?2, updated_at_us = ?3 WHERE problem_id = ?1",
        params![id, resolved, to_micros(Utc::now())],
    )
}

/// Attach (or clear) the external issue link. Returns the number of rows updated.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_issue_link(
    conn: &Connection,
    id: ProblemId,
    issue_link: Option<&str>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE problems SET issue_link = ?2, updated_at_us = ?3 WHERE problem_id = ?1",
        params![id, issue_link, to_micros(Utc::now())],
    )
}

/// Destroy a problem, cascading to its errs and comments.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_problem(conn: &Connection, id: ProblemId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM problems WHERE problem_id = ?1", params![id])
}

// ---------------------------------------------------------------------------
// Errs
// ---------------------------------------------------------------------------

fn row_to_err(row: &Row<'_>) -> rusqlite::Result<ErrRecord> {
    Ok(ErrRecord {
        id: row.get(0)?,
        problem_id: row.get(1)?,
        app_id: row.get(2)?,
        fingerprint: row.get(3)?,
        created_at: column_datetime(row, 4)?,
    })
}

/// Create an err owned by `problem_id`.
///
/// # Errors
///
/// Returns an error if the problem or app does not exist.
pub fn insert_err(
    conn: &Connection,
    problem_id: ProblemId,
    app_id: AppId,
    fingerprint: &str,
) -> rusqlite::Result<ErrRecord> {
    conn.execute(
        "INSERT INTO errs (problem_id, app_id, fingerprint, created_at_us) \
         VALUES (?1, ?2, ?3, ?4)",
        params![problem_id, app_id, fingerprint, to_micros(Utc::now())],
    )?;
    let id = ErrId(conn.last_insert_rowid());
    get_err(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Fetch an err by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_err(conn: &Connection, id: ErrId) -> rusqlite::Result<Option<ErrRecord>> {
    conn.query_row(
        "SELECT err_id, problem_id, app_id, fingerprint, created_at_us \
         FROM errs WHERE err_id = ?1",
        params![id],
        row_to_err,
    )
    .optional()
}

/// Errs owned by a problem, in creation order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn errs_for_problem(
    conn: &Connection,
    problem_id: ProblemId,
) -> rusqlite::Result<Vec<ErrRecord>> {
    let mut stmt = conn.prepare(
        "SELECT err_id, problem_id, app_id, fingerprint, created_at_us \
         FROM errs WHERE problem_id = ?1 ORDER BY err_id ASC",
    )?;
    let rows = stmt.query_map(params![problem_id], row_to_err)?;
    rows.collect()
}

/// Number of errs owned by a problem.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn err_count(conn: &Connection, problem_id: ProblemId) -> rusqlite::Result<u64> {
    query_count(
        conn,
        "SELECT COUNT(*) FROM errs WHERE problem_id = ?1",
        problem_id.0,
    )
}

/// Move every err of `from` to `to`. Returns the number of errs moved.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn reassign_errs(
    conn: &Connection,
    from: ProblemId,
    to: ProblemId,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE errs SET problem_id = ?2 WHERE problem_id = ?1",
        params![from, to],
    )
}

/// Move a single err to `to`. Returns the number of rows updated.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn reassign_err(conn: &Connection, err_id: ErrId, to: ProblemId) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE errs SET problem_id = ?2 WHERE err_id = ?1",
        params![err_id, to],
    )
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

const NOTICE_COLUMNS: &str = "n.notice_id, n.err_id, n.message, n.environment_name, n.klass, \
     n.location, n.host, n.user_agent, n.created_at_us";

fn row_to_notice(row: &Row<'_>) -> rusqlite::Result<Notice> {
    Ok(Notice {
        id: row.get(0)?,
        err_id: row.get(1)?,
        message: row.get(2)?,
        environment_name: row.get(3)?,
        klass: row.get(4)?,
        location: row.get(5)?,
        host: row.get(6)?,
        user_agent: row.get(7)?,
        created_at: column_datetime(row, 8)?,
    })
}

/// Store a notice under `err_id`, stamped now unless the payload carries a time.
///
/// # Errors
///
/// Returns an error if the err does not exist or the insert fails.
pub fn insert_notice(
    conn: &Connection,
    err_id: ErrId,
    notice: &NewNotice,
) -> rusqlite::Result<Notice> {
    let created_at = stored_time(notice.created_at.unwrap_or_else(Utc::now))?;
    conn.execute(
        "INSERT INTO notices (
            err_id, message, environment_name, klass, location, host, user_agent, created_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            err_id,
            notice.message,
            notice.environment_name,
            notice.klass,
            notice.location,
            notice.host,
            notice.user_agent,
            to_micros(created_at),
        ],
    )?;
    Ok(Notice {
        id: NoticeId(conn.last_insert_rowid()),
        err_id,
        message: notice.message.clone(),
        environment_name: notice.environment_name.clone(),
        klass: notice.klass.clone(),
        location: notice.location.clone(),
        host: notice.host.clone(),
        user_agent: notice.user_agent.clone(),
        created_at,
    })
}

/// Fetch a notice by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_notice(conn: &Connection, id: NoticeId) -> rusqlite::Result<Option<Notice>> {
    let sql = format!("SELECT {NOTICE_COLUMNS} FROM notices n WHERE n.notice_id = ?1");
    conn.query_row(&sql, params![id], row_to_notice).optional()
}

/// Notices across all errs of a problem, most recent first.
///
/// Ties on creation time fall back to the later insert first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_notices(
    conn: &Connection,
    problem_id: ProblemId,
    limit: Option<usize>,
) -> rusqlite::Result<Vec<Notice>> {
    let limit = limit
        .map(i64::try_from)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
        .unwrap_or(-1);
    let sql = format!(
        "SELECT {NOTICE_COLUMNS} FROM notices n \
         INNER JOIN errs e ON e.err_id = n.err_id \
         WHERE e.problem_id = ?1 \
         ORDER BY n.created_at_us DESC, n.notice_id DESC \
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![problem_id, limit], row_to_notice)?;
    rows.collect()
}

/// Total notices across all errs of a problem.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn notice_count(conn: &Connection, problem_id: ProblemId) -> rusqlite::Result<u64> {
    query_count(
        conn,
        "SELECT COUNT(*) FROM notices n \
         INNER JOIN errs e ON e.err_id = n.err_id \
         WHERE e.problem_id = ?1",
        problem_id.0,
    )
}

/// Number of notices stored under one err.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn err_notice_count(conn: &Connection, err_id: ErrId) -> rusqlite::Result<u64> {
    query_count(
        conn,
        "SELECT COUNT(*) FROM notices WHERE err_id = ?1",
        err_id.0,
    )
}

/// Latest notice creation time across all errs of a problem.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_notice_at(
    conn: &Connection,
    problem_id: ProblemId,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    conn.query_row(
        "SELECT MAX(n.created_at_us) FROM notices n \
         INNER JOIN errs e ON e.err_id = n.err_id \
         WHERE e.problem_id = ?1",
        params![problem_id],
        |row| column_opt_datetime(row, 0),
    )
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Attach a comment to a problem. Returns the comment id.
///
/// # Errors
///
/// Returns an error if the problem does not exist.
pub fn add_comment(
    conn: &Connection,
    problem_id: ProblemId,
    author: &str,
    body: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO problem_comments (problem_id, author, body, created_at_us) \
         VALUES (?1, ?2, ?3, ?4)",
        params![problem_id, author, body, to_micros(Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Number of comments attached to a problem.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn comment_count(conn: &Connection, problem_id: ProblemId) -> rusqlite::Result<u64> {
    query_count(
        conn,
        "SELECT COUNT(*) FROM problem_comments WHERE problem_id = ?1",
        problem_id.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn notice(message: &str, minute: u32) -> NewNotice {
        NewNotice {
            message: message.to_string(),
            environment_name: "production".to_string(),
            created_at: Some(at(minute)),
            ..NewNotice::default()
        }
    }

    #[test]
    fn app_names_are_unique() {
        let conn = open_in_memory().expect("db");
        create_app(&conn, "billing").expect("first app");
        assert!(create_app(&conn, "billing").is_err());
        assert!(find_app_by_name(&conn, "billing").expect("query").is_some());
        assert!(find_app_by_name(&conn, "shipping").expect("query").is_none());
    }

    #[test]
    fn latest_deploy_is_scoped_to_environment() {
        let conn = open_in_memory().expect("db");
        let app = create_app(&conn, "billing").expect("app");
        record_deploy(&conn, app.id, "production", Some("abc123"), Some(at(1))).expect("deploy");
        record_deploy(&conn, app.id, "production", None, Some(at(7))).expect("deploy");
        record_deploy(&conn, app.id, "staging", None, Some(at(9))).expect("deploy");

        assert_eq!(
            latest_deploy_at(&conn, app.id, Some("production")).expect("query"),
            Some(at(7))
        );
        assert_eq!(
            latest_deploy_at(&conn, app.id, Some("development")).expect("query"),
            None
        );
        assert_eq!(latest_deploy_at(&conn, app.id, None).expect("query"), None);
    }

    #[test]
    fn recent_notices_span_all_errs_newest_first() {
        let conn = open_in_memory().expect("db");
        let app = create_app(&conn, "billing").expect("app");
        let problem = insert_problem(&conn, app.id, &ProblemCache::default()).expect("problem");
        let first = insert_err(&conn, problem.id, app.id, "a").expect("err");
        let second = insert_err(&conn, problem.id, app.id, "b").expect("err");

        insert_notice(&conn, first.id, &notice("one", 0)).expect("notice");
        insert_notice(&conn, second.id, &notice("two", 2)).expect("notice");
        insert_notice(&conn, first.id, &notice("three", 5)).expect("notice");

        let messages: Vec<String> = recent_notices(&conn, problem.id, None)
            .expect("query")
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, vec!["three", "two", "one"]);

        assert_eq!(recent_notices(&conn, problem.id, Some(1)).expect("query").len(), 1);
        assert_eq!(notice_count(&conn, problem.id).expect("count"), 3);
        assert_eq!(err_notice_count(&conn, first.id).expect("count"), 2);
        assert_eq!(latest_notice_at(&conn, problem.id).expect("max"), Some(at(5)));
    }

    #[test]
    fn delete_problem_cascades_errs_notices_and_comments() {
        let conn = open_in_memory().expect("db");
        let app = create_app(&conn, "billing").expect("app");
        let problem = insert_problem(&conn, app.id, &ProblemCache::default()).expect("problem");
        let err = insert_err(&conn, problem.id, app.id, "a").expect("err");
        let stored = insert_notice(&conn, err.id, &notice("one", 0)).expect("notice");
        add_comment(&conn, problem.id, "ops", "seen in prod").expect("comment");

        assert_eq!(delete_problem(&conn, problem.id).expect("delete"), 1);
        assert!(get_err(&conn, err.id).expect("query").is_none());
        assert!(get_notice(&conn, stored.id).expect("query").is_none());
        assert_eq!(comment_count(&conn, problem.id).expect("count"), 0);
    }

    #[test]
    fn write_cache_round_trips_every_cached_column() {
        let conn = open_in_memory().expect("db");
        let app = create_app(&conn, "billing").expect("app");
        let problem = insert_problem(&conn, app.id, &ProblemCache::default()).expect("problem");

        let cache = ProblemCache {
            app_name: "billing".to_string(),
            notices_count: 12,
            message: Some("undefined method".to_string()),
            environment: Some("production".to_string()),
            klass: Some("NoMethodError".to_string()),
            location: Some("app/models/user.rb:42".to_string()),
            notice_log: crate::model::NoticeLog::default(),
            last_notice_at: Some(at(30)),
            last_deploy_at: Some(at(3)),
        };
        assert_eq!(write_cache(&conn, problem.id, &cache).expect("write"), 1);

        let stored = get_problem(&conn, problem.id).expect("query").expect("exists");
        assert_eq!(stored.cache, cache);
        assert!(!stored.resolved);
    }
}
