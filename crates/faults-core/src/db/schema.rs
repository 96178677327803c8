//! Canonical SQLite schema for the faults store.
//!
//! - `apps` and `deploys` are the app collaborator and its deploy history
//! - `problems` holds identity/state plus every cached aggregate column
//! - `errs` reference their owning problem; `notices` reference their err
//! - destroying a problem cascades to its errs (expected empty) and comments

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS apps (
    app_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS deploys (
    deploy_id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id INTEGER NOT NULL REFERENCES apps(app_id) ON DELETE CASCADE,
    environment TEXT NOT NULL,
    revision TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS problems (
    problem_id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id INTEGER NOT NULL REFERENCES apps(app_id) ON DELETE CASCADE,
    resolved INTEGER NOT NULL DEFAULT 0 CHECK (resolved IN (0, 1)),
    issue_link TEXT,
    app_name TEXT NOT NULL DEFAULT '',
    notices_count INTEGER NOT NULL DEFAULT 0 CHECK (notices_count >= 0),
    message TEXT,
    environment TEXT,
    klass TEXT,
    location TEXT,
    notice_log TEXT NOT NULL DEFAULT '[]',
    last_notice_at_us INTEGER,
    last_deploy_at_us INTEGER,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS errs (
    err_id INTEGER PRIMARY KEY AUTOINCREMENT,
    problem_id INTEGER NOT NULL REFERENCES problems(problem_id) ON DELETE CASCADE,
    app_id INTEGER NOT NULL REFERENCES apps(app_id) ON DELETE CASCADE,
    fingerprint TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notices (
    notice_id INTEGER PRIMARY KEY AUTOINCREMENT,
    err_id INTEGER NOT NULL REFERENCES errs(err_id) ON DELETE CASCADE,
    message TEXT NOT NULL DEFAULT '',
    environment_name TEXT NOT NULL DEFAULT '',
    klass TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    host TEXT NOT NULL DEFAULT '',
    user_agent TEXT NOT NULL DEFAULT '',
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS problem_comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    problem_id INTEGER NOT NULL REFERENCES problems(problem_id) ON DELETE CASCADE,
    author TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes for sorting, filtering, and membership lookups.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_problems_app
    ON problems(app_id);

CREATE INDEX IF NOT EXISTS idx_problems_app_name
    ON problems(app_name);

CREATE INDEX IF NOT EXISTS idx_problems_message
    ON problems(message);

CREATE INDEX IF NOT EXISTS idx_problems_last_notice
    ON problems(last_notice_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_problems_last_deploy
    ON problems(last_deploy_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_problems_notices_count
    ON problems(notices_count);

CREATE INDEX IF NOT EXISTS idx_problems_resolved_env
    ON problems(resolved, environment);

CREATE INDEX IF NOT EXISTS idx_errs_problem
    ON errs(problem_id, err_id);

CREATE INDEX IF NOT EXISTS idx_notices_err_created
    ON notices(err_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_deploys_app_env_created
    ON deploys(app_id, environment, created_at_us DESC);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by list/filter and cache recomputation query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_problems_app",
    "idx_problems_app_name",
    "idx_problems_message",
    "idx_problems_last_notice",
    "idx_problems_last_deploy",
    "idx_problems_notices_count",
    "idx_problems_resolved_env",
    "idx_errs_problem",
    "idx_notices_err_created",
    "idx_deploys_app_env_created",
];
