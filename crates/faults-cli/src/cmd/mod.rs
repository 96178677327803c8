//! Subcommand handlers. Each `run_*` receives its parsed args and a
//! [`Context`] describing where the project and database live.

pub mod app;
pub mod deploy;
pub mod err;
pub mod init;
pub mod list;
pub mod merge;
pub mod notice;
pub mod repair;
pub mod resolve;
pub mod show;

use crate::output::OutputMode;
use anyhow::{Context as _, Result};
use faults_core::ProblemManager;
use faults_core::config::{self, ProjectConfig};
use faults_core::db::{self, store};
use faults_core::model::{App, AppId};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Invocation-wide settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_root: PathBuf,
    pub db_flag: Option<PathBuf>,
    pub output: OutputMode,
}

/// An open database plus the project configuration it was resolved from.
pub struct Store {
    pub conn: Connection,
    pub config: ProjectConfig,
    pub path: PathBuf,
}

impl Context {
    pub fn config(&self) -> Result<ProjectConfig> {
        config::load_project_config(&self.project_root)
    }

    pub fn db_path(&self, config: &ProjectConfig) -> PathBuf {
        config::resolve_db_path(&self.project_root, config, self.db_flag.as_deref())
    }

    /// Open (creating and migrating if needed) the project database.
    pub fn open(&self) -> Result<Store> {
        let config = self.config()?;
        let path = self.db_path(&config);
        debug!(path = %path.display(), "opening database");
        let conn = db::open_database(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Store { conn, config, path })
    }
}

impl Store {
    pub fn manager(&self) -> ProblemManager<'_> {
        ProblemManager::new(&self.conn, self.config.cache)
    }
}

/// Resolve an app given by name or numeric id.
pub fn resolve_app(conn: &Connection, name_or_id: &str) -> Result<App> {
    if let Some(app) = store::find_app_by_name(conn, name_or_id)? {
        return Ok(app);
    }
    if let Ok(id) = name_or_id.parse::<AppId>() {
        if let Some(app) = store::get_app(conn, id)? {
            return Ok(app);
        }
        return Err(faults_core::ProblemError::AppNotFound(id).into());
    }
    anyhow::bail!("app '{name_or_id}' not found; create it with `flt app create {name_or_id}`")
}

/// Display path relative to the project root when possible.
pub fn display_path(project_root: &Path, path: &Path) -> String {
    path.strip_prefix(project_root)
        .unwrap_or(path)
        .display()
        .to_string()
}
