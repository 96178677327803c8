use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Directory holding project-level state and configuration.
pub const FAULTS_DIR: &str = ".faults";

/// Environment variable overriding the database location.
pub const DB_ENV_VAR: &str = "FAULTS_DB";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Tuning for cached problem aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Newest notices kept in a problem's cached message/host/user-agent log.
    /// Zero keeps every notice.
    #[serde(default = "default_notice_log_limit")]
    pub notice_log_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            notice_log_limit: default_notice_log_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file, relative paths resolved against the project root.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Per-user preferences from `<config dir>/faults/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Default output format: `human` or `json`.
    #[serde(default)]
    pub output: Option<String>,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(FAULTS_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("faults/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Whether JSON output is wanted: the `--json` flag wins, then `FORMAT`,
/// then the user config's `output`.
///
/// # Errors
///
/// Returns an error if the chosen setting names an unknown format.
pub fn resolve_json_output(cli_json: bool, user: &UserConfig) -> Result<bool> {
    let env_format = env::var("FORMAT").ok();
    resolve_json_output_inner(cli_json, user.output.as_deref(), env_format.as_deref())
}

fn resolve_json_output_inner(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> Result<bool> {
    if cli_json {
        return Ok(true);
    }
    let Some(raw) = env_format.or(user_output) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(true),
        "human" | "pretty" | "text" => Ok(false),
        other => anyhow::bail!("unknown output format '{other}' (expected human or json)"),
    }
}

/// Resolve the database file.
///
/// Precedence: explicit flag, then `FAULTS_DB`, then `database.path` from
/// the project config, then `.faults/faults.sqlite3`.
pub fn resolve_db_path(
    project_root: &Path,
    config: &ProjectConfig,
    flag: Option<&Path>,
) -> PathBuf {
    let env_path = env::var_os(DB_ENV_VAR).map(PathBuf::from);
    resolve_db_path_inner(project_root, config, flag, env_path)
}

fn resolve_db_path_inner(
    project_root: &Path,
    config: &ProjectConfig,
    flag: Option<&Path>,
    env_path: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }

    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }

    if let Some(ref path) = config.database.path {
        if path.is_absolute() {
            return path.clone();
        }
        return project_root.join(path);
    }

    project_root.join(FAULTS_DIR).join("faults.sqlite3")
}

const fn default_notice_log_limit() -> usize {
    50
}
