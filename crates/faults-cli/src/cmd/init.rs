use super::{Context, display_path};
use crate::output::{pretty_kv, render};
use anyhow::{Context as _, Result};
use clap::Args;
use faults_core::config::FAULTS_DIR;
use faults_core::db::migrations::current_schema_version;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.faults/config.toml` with the defaults.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[cache]\n\
    # Newest notices kept in each problem's message/host/user-agent log (0 = all).\n\
    notice_log_limit = 50\n\
    \n\
    [database]\n\
    # path = \"faults.sqlite3\"\n";

const GITIGNORE: &str = "*.sqlite3\n*.sqlite3-wal\n*.sqlite3-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    config: String,
    database: String,
    schema_version: u32,
    wrote_config: bool,
}

/// Execute `flt init`. Creates the project skeleton and the database:
///
/// ```text
/// .faults/
///   config.toml
///   .gitignore
///   faults.sqlite3   (unless configured elsewhere)
/// ```
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    let faults_dir = ctx.project_root.join(FAULTS_DIR);
    std::fs::create_dir_all(&faults_dir)
        .with_context(|| format!("Failed to create {}", faults_dir.display()))?;

    let config_path = faults_dir.join("config.toml");
    let wrote_config = args.force || !config_path.exists();
    if wrote_config {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    }

    let gitignore_path = faults_dir.join(".gitignore");
    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, GITIGNORE)
            .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;
    }

    let store = ctx.open()?;
    let report = InitOutput {
        config: display_path(&ctx.project_root, &config_path),
        database: display_path(&ctx.project_root, &store.path),
        schema_version: current_schema_version(&store.conn)?,
        wrote_config,
    };

    render(ctx.output, &report, |r, w| {
        writeln!(w, "✓ Initialized {FAULTS_DIR}/")?;
        pretty_kv(w, "Config", &r.config)?;
        pretty_kv(w, "Database", &r.database)?;
        pretty_kv(w, "Schema", r.schema_version.to_string())?;
        writeln!(w)?;
        writeln!(w, "Next: flt app create <name>")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;
    use faults_core::config::load_project_config;

    fn ctx(root: &std::path::Path) -> Context {
        Context {
            project_root: root.to_path_buf(),
            db_flag: None,
            output: OutputMode::Json,
        }
    }

    #[test]
    fn default_config_template_parses() {
        let cfg: faults_core::config::ProjectConfig =
            toml::from_str(CONFIG_TOML).expect("template parses");
        assert_eq!(cfg.cache.notice_log_limit, 50);
        assert!(cfg.database.path.is_none());
    }

    #[test]
    fn init_creates_config_and_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&InitArgs { force: false }, &ctx(dir.path())).expect("init");

        assert!(dir.path().join(".faults/config.toml").exists());
        assert!(dir.path().join(".faults/faults.sqlite3").exists());
        assert_eq!(
            load_project_config(dir.path()).expect("config").cache.notice_log_limit,
            50
        );
    }

    #[test]
    fn init_keeps_existing_config_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let faults_dir = dir.path().join(FAULTS_DIR);
        std::fs::create_dir_all(&faults_dir).expect("mkdir");
        std::fs::write(faults_dir.join("config.toml"), "[cache]\nnotice_log_limit = 3\n")
            .expect("write");

        run_init(&InitArgs { force: false }, &ctx(dir.path())).expect("init");
        assert_eq!(
            load_project_config(dir.path()).expect("config").cache.notice_log_limit,
            3
        );

        run_init(&InitArgs { force: true }, &ctx(dir.path())).expect("reinit");
        assert_eq!(
            load_project_config(dir.path()).expect("config").cache.notice_log_limit,
            50
        );
    }
}
