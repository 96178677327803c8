#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use faults_core::config;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "flt: triage grouped error problems",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Database file. Overrides `FAULTS_DB` and `.faults/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a faults project",
        after_help = "EXAMPLES:\n    # Create .faults/ with a default config and database\n    flt init"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Setup", about = "Manage apps")]
    App(cmd::app::AppArgs),

    #[command(
        next_help_heading = "Ingestion",
        about = "Record a deploy",
        after_help = "EXAMPLES:\n    flt deploy storefront --env production --revision 4f2a9c1"
    )]
    Deploy(cmd::deploy::DeployArgs),

    #[command(next_help_heading = "Ingestion", about = "Manage errs")]
    Err(cmd::err::ErrArgs),

    #[command(
        next_help_heading = "Ingestion",
        about = "Record one error occurrence",
        after_help = "EXAMPLES:\n    flt notice 12 --message \"undefined method\" --class NoMethodError --host web-1\n\n    # Read the notice as JSON\n    echo '{\"message\":\"boom\"}' | flt notice 12 --stdin"
    )]
    Notice(cmd::notice::NoticeArgs),

    #[command(
        next_help_heading = "Read",
        about = "List problems",
        after_help = "EXAMPLES:\n    # Most recently seen first (default)\n    flt list\n\n    # Noisiest unresolved problems in production\n    flt list --unresolved --env production --sort count"
    )]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Read", about = "Show one problem")]
    Show(cmd::show::ShowArgs),

    #[command(next_help_heading = "Triage", about = "Mark problems resolved")]
    Resolve(cmd::resolve::ResolveArgs),

    #[command(next_help_heading = "Triage", about = "Mark problems unresolved")]
    Unresolve(cmd::resolve::ResolveArgs),

    #[command(
        next_help_heading = "Triage",
        about = "Merge problems into the first one listed",
        after_help = "EXAMPLES:\n    flt merge 4 9 11"
    )]
    Merge(cmd::merge::MergeArgs),

    #[command(
        next_help_heading = "Triage",
        about = "Split a merged problem, one problem per err"
    )]
    Unmerge(cmd::merge::UnmergeArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Recompute cached problem attributes"
    )]
    Repair(cmd::repair::RepairArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FAULTS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "faults=debug,info"
        } else {
            "faults=info,warn"
        })
    });

    let format = env::var("FAULTS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, ctx: &cmd::Context) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, ctx),
        Commands::App(ref args) => cmd::app::run_app(args, ctx),
        Commands::Deploy(ref args) => cmd::deploy::run_deploy(args, ctx),
        Commands::Err(ref args) => cmd::err::run_err(args, ctx),
        Commands::Notice(ref args) => cmd::notice::run_notice(args, ctx),
        Commands::List(ref args) => cmd::list::run_list(args, ctx),
        Commands::Show(ref args) => cmd::show::run_show(args, ctx),
        Commands::Resolve(ref args) => cmd::resolve::run_resolve(args, ctx),
        Commands::Unresolve(ref args) => cmd::resolve::run_unresolve(args, ctx),
        Commands::Merge(ref args) => cmd::merge::run_merge(args, ctx),
        Commands::Unmerge(ref args) => cmd::merge::run_unmerge(args, ctx),
        Commands::Repair(ref args) => cmd::repair::run_repair(args, ctx),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        debug!("verbose mode enabled");
    }

    let prepared = config::load_user_config()
        .and_then(|user| config::resolve_json_output(cli.json, &user))
        .and_then(|json| Ok((json, env::current_dir()?)));
    let (json, project_root) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => {
            let _ = render_error(OutputMode::from_json_flag(cli.json), &CliError::from(&err));
            return ExitCode::FAILURE;
        }
    };

    let ctx = cmd::Context {
        project_root,
        db_flag: cli.db.clone(),
        output: OutputMode::from_json_flag(json),
    };

    match run(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = render_error(ctx.output, &CliError::from(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["flt", "--json", "list"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["flt", "list", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn db_flag_is_global() {
        let cli = Cli::parse_from(["flt", "show", "3", "--db", "/tmp/x.db"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(cli.command, Commands::Show(_)));
    }

    #[test]
    fn problem_ids_must_be_integers() {
        assert!(Cli::try_parse_from(["flt", "show", "abc"]).is_err());
        assert!(Cli::try_parse_from(["flt", "merge"]).is_err());
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["flt", "init"],
            vec!["flt", "app", "create", "storefront"],
            vec!["flt", "deploy", "storefront", "--env", "staging"],
            vec!["flt", "err", "create", "storefront", "NoMethodError@orders"],
            vec!["flt", "notice", "1", "--message", "boom"],
            vec!["flt", "list", "--sort", "count", "--direction", "asc"],
            vec!["flt", "show", "1"],
            vec!["flt", "resolve", "1", "2"],
            vec!["flt", "unresolve", "1"],
            vec!["flt", "merge", "1", "2", "3"],
            vec!["flt", "unmerge", "1"],
            vec!["flt", "repair"],
            vec!["flt", "repair", "--app", "storefront"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn repair_id_conflicts_with_app() {
        assert!(Cli::try_parse_from(["flt", "repair", "3", "--app", "storefront"]).is_err());
    }
}
