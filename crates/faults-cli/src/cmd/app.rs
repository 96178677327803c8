use super::Context;
use crate::output::{format_time, pretty_kv, render};
use anyhow::Result;
use clap::{Args, Subcommand};
use faults_core::db::store;
use std::io::Write;
use tracing::info;

#[derive(Args, Debug)]
pub struct AppArgs {
    #[command(subcommand)]
    pub command: AppCommand,
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Register an app whose errors will be tracked.
    Create {
        /// Unique app name.
        name: String,
    },
}

pub fn run_app(args: &AppArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AppCommand::Create { ref name } => run_create(name, ctx),
    }
}

fn run_create(name: &str, ctx: &Context) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("app name must not be empty");
    }

    let store = ctx.open()?;
    if store::find_app_by_name(&store.conn, name)?.is_some() {
        anyhow::bail!("app '{name}' already exists");
    }
    let app = store::create_app(&store.conn, name)?;
    info!(app_id = %app.id, name = %app.name, "created app");

    render(ctx.output, &app, |app, w| {
        writeln!(w, "✓ Created app {} ({})", app.name, app.id)?;
        pretty_kv(w, "Created", format_time(Some(app.created_at)))
    })
}
