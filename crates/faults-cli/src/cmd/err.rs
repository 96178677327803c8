use super::{Context, resolve_app};
use crate::output::{pretty_kv, render};
use anyhow::Result;
use clap::{Args, Subcommand};
use faults_core::model::{ErrRecord, Problem};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ErrArgs {
    #[command(subcommand)]
    pub command: ErrCommand,
}

#[derive(Subcommand, Debug)]
pub enum ErrCommand {
    /// Register a new error signature as a fresh problem owning one err.
    Create {
        /// App name or id.
        app: String,

        /// Signature identifying this kind of error.
        fingerprint: String,
    },
}

#[derive(Debug, Serialize)]
struct CreatedErr {
    problem: Problem,
    err: ErrRecord,
}

pub fn run_err(args: &ErrArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ErrCommand::Create {
            ref app,
            ref fingerprint,
        } => run_create(app, fingerprint, ctx),
    }
}

fn run_create(app: &str, fingerprint: &str, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let app = resolve_app(&store.conn, app)?;
    let (problem, err) = store.manager().open_err(app.id, fingerprint)?;

    render(ctx.output, &CreatedErr { problem, err }, |c, w| {
        writeln!(w, "✓ Created err {} in problem {}", c.err.id, c.problem.id)?;
        pretty_kv(w, "App", &c.problem.cache.app_name)?;
        pretty_kv(w, "Fingerprint", &c.err.fingerprint)
    })
}
