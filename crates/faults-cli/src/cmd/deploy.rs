use super::{Context, resolve_app};
use crate::output::{format_time, pretty_kv, render};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use faults_core::db::store;
use faults_core::model::Deploy;
use serde::Serialize;
use std::io::Write;
use tracing::info;

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// App name or id.
    pub app: String,

    /// Environment deployed to.
    #[arg(long = "env", default_value = "production")]
    pub environment: String,

    /// Deployed revision (commit hash, tag, ...).
    #[arg(long)]
    pub revision: Option<String>,

    /// Deploy time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct DeployOutput {
    #[serde(flatten)]
    deploy: Deploy,
    problems_refreshed: usize,
}

/// Execute `flt deploy`. Records the deploy, then refreshes the cached app
/// attributes (name, last deploy time) of every problem of the app.
pub fn run_deploy(args: &DeployArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let app = resolve_app(&store.conn, &args.app)?;
    let deploy = store::record_deploy(
        &store.conn,
        app.id,
        args.environment.trim(),
        args.revision.as_deref(),
        args.at,
    )?;

    let manager = store.manager();
    let ids = store::problem_ids(&store.conn, Some(app.id))?;
    for id in &ids {
        let mut problem = manager.problem(*id)?;
        manager.cache_app_attributes(&mut problem)?;
    }
    info!(
        app_id = %app.id,
        environment = %deploy.environment,
        problems = ids.len(),
        "recorded deploy"
    );

    let report = DeployOutput {
        deploy,
        problems_refreshed: ids.len(),
    };
    render(ctx.output, &report, |r, w| {
        writeln!(w, "✓ Recorded deploy of {} to {}", app.name, r.deploy.environment)?;
        if let Some(ref revision) = r.deploy.revision {
            pretty_kv(w, "Revision", revision)?;
        }
        pretty_kv(w, "At", format_time(Some(r.deploy.created_at)))?;
        pretty_kv(w, "Refreshed", format!("{} problem(s)", r.problems_refreshed))
    })
}
