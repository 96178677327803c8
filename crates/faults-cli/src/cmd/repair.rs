use super::{Context, resolve_app};
use crate::output::render;
use anyhow::Result;
use clap::Args;
use faults_core::model::ProblemId;
use serde::Serialize;
use std::io::Write;
use tracing::info;

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Problem to repair. Without one, every problem is repaired.
    #[arg(conflicts_with = "app")]
    pub id: Option<ProblemId>,

    /// Only repair problems of this app (name or id).
    #[arg(long)]
    pub app: Option<String>,
}

#[derive(Debug, Serialize)]
struct RepairOutput {
    repaired: usize,
}

/// Execute `flt repair`: recompute cached attributes from current membership.
pub fn run_repair(args: &RepairArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let manager = store.manager();

    let repaired = if let Some(id) = args.id {
        manager.repair(id)?;
        1
    } else {
        let app_id = match args.app {
            Some(ref app) => Some(resolve_app(&store.conn, app)?.id),
            None => None,
        };
        manager.repair_all(app_id)?
    };
    info!(repaired, "repaired problem caches");

    render(ctx.output, &RepairOutput { repaired }, |r, w| {
        writeln!(w, "✓ Recomputed cached attributes of {} problem(s)", r.repaired)
    })
}
