use super::Context;
use crate::output::render;
use anyhow::Result;
use clap::Args;
use faults_core::model::ProblemId;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Problems to update.
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<ProblemId>,
}

/// Execute `flt resolve`. Resolving an already resolved problem is a no-op.
pub fn run_resolve(args: &ResolveArgs, ctx: &Context) -> Result<()> {
    set_resolved(args, ctx, true)
}

/// Execute `flt unresolve`.
pub fn run_unresolve(args: &ResolveArgs, ctx: &Context) -> Result<()> {
    set_resolved(args, ctx, false)
}

fn set_resolved(args: &ResolveArgs, ctx: &Context, resolved: bool) -> Result<()> {
    let store = ctx.open()?;
    let manager = store.manager();
    let mut updated = Vec::with_capacity(args.ids.len());
    for id in &args.ids {
        let problem = if resolved {
            manager.resolve(*id)?
        } else {
            manager.unresolve(*id)?
        };
        updated.push(problem);
    }

    render(ctx.output, &updated, |problems, w| {
        let verb = if resolved { "Resolved" } else { "Reopened" };
        for p in problems {
            writeln!(w, "✓ {verb} problem {}", p.id)?;
        }
        Ok(())
    })
}
