//! `flt merge` and `flt unmerge`.

use super::Context;
use crate::output::{format_time, pretty_kv, render};
use anyhow::Result;
use clap::Args;
use faults_core::model::{Problem, ProblemId};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Problems to merge. The first one listed survives.
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<ProblemId>,
}

#[derive(Args, Debug)]
pub struct UnmergeArgs {
    /// Merged problem to split back apart.
    pub id: ProblemId,
}

#[derive(Debug, Serialize)]
struct MergeOutput {
    problem: Problem,
    absorbed: Vec<ProblemId>,
    errs: usize,
}

/// Execute `flt merge`.
pub fn run_merge(args: &MergeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let manager = store.manager();
    let problem = manager.merge(&args.ids)?;

    let mut absorbed: Vec<ProblemId> = Vec::new();
    for id in &args.ids {
        if *id != problem.id && !absorbed.contains(id) {
            absorbed.push(*id);
        }
    }
    let report = MergeOutput {
        errs: manager.errs(problem.id)?.len(),
        problem,
        absorbed,
    };

    render(ctx.output, &report, |r, w| {
        writeln!(w, "✓ Merged into problem {}", r.problem.id)?;
        pretty_kv(w, "Errs", r.errs.to_string())?;
        pretty_kv(w, "Occurrences", r.problem.cache.notices_count.to_string())?;
        pretty_kv(w, "Last notice", format_time(r.problem.cache.last_notice_at))
    })
}

/// Execute `flt unmerge`.
pub fn run_unmerge(args: &UnmergeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let problems = store.manager().unmerge(args.id)?;

    render(ctx.output, &problems, |problems, w| {
        if problems.len() <= 1 {
            return writeln!(w, "Problem {} has a single err; nothing to unmerge.", args.id);
        }
        writeln!(w, "✓ Split problem {} into {} problems", args.id, problems.len())?;
        for p in problems {
            writeln!(w, "  {:>6}  {:>7} occurrence(s)", p.id, p.cache.notices_count)?;
        }
        Ok(())
    })
}
