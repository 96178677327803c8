use super::Context;
use crate::output::{format_time, pretty_kv, pretty_rule, pretty_section, render};
use anyhow::Result;
use clap::Args;
use faults_core::db::store;
use faults_core::model::{ErrId, Notice, Problem, ProblemId};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: ProblemId,

    /// How many recent notices to include.
    #[arg(long, default_value_t = 10)]
    pub notices: usize,
}

#[derive(Debug, Serialize)]
struct ShowProblem {
    #[serde(flatten)]
    problem: Problem,
    merged: bool,
    errs: Vec<ShowErr>,
    recent_notices: Vec<Notice>,
}

#[derive(Debug, Serialize)]
struct ShowErr {
    id: ErrId,
    fingerprint: String,
    notices_count: u64,
}

/// Execute `flt show <id>`.
pub fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let manager = store.manager();
    let problem = manager.problem(args.id)?;

    let mut errs = Vec::new();
    for err in manager.errs(problem.id)? {
        errs.push(ShowErr {
            notices_count: store::err_notice_count(&store.conn, err.id)?,
            id: err.id,
            fingerprint: err.fingerprint,
        });
    }
    let recent_notices = store::recent_notices(&store.conn, problem.id, Some(args.notices))?;

    let detail = ShowProblem {
        merged: errs.len() > 1,
        problem,
        errs,
        recent_notices,
    };
    render(ctx.output, &detail, render_human)
}

fn render_human(d: &ShowProblem, w: &mut dyn Write) -> std::io::Result<()> {
    let p = &d.problem;
    let cache = &p.cache;
    pretty_section(
        w,
        &format!(
            "Problem {}: {}",
            p.id,
            cache.message.as_deref().unwrap_or("(no notices yet)")
        ),
    )?;
    pretty_kv(w, "App", &cache.app_name)?;
    pretty_kv(w, "State", if p.resolved { "resolved" } else { "unresolved" })?;
    pretty_kv(w, "Occurrences", cache.notices_count.to_string())?;
    pretty_kv(w, "Class", cache.klass.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Location", cache.location.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Environment", cache.environment.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Last notice", format_time(cache.last_notice_at))?;
    pretty_kv(w, "Last deploy", format_time(cache.last_deploy_at))?;
    if let Some(ref link) = p.issue_link {
        pretty_kv(w, "Issue", link)?;
    }

    for (key, mut values) in [("Hosts", p.hosts()), ("User agents", p.user_agents())] {
        values.retain(|v| !v.is_empty());
        if !values.is_empty() {
            values.sort_unstable();
            values.dedup();
            pretty_kv(w, key, values.join(", "))?;
        }
    }

    writeln!(w)?;
    let heading = if d.merged { "Errs (merged)" } else { "Errs" };
    pretty_section(w, heading)?;
    for err in &d.errs {
        writeln!(w, "  {:>6}  {:>7}  {}", err.id, err.notices_count, err.fingerprint)?;
    }

    if !d.recent_notices.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Recent notices")?;
        for n in &d.recent_notices {
            writeln!(
                w,
                "  {}  {:<12} {}",
                format_time(Some(n.created_at)),
                n.host,
                n.message
            )?;
        }
    }
    pretty_rule(w)
}
