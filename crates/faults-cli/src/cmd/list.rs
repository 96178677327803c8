//! `flt list`: sorted, filtered problem listings.

use super::{Context, resolve_app};
use crate::output::{format_time, render};
use anyhow::Result;
use clap::Args;
use faults_core::db::query::{ProblemFilter, ProblemOrder, list_problems};
use faults_core::model::{AppId, Problem};
use std::io::Write;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only problems of these apps (name or id). Repeatable.
    #[arg(long = "app")]
    pub apps: Vec<String>,

    /// Only resolved problems.
    #[arg(long, conflicts_with = "unresolved")]
    pub resolved: bool,

    /// Only unresolved problems.
    #[arg(long)]
    pub unresolved: bool,

    /// Only problems whose cached environment matches. Blank means all.
    #[arg(long = "env")]
    pub environment: Option<String>,

    /// Sort key: app, message, last_notice_at, last_deploy_at, count.
    #[arg(long, default_value = "last_notice_at")]
    pub sort: String,

    /// Sort direction: asc or desc.
    #[arg(long, default_value = "desc")]
    pub direction: String,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,
}

impl ListArgs {
    fn filter(&self, app_ids: Vec<AppId>) -> Result<ProblemFilter> {
        let mut filter = if self.resolved {
            ProblemFilter::resolved()
        } else if self.unresolved {
            ProblemFilter::unresolved()
        } else {
            ProblemFilter::default()
        };
        if !self.apps.is_empty() {
            filter = filter.for_apps(app_ids);
        }
        filter = filter
            .in_env(self.environment.as_deref())
            .ordered_by(ProblemOrder::parse(&self.sort, &self.direction)?);
        filter.limit = self.limit;
        filter.offset = self.offset;
        Ok(filter)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn render_row(w: &mut dyn Write, p: &Problem) -> std::io::Result<()> {
    writeln!(
        w,
        "{:>6}  {:>7}  {:<19}  {:<10}  {:<14}  {}",
        p.id,
        p.cache.notices_count,
        format_time(p.cache.last_notice_at),
        if p.resolved { "resolved" } else { "open" },
        truncate(&p.cache.app_name, 14),
        truncate(p.cache.message.as_deref().unwrap_or("-"), 48),
    )
}

/// Execute `flt list`.
pub fn run_list(args: &ListArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open()?;
    let app_ids = args
        .apps
        .iter()
        .map(|app| resolve_app(&store.conn, app).map(|a| a.id))
        .collect::<Result<Vec<_>>>()?;
    let filter = args.filter(app_ids)?;
    let problems = list_problems(&store.conn, &filter)?;

    render(ctx.output, &problems, |problems, w| {
        if problems.is_empty() {
            return writeln!(w, "No problems found.");
        }
        writeln!(
            w,
            "{:>6}  {:>7}  {:<19}  {:<10}  {:<14}  MESSAGE",
            "ID", "COUNT", "LAST NOTICE", "STATE", "APP"
        )?;
        for problem in problems {
            render_row(w, problem)?;
        }
        Ok(())
    })
}
