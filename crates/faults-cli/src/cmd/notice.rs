use super::Context;
use crate::output::{format_time, pretty_kv, render};
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use faults_core::model::{ErrId, NewNotice, Notice, ProblemId};
use serde::Serialize;
use std::io::{Read, Write};

#[derive(Args, Debug)]
pub struct NoticeArgs {
    /// Err the occurrence belongs to.
    pub err: ErrId,

    /// Read the notice as a JSON object from stdin instead of flags.
    #[arg(long, conflicts_with_all = ["message", "environment", "class", "location", "host", "user_agent", "at"])]
    pub stdin: bool,

    #[arg(long, short)]
    pub message: Option<String>,

    #[arg(long = "env", default_value = "production")]
    pub environment: String,

    /// Error class name.
    #[arg(long)]
    pub class: Option<String>,

    /// Code location (file:line).
    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Occurrence time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

impl NoticeArgs {
    fn to_new_notice(&self) -> NewNotice {
        NewNotice {
            message: self.message.clone().unwrap_or_default(),
            environment_name: self.environment.trim().to_string(),
            klass: self.class.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            host: self.host.clone().unwrap_or_default(),
            user_agent: self.user_agent.clone().unwrap_or_default(),
            created_at: self.at,
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordedNotice {
    problem_id: ProblemId,
    notices_count: u64,
    notice: Notice,
}

/// Execute `flt notice`: store one occurrence and update its problem's cache.
pub fn run_notice(args: &NoticeArgs, ctx: &Context) -> Result<()> {
    let payload = if args.stdin {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read notice from stdin")?;
        serde_json::from_str::<NewNotice>(&raw).context("Failed to parse notice JSON")?
    } else {
        args.to_new_notice()
    };

    let store = ctx.open()?;
    let (problem, notice) = store.manager().record_notice(args.err, &payload)?;

    let report = RecordedNotice {
        problem_id: problem.id,
        notices_count: problem.cache.notices_count,
        notice,
    };
    render(ctx.output, &report, |r, w| {
        writeln!(w, "✓ Recorded notice {} on problem {}", r.notice.id, r.problem_id)?;
        pretty_kv(w, "Occurrences", r.notices_count.to_string())?;
        pretty_kv(w, "At", format_time(Some(r.notice.created_at)))
    })
}
