//! Cached aggregate upkeep for problems.
//!
//! Two paths keep a problem's cache in line with the notices reachable
//! through its errs:
//!
//! - **Incremental** ([`ProblemManager::cache_notice`]): run on every notice
//!   arrival; overwrites the headline fields and appends one log entry.
//! - **Full** ([`ProblemManager::reset_cached_attributes`]): run after any
//!   change to err membership; loads a [`ProblemSnapshot`] and derives a
//!   fresh [`ProblemCache`] with [`compute_cache`].
//!
//! Both end in a single `UPDATE` of the problem row, and both are total: a
//! problem with no errs or notices still gets a consistent cache.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::ProblemManager;
use crate::db::store;
use crate::error::{ProblemError, Result};
use crate::model::{
    AppId, ErrId, NewNotice, Notice, NoticeLog, NoticeLogEntry, Problem, ProblemCache, ProblemId,
};

/// Everything cache recomputation needs, read from the store in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemSnapshot {
    /// Name of the owning app, `None` if the app has vanished.
    pub app_name: Option<String>,
    /// Newest notices first, truncated to the notice log limit.
    pub recent_notices: Vec<Notice>,
    pub notices_count: u64,
    pub last_notice_at: Option<DateTime<Utc>>,
    pub last_deploy_at: Option<DateTime<Utc>>,
}

/// Derive a problem's cache from a snapshot of its current membership.
///
/// Headline fields come from the newest notice. With no notices at all they
/// keep their previous values, while counts, times, and the log are emptied.
#[must_use]
pub fn compute_cache(
    previous: &ProblemCache,
    snapshot: &ProblemSnapshot,
    notice_log_limit: usize,
) -> ProblemCache {
    let mut cache = ProblemCache {
        app_name: snapshot
            .app_name
            .clone()
            .unwrap_or_else(|| previous.app_name.clone()),
        notices_count: snapshot.notices_count,
        message: previous.message.clone(),
        environment: previous.environment.clone(),
        klass: previous.klass.clone(),
        location: previous.location.clone(),
        notice_log: NoticeLog::from_entries(
            snapshot
                .recent_notices
                .iter()
                .rev()
                .map(NoticeLogEntry::from)
                .collect(),
            notice_log_limit,
        ),
        last_notice_at: snapshot.last_notice_at,
        last_deploy_at: snapshot.last_deploy_at,
    };
    if let Some(latest) = snapshot.recent_notices.first() {
        cache.set_headline(latest);
    }
    cache
}

/// What [`ProblemManager::remove_cached_notice`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The notice's entry was dropped from the log.
    Removed,
    /// The notice was not in the log; the whole cache was recomputed.
    Reset,
}

impl ProblemManager<'_> {
    /// Read the snapshot [`compute_cache`] works from.
    ///
    /// The deploy lookup uses the environment of the newest notice, falling
    /// back to the cached one when the problem has no notices.
    ///
    /// # Errors
    ///
    /// Returns an error if any store query fails.
    pub fn load_snapshot(&self, problem: &Problem) -> Result<ProblemSnapshot> {
        let conn = self.connection();
        let limit = match self.cache_config().notice_log_limit {
            0 => None,
            limit => Some(limit),
        };
        let recent_notices = store::recent_notices(conn, problem.id, limit)?;
        let environment = recent_notices
            .first()
            .map(|n| n.environment_name.as_str())
            .or(problem.cache.environment.as_deref());

        Ok(ProblemSnapshot {
            app_name: store::get_app(conn, problem.app_id)?.map(|app| app.name),
            notices_count: store::notice_count(conn, problem.id)?,
            last_notice_at: recent_notices.first().map(|n| n.created_at),
            last_deploy_at: store::latest_deploy_at(conn, problem.app_id, environment)?,
            recent_notices,
        })
    }

    /// Refresh the app name and the latest deploy time for the problem's
    /// cached environment, then persist.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or the write fails.
    pub fn cache_app_attributes(&self, problem: &mut Problem) -> Result<()> {
        let conn = self.connection();
        let Some(app) = store::get_app(conn, problem.app_id)? else {
            warn!(problem_id = %problem.id, app_id = %problem.app_id, "problem app is missing");
            return Ok(());
        };
        problem.cache.app_name = app.name;
        problem.cache.last_deploy_at =
            store::latest_deploy_at(conn, problem.app_id, problem.cache.environment.as_deref())?;
        self.persist(problem)
    }

    /// Incrementally cache one notice on a problem.
    ///
    /// Without an explicit notice the problem's newest notice is used. The
    /// headline fields and the notice log only change when some notice is
    /// found; `last_notice_at` is always refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or the write fails.
    pub fn cache_notice(&self, problem: &mut Problem, notice: Option<&Notice>) -> Result<()> {
        let conn = self.connection();
        let newest;
        let notice = match notice {
            Some(notice) => Some(notice),
            None => {
                newest = store::recent_notices(conn, problem.id, Some(1))?.into_iter().next();
                newest.as_ref()
            }
        };

        problem.cache.last_notice_at = store::latest_notice_at(conn, problem.id)?;
        if let Some(notice) = notice {
            problem.cache.set_headline(notice);
            problem
                .cache
                .notice_log
                .push(NoticeLogEntry::from(notice), self.cache_config().notice_log_limit);
        }
        self.persist(problem)
    }

    /// Drop a notice's entry from the cached log.
    ///
    /// A notice missing from the log means the cache drifted from the store;
    /// the problem is then fully recomputed instead.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or the write fails.
    pub fn remove_cached_notice(
        &self,
        problem: &mut Problem,
        notice: &Notice,
    ) -> Result<RemoveOutcome> {
        if problem.cache.notice_log.remove(notice.id).is_some() {
            self.persist(problem)?;
            return Ok(RemoveOutcome::Removed);
        }

        warn!(
            problem_id = %problem.id,
            notice_id = %notice.id,
            "notice missing from cached log, recomputing problem cache"
        );
        self.reset_cached_attributes(problem)?;
        Ok(RemoveOutcome::Reset)
    }

    /// Recompute every cached field from the problem's current errs and notices.
    ///
    /// Idempotent, so it doubles as the repair path after a partial failure.
    ///
    /// # Errors
    ///
    /// Returns an error if a store query or the write fails.
    pub fn reset_cached_attributes(&self, problem: &mut Problem) -> Result<()> {
        let snapshot = self.load_snapshot(problem)?;
        problem.cache = compute_cache(
            &problem.cache,
            &snapshot,
            self.cache_config().notice_log_limit,
        );
        debug!(
            problem_id = %problem.id,
            notices_count = problem.cache.notices_count,
            "recomputed problem cache"
        );
        self.persist(problem)
    }

    /// Store a notice under `err_id` and update the owning problem's cache.
    ///
    /// This is the hook the ingestion pipeline calls for every new notice.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ErrNotFound`] if the err does not exist.
    pub fn record_notice(&self, err_id: ErrId, notice: &NewNotice) -> Result<(Problem, Notice)> {
        self.in_transaction(|| {
            let err = self.err(err_id)?;
            let stored = store::insert_notice(self.connection(), err_id, notice)?;
            let mut problem = self.problem(err.problem_id)?;
            problem.cache.notices_count += 1;
            self.cache_notice(&mut problem, Some(&stored))?;
            Ok((problem, stored))
        })
    }

    /// Recompute one problem's cache in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ProblemNotFound`] if no such problem exists.
    pub fn repair(&self, id: ProblemId) -> Result<Problem> {
        self.in_transaction(|| {
            let mut problem = self.problem(id)?;
            self.reset_cached_attributes(&mut problem)?;
            self.problem(id)
        })
    }

    /// Recompute the cache of every problem, or only those of one app.
    ///
    /// Returns the number of problems repaired.
    ///
    /// # Errors
    ///
    /// Returns the first failure; problems repaired before it stay repaired.
    pub fn repair_all(&self, app_id: Option<AppId>) -> Result<usize> {
        let ids = store::problem_ids(self.connection(), app_id)?;
        for id in &ids {
            self.repair(*id)?;
        }
        Ok(ids.len())
    }

    fn persist(&self, problem: &Problem) -> Result<()> {
        if store::write_cache(self.connection(), problem.id, &problem.cache)? == 0 {
            return Err(ProblemError::ProblemNotFound(problem.id));
        }
        Ok(())
    }
}
