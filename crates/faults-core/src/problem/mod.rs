//! Problem lifecycle: creation, resolution, cache upkeep, merge and unmerge.
//!
//! [`ProblemManager`] wraps a store connection together with the cache
//! settings. Multi-step writes (merge, unmerge, notice recording, repair)
//! run inside one `IMMEDIATE` transaction: SQLite admits a single writer at
//! a time, and any failure rolls the whole operation back.

pub mod cache;
mod merge;

pub use cache::{ProblemSnapshot, RemoveOutcome, compute_cache};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::db::store;
use crate::error::{ProblemError, Result};
use crate::model::{AppId, ErrId, ErrRecord, Problem, ProblemCache, ProblemId};

/// Entry point for every problem operation.
pub struct ProblemManager<'conn> {
    conn: &'conn Connection,
    cache: CacheConfig,
}

impl<'conn> ProblemManager<'conn> {
    /// Create a manager backed by the given connection.
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(conn: &'conn Connection, cache: CacheConfig) -> Self {
        Self { conn, cache }
    }

    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }

    #[must_use]
    pub const fn cache_config(&self) -> CacheConfig {
        self.cache
    }

    /// Fetch a problem.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ProblemNotFound`] if no such problem exists.
    pub fn problem(&self, id: ProblemId) -> Result<Problem> {
        store::get_problem(self.conn, id)?.ok_or(ProblemError::ProblemNotFound(id))
    }

    /// Errs currently owned by a problem, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn errs(&self, id: ProblemId) -> Result<Vec<ErrRecord>> {
        Ok(store::errs_for_problem(self.conn, id)?)
    }

    /// A problem is merged when it owns more than one err.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_merged(&self, id: ProblemId) -> Result<bool> {
        Ok(store::err_count(self.conn, id)? > 1)
    }

    /// Create an empty problem under `app_id`.
    ///
    /// App attributes are cached on the value before the row is written, so
    /// creation is a single insert.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::AppNotFound`] if the app does not exist.
    pub fn create_problem(&self, app_id: AppId) -> Result<Problem> {
        let app = store::get_app(self.conn, app_id)?.ok_or(ProblemError::AppNotFound(app_id))?;
        let cache = ProblemCache {
            app_name: app.name,
            last_deploy_at: store::latest_deploy_at(self.conn, app_id, None)?,
            ..ProblemCache::default()
        };
        let problem = store::insert_problem(self.conn, app_id, &cache)?;
        debug!(problem_id = %problem.id, app_id = %app_id, "created problem");
        Ok(problem)
    }

    /// Register a new error signature: a fresh problem owning one new err.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::AppNotFound`] if the app does not exist.
    pub fn open_err(&self, app_id: AppId, fingerprint: &str) -> Result<(Problem, ErrRecord)> {
        self.in_transaction(|| {
            let problem = self.create_problem(app_id)?;
            let err = store::insert_err(self.conn, problem.id, app_id, fingerprint)?;
            Ok((problem, err))
        })
    }

    /// Look up an err.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ErrNotFound`] if no such err exists.
    pub fn err(&self, id: ErrId) -> Result<ErrRecord> {
        store::get_err(self.conn, id)?.ok_or(ProblemError::ErrNotFound(id))
    }

    /// Mark a problem resolved. Resolving twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ProblemNotFound`] if no such problem exists.
    pub fn resolve(&self, id: ProblemId) -> Result<Problem> {
        self.set_resolved(id, true)
    }

    /// Mark a problem unresolved. Unresolving twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ProblemNotFound`] if no such problem exists.
    pub fn unresolve(&self, id: ProblemId) -> Result<Problem> {
        self.set_resolved(id, false)
    }

    fn set_resolved(&self, id: ProblemId, resolved: bool) -> Result<Problem> {
        if store::set_resolved(self.conn, id, resolved)? == 0 {
            return Err(ProblemError::ProblemNotFound(id));
        }
        info!(problem_id = %id, resolved, "updated problem resolution");
        self.problem(id)
    }

    /// Attach or clear the external issue tracker link.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ProblemNotFound`] if no such problem exists.
    pub fn set_issue_link(&self, id: ProblemId, issue_link: Option<&str>) -> Result<Problem> {
        if store::set_issue_link(self.conn, id, issue_link)? == 0 {
            return Err(ProblemError::ProblemNotFound(id));
        }
        self.problem(id)
    }

    /// Run `f` inside an `IMMEDIATE` transaction, committing only on success.
    fn in_transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = f()?;
        tx.commit()?;
        Ok(value)
    }
}
