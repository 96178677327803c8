//! Merge and unmerge: the only operations that move errs between problems.

use tracing::{debug, info};

use super::ProblemManager;
use crate::db::store;
use crate::error::{ProblemError, Result};
use crate::model::{Problem, ProblemId};

impl ProblemManager<'_> {
    /// Collapse several problems into the first one listed.
    ///
    /// Duplicate ids are ignored. Each donor's errs are appended to the
    /// survivor, the donor is verified empty, and only then destroyed along
    /// with its comments. The survivor's cache is fully recomputed at the end.
    /// Merging a single problem just recomputes its cache.
    ///
    /// # Errors
    ///
    /// - [`ProblemError::EmptyMerge`] when `ids` is empty
    /// - [`ProblemError::ProblemNotFound`] for an unknown id
    /// - [`ProblemError::CrossAppMerge`] when a donor belongs to another app
    /// - [`ProblemError::DonorStillOwnsErrs`] when reassignment left errs behind
    ///
    /// On any error nothing is changed.
    pub fn merge(&self, ids: &[ProblemId]) -> Result<Problem> {
        let mut unique: Vec<ProblemId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let (&survivor_id, donors) = unique.split_first().ok_or(ProblemError::EmptyMerge)?;

        self.in_transaction(|| {
            let conn = self.connection();
            let mut survivor = self.problem(survivor_id)?;

            for &donor_id in donors {
                let donor = self.problem(donor_id)?;
                if donor.app_id != survivor.app_id {
                    return Err(ProblemError::CrossAppMerge {
                        problem: donor_id,
                        expected: survivor.app_id,
                        found: donor.app_id,
                    });
                }

                let moved = store::reassign_errs(conn, donor_id, survivor_id)?;
                let remaining = store::err_count(conn, donor_id)?;
                if remaining > 0 {
                    return Err(ProblemError::DonorStillOwnsErrs {
                        problem: donor_id,
                        remaining,
                    });
                }
                store::delete_problem(conn, donor_id)?;
                debug!(
                    survivor = %survivor_id,
                    donor = %donor_id,
                    moved,
                    "merged donor problem"
                );
            }

            self.reset_cached_attributes(&mut survivor)?;
            info!(
                problem_id = %survivor_id,
                donors = donors.len(),
                notices_count = survivor.cache.notices_count,
                "merged problems"
            );
            self.problem(survivor_id)
        })
    }

    /// Split a problem so each of its errs after the first gets its own problem.
    ///
    /// Returns the original problem followed by one new problem per detached
    /// err, in the errs' creation order. Every problem whose err set changed,
    /// the original included, has its cache recomputed. A problem with at
    /// most one err is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::ProblemNotFound`] for an unknown id. On any
    /// error nothing is changed.
    pub fn unmerge(&self, id: ProblemId) -> Result<Vec<Problem>> {
        self.in_transaction(|| {
            let conn = self.connection();
            let mut original = self.problem(id)?;
            let errs = store::errs_for_problem(conn, id)?;
            let detached = errs.get(1..).unwrap_or_default();
            if detached.is_empty() {
                return Ok(vec![original]);
            }

            let mut split = Vec::with_capacity(detached.len());
            for err in detached {
                let mut problem = self.create_problem(original.app_id)?;
                store::reassign_err(conn, err.id, problem.id)?;
                self.reset_cached_attributes(&mut problem)?;
                debug!(
                    original = %id,
                    problem_id = %problem.id,
                    err_id = %err.id,
                    "detached err into new problem"
                );
                split.push(problem.id);
            }

            self.reset_cached_attributes(&mut original)?;
            info!(problem_id = %id, detached = split.len(), "unmerged problem");

            let mut result = Vec::with_capacity(split.len() + 1);
            result.push(self.problem(id)?);
            for new_id in split {
                result.push(self.problem(new_id)?);
            }
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::db::open_in_memory;
    use crate::model::NewNotice;
    use rusqlite::Connection;

    fn seeded() -> (Connection, crate::model::AppId) {
        let conn = open_in_memory().expect("db");
        let app = store::create_app(&conn, "billing").expect("app");
        (conn, app.id)
    }

    #[test]
    fn empty_merge_is_invalid_argument() {
        let (conn, _app) = seeded();
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let err = manager.merge(&[]).expect_err("must fail");
        assert!(matches!(err, ProblemError::EmptyMerge));
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn duplicate_ids_collapse_to_a_single_problem_merge() {
        let (conn, app) = seeded();
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let (problem, err) = manager.open_err(app, "a").expect("open");
        manager
            .record_notice(err.id, &NewNotice::default())
            .expect("notice");

        let merged = manager
            .merge(&[problem.id, problem.id, problem.id])
            .expect("merge");
        assert_eq!(merged.id, problem.id);
        assert_eq!(merged.cache.notices_count, 1);
        assert_eq!(manager.errs(problem.id).expect("errs").len(), 1);
    }

    #[test]
    fn merge_across_apps_changes_nothing() {
        let (conn, app) = seeded();
        let other = store::create_app(&conn, "shipping").expect("app");
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let (first, _) = manager.open_err(app, "a").expect("open");
        let (second, _) = manager.open_err(other.id, "b").expect("open");

        let err = manager.merge(&[first.id, second.id]).expect_err("must fail");
        assert!(matches!(err, ProblemError::CrossAppMerge { .. }));
        assert_eq!(manager.errs(first.id).expect("errs").len(), 1);
        assert_eq!(manager.errs(second.id).expect("errs").len(), 1);
    }

    #[test]
    fn merge_with_unknown_donor_rolls_back_earlier_donors() {
        let (conn, app) = seeded();
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let (first, _) = manager.open_err(app, "a").expect("open");
        let (second, _) = manager.open_err(app, "b").expect("open");

        let err = manager
            .merge(&[first.id, second.id, ProblemId(999)])
            .expect_err("must fail");
        assert!(matches!(err, ProblemError::ProblemNotFound(ProblemId(999))));
        assert!(manager.problem(second.id).is_ok(), "donor must survive rollback");
        assert_eq!(manager.errs(second.id).expect("errs").len(), 1);
    }

    #[test]
    fn donor_left_with_errs_is_not_destroyed() {
        let (conn, app) = seeded();
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let (first, _) = manager.open_err(app, "a").expect("open");
        let (second, stuck) = manager.open_err(app, "b").expect("open");
        conn.execute_batch(&format!(
            "CREATE TRIGGER pin_err BEFORE UPDATE OF problem_id ON errs
             WHEN OLD.err_id = {}
             BEGIN SELECT RAISE(IGNORE); END;",
            stuck.id
        ))
        .expect("trigger");

        let err = manager.merge(&[first.id, second.id]).expect_err("must fail");
        assert!(matches!(
            err,
            ProblemError::DonorStillOwnsErrs { problem, remaining: 1 } if problem == second.id
        ));
        assert!(!err.is_invalid_argument());
        assert!(manager.problem(second.id).is_ok(), "donor must survive");
        let errs = manager.errs(second.id).expect("errs");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].id, stuck.id);
        assert_eq!(manager.errs(first.id).expect("errs").len(), 1);
    }

    #[test]
    fn unmerge_single_err_problem_is_a_no_op() {
        let (conn, app) = seeded();
        let manager = ProblemManager::new(&conn, CacheConfig::default());
        let (problem, _) = manager.open_err(app, "a").expect("open");

        let result = manager.unmerge(problem.id).expect("unmerge");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, problem.id);
        assert_eq!(store::problem_ids(&conn, None).expect("ids").len(), 1);
    }
}
