use std::fmt;

use crate::model::{AppId, ErrId, ProblemId};

/// Machine-readable error codes for operators and scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ProblemNotFound,
    ErrNotFound,
    AppNotFound,
    InvalidSortKey,
    InvalidSortDirection,
    EmptyMerge,
    CrossAppMerge,
    DonorStillOwnsErrs,
    CorruptStore,
    DatabaseFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ProblemNotFound => "E2001",
            Self::ErrNotFound => "E2002",
            Self::AppNotFound => "E2003",
            Self::InvalidSortKey => "E2004",
            Self::InvalidSortDirection => "E2005",
            Self::EmptyMerge => "E3001",
            Self::CrossAppMerge => "E3002",
            Self::DonorStillOwnsErrs => "E3003",
            Self::CorruptStore => "E4001",
            Self::DatabaseFailure => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ProblemNotFound => "Problem not found",
            Self::ErrNotFound => "Err not found",
            Self::AppNotFound => "App not found",
            Self::InvalidSortKey => "Unrecognized sort key",
            Self::InvalidSortDirection => "Unrecognized sort direction",
            Self::EmptyMerge => "Nothing to merge",
            Self::CrossAppMerge => "Problems belong to different apps",
            Self::DonorStillOwnsErrs => "Merge donor still owns errs",
            Self::CorruptStore => "Corrupt cached problem state",
            Self::DatabaseFailure => "Database operation failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ProblemNotFound => Some("Use `flt list` to see available problems."),
            Self::ErrNotFound => Some("Use `flt show <problem>` to see a problem's errs."),
            Self::AppNotFound => Some("Create it first with `flt app create <name>`."),
            Self::InvalidSortKey => {
                Some("Use one of: app, message, last_notice_at, last_deploy_at, count.")
            }
            Self::InvalidSortDirection => Some("Use asc or desc."),
            Self::EmptyMerge => Some("Pass at least one problem id."),
            Self::CrossAppMerge => Some("Only problems of the same app can be merged."),
            Self::DonorStillOwnsErrs => {
                Some("The merge was rolled back. Retry; if persistent, report a bug with logs.")
            }
            Self::CorruptStore => Some("Run `flt repair` to recompute cached attributes."),
            Self::DatabaseFailure => Some("Check the database path and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by problem grouping, caching, and merge operations.
#[derive(Debug, thiserror::Error)]
pub enum ProblemError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("problem {0} not found")]
    ProblemNotFound(ProblemId),

    #[error("err {0} not found")]
    ErrNotFound(ErrId),

    #[error("app {0} not found")]
    AppNotFound(AppId),

    #[error("\"{0}\" is not a recognized sort")]
    InvalidSortKey(String),

    #[error("\"{0}\" is not a recognized sort direction")]
    InvalidSortDirection(String),

    #[error("merge needs at least one problem")]
    EmptyMerge,

    #[error("cannot merge problem {problem} of app {found} into app {expected}")]
    CrossAppMerge {
        problem: ProblemId,
        expected: AppId,
        found: AppId,
    },

    /// Reassignment left errs behind on a donor; the donor must not be destroyed.
    #[error("donor problem {problem} still owns {remaining} err(s) after reassignment")]
    DonorStillOwnsErrs { problem: ProblemId, remaining: u64 },
}

impl ProblemError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Database(rusqlite::Error::FromSqlConversionFailure(..)) => {
                ErrorCode::CorruptStore
            }
            Self::Database(_) => ErrorCode::DatabaseFailure,
            Self::ProblemNotFound(_) => ErrorCode::ProblemNotFound,
            Self::ErrNotFound(_) => ErrorCode::ErrNotFound,
            Self::AppNotFound(_) => ErrorCode::AppNotFound,
            Self::InvalidSortKey(_) => ErrorCode::InvalidSortKey,
            Self::InvalidSortDirection(_) => ErrorCode::InvalidSortDirection,
            Self::EmptyMerge => ErrorCode::EmptyMerge,
            Self::CrossAppMerge { .. } => ErrorCode::CrossAppMerge,
            Self::DonorStillOwnsErrs { .. } => ErrorCode::DonorStillOwnsErrs,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// True for malformed or contradictory arguments: sort keys and
    /// directions, empty merges, cross-app merges.
    ///
    /// Unknown ids report their own not-found codes and are not included.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidSortKey(_)
                | Self::InvalidSortDirection(_)
                | Self::EmptyMerge
                | Self::CrossAppMerge { .. }
        )
    }
}

pub type Result<T, E = ProblemError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ProblemError};
    use crate::model::{AppId, ErrId, ProblemId};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ProblemNotFound,
            ErrorCode::ErrNotFound,
            ErrorCode::AppNotFound,
            ErrorCode::InvalidSortKey,
            ErrorCode::InvalidSortDirection,
            ErrorCode::EmptyMerge,
            ErrorCode::CrossAppMerge,
            ErrorCode::DonorStillOwnsErrs,
            ErrorCode::CorruptStore,
            ErrorCode::DatabaseFailure,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn every_code_is_produced_by_some_error() {
        let errors = [
            ProblemError::Database(rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                "bad log".into(),
            )),
            ProblemError::Database(rusqlite::Error::QueryReturnedNoRows),
            ProblemError::ProblemNotFound(ProblemId(1)),
            ProblemError::ErrNotFound(ErrId(1)),
            ProblemError::AppNotFound(AppId(1)),
            ProblemError::InvalidSortKey("bogus".into()),
            ProblemError::InvalidSortDirection("sideways".into()),
            ProblemError::EmptyMerge,
            ProblemError::CrossAppMerge {
                problem: ProblemId(2),
                expected: AppId(1),
                found: AppId(2),
            },
            ProblemError::DonorStillOwnsErrs {
                problem: ProblemId(2),
                remaining: 1,
            },
        ];
        let produced: HashSet<&str> = errors.iter().map(|e| e.code().code()).collect();
        assert_eq!(produced.len(), 10);
        assert!(errors.iter().all(|e| e.hint().is_some()));
    }

    #[test]
    fn unknown_ids_are_not_found_rather_than_invalid() {
        assert!(!ProblemError::ProblemNotFound(ProblemId(9)).is_invalid_argument());
        assert!(!ProblemError::ErrNotFound(ErrId(9)).is_invalid_argument());
        assert!(!ProblemError::AppNotFound(AppId(9)).is_invalid_argument());
        assert!(ProblemError::EmptyMerge.is_invalid_argument());
    }

    #[test]
    fn invalid_sort_key_names_the_key() {
        let err = ProblemError::InvalidSortKey("bogus".into());
        assert_eq!(err.to_string(), "\"bogus\" is not a recognized sort");
        assert_eq!(err.code(), ErrorCode::InvalidSortKey);
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn donor_invariant_is_not_a_caller_mistake() {
        let err = ProblemError::DonorStillOwnsErrs {
            problem: ProblemId(4),
            remaining: 2,
        };
        assert!(!err.is_invalid_argument());
        assert_eq!(err.code().code(), "E3003");
    }
}
