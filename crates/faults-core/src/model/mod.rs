//! Record types for apps, deploys, problems, errs, and notices.
//!
//! Identifiers are integer newtypes so a problem id can never be passed where
//! an err id is expected. They convert to and from SQLite integers directly.

pub mod app;
pub mod err;
pub mod notice;
pub mod problem;

pub use app::{App, Deploy};
pub use err::ErrRecord;
pub use notice::{NewNotice, Notice};
pub use problem::{NoticeLog, NoticeLogEntry, Problem, ProblemCache};

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

record_id!(
    /// Primary key of an [`App`].
    AppId
);
record_id!(
    /// Primary key of a [`Problem`].
    ProblemId
);
record_id!(
    /// Primary key of an [`ErrRecord`].
    ErrId
);
record_id!(
    /// Primary key of a [`Notice`].
    NoticeId
);
