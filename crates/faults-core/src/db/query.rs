//! Read-side query shaping over the cached problem columns.
//!
//! Sorting and filtering only read what cache recomputation already
//! persisted; nothing here recomputes a cache.

use rusqlite::{Connection, params_from_iter};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::db::store::{PROBLEM_COLUMNS, row_to_problem};
use crate::error::ProblemError;
use crate::model::{AppId, Problem};

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Cached column a problem listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    App,
    Message,
    #[default]
    LastNoticeAt,
    LastDeployAt,
    Count,
}

impl SortKey {
    pub const ALL: [Self; 5] = [
        Self::App,
        Self::Message,
        Self::LastNoticeAt,
        Self::LastDeployAt,
        Self::Count,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Message => "message",
            Self::LastNoticeAt => "last_notice_at",
            Self::LastDeployAt => "last_deploy_at",
            Self::Count => "count",
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::App => "p.app_name",
            Self::Message => "p.message",
            Self::LastNoticeAt => "p.last_notice_at_us",
            Self::LastDeployAt => "p.last_deploy_at_us",
            Self::Count => "p.notices_count",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProblemError::InvalidSortKey(s.to_string()))
    }
}

/// Ascending or descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(ProblemError::InvalidSortDirection(s.to_string())),
        }
    }
}

/// Sort key plus direction. Defaults to most recent notice first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProblemOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl ProblemOrder {
    #[must_use]
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Parse a key and direction as supplied by a caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProblemError::InvalidSortKey`] or
    /// [`ProblemError::InvalidSortDirection`] naming the offending value.
    pub fn parse(key: &str, direction: &str) -> Result<Self, ProblemError> {
        Ok(Self::new(key.parse()?, direction.parse()?))
    }

    /// `ORDER BY` clause; NULLs sort last in both directions, id breaks ties.
    fn sql_clause(self) -> String {
        let column = self.key.column();
        let direction = self.direction.sql();
        format!("ORDER BY {column} IS NULL ASC, {column} {direction}, p.problem_id {direction}")
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Filter criteria for problem listings, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct ProblemFilter {
    /// Restrict to problems of these apps.
    pub app_ids: Option<Vec<AppId>>,
    /// `Some(true)` for resolved only, `Some(false)` for unresolved only.
    pub resolved: Option<bool>,
    /// Restrict to a cached environment. Blank means all environments.
    pub environment: Option<String>,
    pub order: ProblemOrder,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProblemFilter {
    #[must_use]
    pub fn resolved() -> Self {
        Self {
            resolved: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            resolved: Some(false),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_apps(mut self, app_ids: impl IntoIterator<Item = AppId>) -> Self {
        self.app_ids = Some(app_ids.into_iter().collect());
        self
    }

    /// Restrict to `environment` when one is given; otherwise match all.
    #[must_use]
    pub fn in_env(mut self, environment: Option<&str>) -> Self {
        self.environment = environment
            .map(str::trim)
            .filter(|env| !env.is_empty())
            .map(str::to_string);
        self
    }

    #[must_use]
    pub const fn ordered_by(mut self, order: ProblemOrder) -> Self {
        self.order = order;
        self
    }
}

/// List problems matching `filter` in the requested order.
///
/// # Errors
///
/// Returns an error if the query fails or a cached column is corrupt.
pub fn list_problems(conn: &Connection, filter: &ProblemFilter) -> Result<Vec<Problem>, ProblemError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(resolved) = filter.resolved {
        param_values.push(Box::new(resolved));
        conditions.push(format!("p.resolved = ?{}", param_values.len()));
    }

    if let Some(ref environment) = filter.environment {
        param_values.push(Box::new(environment.clone()));
        conditions.push(format!("p.environment = ?{}", param_values.len()));
    }

    if let Some(ref app_ids) = filter.app_ids {
        if app_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut placeholders = String::new();
        for app_id in app_ids {
            param_values.push(Box::new(*app_id));
            if !placeholders.is_empty() {
                placeholders.push_str(", ");
            }
            let _ = write!(placeholders, "?{}", param_values.len());
        }
        conditions.push(format!("p.app_id IN ({placeholders})"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sort_clause = filter.order.sql_clause();

    let limit_clause = match (filter.limit, filter.offset) {
        (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
        (Some(limit), None) => format!(" LIMIT {limit}"),
        (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
        (None, None) => String::new(),
    };

    let sql = format!(
        "SELECT {PROBLEM_COLUMNS} FROM problems p{where_clause} {sort_clause}{limit_clause}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(params_from_iter(params_ref), row_to_problem)?;

    let mut problems = Vec::new();
    for row in rows {
        problems.push(row?);
    }
    Ok(problems)
}

/// Sort already-loaded problems in memory with the same semantics as
/// [`list_problems`].
pub fn sort_problems(problems: &mut [Problem], order: ProblemOrder) {
    use std::cmp::Ordering;

    fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => match direction {
                SortDirection::Asc => a.cmp(&b),
                SortDirection::Desc => b.cmp(&a),
            },
        }
    }

    problems.sort_by(|a, b| {
        let primary = match order.key {
            SortKey::App => nulls_last(
                Some(&a.cache.app_name),
                Some(&b.cache.app_name),
                order.direction,
            ),
            SortKey::Message => nulls_last(
                a.cache.message.as_ref(),
                b.cache.message.as_ref(),
                order.direction,
            ),
            SortKey::LastNoticeAt => {
                nulls_last(a.cache.last_notice_at, b.cache.last_notice_at, order.direction)
            }
            SortKey::LastDeployAt => {
                nulls_last(a.cache.last_deploy_at, b.cache.last_deploy_at, order.direction)
            }
            SortKey::Count => nulls_last(
                Some(a.cache.notices_count),
                Some(b.cache.notices_count),
                order.direction,
            ),
        };
        primary.then_with(|| nulls_last(Some(a.id), Some(b.id), order.direction))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sort_key_parses_from_its_name() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().expect("parse"), key);
        }
    }

    #[test]
    fn unknown_sort_key_is_rejected_by_name() {
        let err = "bogus".parse::<SortKey>().expect_err("must fail");
        assert!(matches!(err, ProblemError::InvalidSortKey(ref key) if key == "bogus"));
    }

    #[test]
    fn direction_parsing_is_case_insensitive() {
        assert_eq!("DESC".parse::<SortDirection>().expect("parse"), SortDirection::Desc);
        assert_eq!("asc".parse::<SortDirection>().expect("parse"), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn keys_and_directions_share_one_parsing_rule() {
        let order = ProblemOrder::parse(" Count", " DESC").expect("parse");
        assert_eq!(order, ProblemOrder::new(SortKey::Count, SortDirection::Desc));
        assert_eq!(
            "LAST_NOTICE_AT ".parse::<SortKey>().expect("parse"),
            SortKey::LastNoticeAt
        );
        let err = " Bogus".parse::<SortKey>().expect_err("must fail");
        assert!(matches!(err, ProblemError::InvalidSortKey(ref key) if key == " Bogus"));
    }

    #[test]
    fn default_order_is_most_recent_notice_first() {
        let order = ProblemOrder::default();
        assert_eq!(order.key, SortKey::LastNoticeAt);
        assert_eq!(order.direction, SortDirection::Desc);
        assert_eq!(
            order.sql_clause(),
            "ORDER BY p.last_notice_at_us IS NULL ASC, p.last_notice_at_us DESC, p.problem_id DESC"
        );
    }

    #[test]
    fn blank_environment_matches_everything() {
        assert_eq!(ProblemFilter::default().in_env(Some("  ")).environment, None);
        assert_eq!(
            ProblemFilter::default().in_env(Some("production")).environment,
            Some("production".to_string())
        );
        assert_eq!(ProblemFilter::default().in_env(None).environment, None);
    }
}
