use chrono::{DateTime, Utc};
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::{AppId, Notice, NoticeId, ProblemId};

/// A human-managed grouping of one or more errs.
///
/// Everything under [`ProblemCache`] is derived from the problem's errs and
/// notices and is only ever written by cache recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub app_id: AppId,
    pub resolved: bool,
    pub issue_link: Option<String>,
    #[serde(flatten)]
    pub cache: ProblemCache,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        !self.resolved
    }

    /// Cached messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.cache.notice_log.messages()
    }

    /// Cached hosts, oldest first.
    #[must_use]
    pub fn hosts(&self) -> Vec<&str> {
        self.cache.notice_log.hosts()
    }

    /// Cached user agents, oldest first.
    #[must_use]
    pub fn user_agents(&self) -> Vec<&str> {
        self.cache.notice_log.user_agents()
    }
}

/// Aggregate fields cached on a problem.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProblemCache {
    pub app_name: String,
    pub notices_count: u64,
    pub message: Option<String>,
    pub environment: Option<String>,
    pub klass: Option<String>,
    pub location: Option<String>,
    pub notice_log: NoticeLog,
    pub last_notice_at: Option<DateTime<Utc>>,
    pub last_deploy_at: Option<DateTime<Utc>>,
}

impl ProblemCache {
    /// Overwrite the headline fields with those of `notice`.
    pub fn set_headline(&mut self, notice: &Notice) {
        self.message = Some(notice.message.clone());
        self.environment = Some(notice.environment_name.clone());
        self.klass = Some(notice.klass.clone());
        self.location = Some(notice.location.clone());
    }
}

/// One cached notice: the attribute values shown on a problem without
/// re-querying its notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeLogEntry {
    pub notice_id: NoticeId,
    pub message: String,
    pub host: String,
    pub user_agent: String,
}

impl From<&Notice> for NoticeLogEntry {
    fn from(notice: &Notice) -> Self {
        Self {
            notice_id: notice.id,
            message: notice.message.clone(),
            host: notice.host.clone(),
            user_agent: notice.user_agent.clone(),
        }
    }
}

/// Ordered log of cached notices keyed by notice id, oldest first.
///
/// A notice appears at most once, so removal is exact even when several
/// notices share a message, host, or user agent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoticeLog {
    entries: Vec<NoticeLogEntry>,
}

impl NoticeLog {
    /// Build a log from entries listed oldest first, keeping the newest `limit`.
    #[must_use]
    pub fn from_entries(entries: Vec<NoticeLogEntry>, limit: usize) -> Self {
        let mut log = Self::default();
        for entry in entries {
            log.push(entry, limit);
        }
        log
    }

    /// Append an entry, dropping the oldest ones beyond `limit` (0 = unbounded).
    ///
    /// Returns `false` when the notice is already in the log.
    pub fn push(&mut self, entry: NoticeLogEntry, limit: usize) -> bool {
        if self.contains(entry.notice_id) {
            return false;
        }
        self.entries.push(entry);
        if limit > 0 && self.entries.len() > limit {
            let excess = self.entries.len() - limit;
            self.entries.drain(..excess);
        }
        true
    }

    /// Remove the entry cached for `notice_id`.
    pub fn remove(&mut self, notice_id: NoticeId) -> Option<NoticeLogEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.notice_id == notice_id)?;
        Some(self.entries.remove(index))
    }

    #[must_use]
    pub fn contains(&self, notice_id: NoticeId) -> bool {
        self.entries.iter().any(|entry| entry.notice_id == notice_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[must_use]
    pub fn hosts(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.host.as_str()).collect()
    }

    #[must_use]
    pub fn user_agents(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.user_agent.as_str()).collect()
    }
}

impl ToSql for NoticeLog {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let json = serde_json::to_string(self)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(json))
    }
}

impl FromSql for NoticeLog {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        serde_json::from_str(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, message: &str) -> NoticeLogEntry {
        NoticeLogEntry {
            notice_id: NoticeId(id),
            message: message.to_string(),
            host: format!("web-{id}"),
            user_agent: "curl/8.0".to_string(),
        }
    }

    #[test]
    fn push_ignores_already_cached_notice() {
        let mut log = NoticeLog::default();
        assert!(log.push(entry(1, "boom"), 0));
        assert!(!log.push(entry(1, "boom"), 0));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn push_drops_oldest_beyond_limit() {
        let log = NoticeLog::from_entries(
            vec![entry(1, "a"), entry(2, "b"), entry(3, "c")],
            2,
        );
        assert_eq!(log.messages(), vec!["b", "c"]);
    }

    #[test]
    fn remove_targets_the_exact_notice_among_duplicates() {
        let mut log = NoticeLog::from_entries(
            vec![entry(1, "same"), entry(2, "same"), entry(3, "same")],
            0,
        );

        let removed = log.remove(NoticeId(2)).expect("entry present");
        assert_eq!(removed.host, "web-2");
        assert_eq!(log.hosts(), vec!["web-1", "web-3"]);
        assert!(log.remove(NoticeId(2)).is_none());
    }

    #[test]
    fn log_serializes_as_plain_array() {
        let log = NoticeLog::from_entries(vec![entry(9, "x")], 0);
        let json = serde_json::to_string(&log).expect("serialize");
        assert!(json.starts_with('['));
        let back: NoticeLog = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, log);
    }
}
