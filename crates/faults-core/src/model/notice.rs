use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ErrId, NoticeId};

/// One reported occurrence of an error. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: NoticeId,
    pub err_id: ErrId,
    pub message: String,
    pub environment_name: String,
    pub klass: String,
    /// Code location the error was raised from.
    pub location: String,
    pub host: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Notice payload handed over by the ingestion pipeline, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewNotice {
    pub message: String,
    pub environment_name: String,
    pub klass: String,
    pub location: String,
    pub host: String,
    pub user_agent: String,
    pub created_at: Option<DateTime<Utc>>,
}
