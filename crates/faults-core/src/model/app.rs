use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppId;

/// An application that reports errors and owns problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A deployment of an app to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    pub app_id: AppId,
    pub environment: String,
    pub revision: Option<String>,
    pub created_at: DateTime<Utc>,
}
