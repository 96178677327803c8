use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppId, ErrId, ProblemId};

/// An error signature: the bucket of notices considered the same defect.
///
/// Every err is owned by exactly one problem. `problem_id` only changes
/// through merge and unmerge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrRecord {
    pub id: ErrId,
    pub problem_id: ProblemId,
    pub app_id: AppId,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}
