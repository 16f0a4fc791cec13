use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ActivityStatus, ActivityType};

/// A single human-readable progress event attached to a job.
///
/// Invariant: for a given `(job_id, activity_type, unique_key)` triple at
/// most one row exists. That idempotency contract makes the log safe to
/// write from a step the surrounding execution may re-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub job_id: String,
    pub owner_user_id: String,
    pub activity_type: ActivityType,
    pub status: ActivityStatus,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_key: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Activity {
    pub fn new(
        job_id: &str,
        owner_user_id: &str,
        activity_type: ActivityType,
        text: &str,
        unique_key: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            owner_user_id: owner_user_id.to_string(),
            activity_type,
            status: ActivityStatus::InProgress,
            text: text.to_string(),
            unique_key: unique_key.map(str::to_string),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_activity_starts_in_progress() {
        let a = Activity::new(
            "job-1",
            "user-1",
            ActivityType::Extracting,
            "Extracting: Termination",
            Some("extract-batch-2"),
        );
        assert_eq!(a.status, ActivityStatus::InProgress);
        assert_eq!(a.unique_key.as_deref(), Some("extract-batch-2"));
    }
}
