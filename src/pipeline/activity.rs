//! Job-scoped activity log.
//!
//! The log is the single writer of activity rows for a job. Appends are
//! idempotent on `(activity_type, unique_key)`, which keeps the log stable
//! when a step runs twice after an interrupted execution.

use uuid::Uuid;

use crate::db::repository::activity as repo;
use crate::db::{Db, DatabaseError};
use crate::models::{Activity, ActivityStatus, ActivityType};

#[derive(Clone)]
pub struct ActivityLog {
    db: Db,
    job_id: String,
    owner_user_id: String,
}

impl ActivityLog {
    pub fn new(db: Db, job_id: &str, owner_user_id: &str) -> Self {
        Self {
            db,
            job_id: job_id.to_string(),
            owner_user_id: owner_user_id.to_string(),
        }
    }

    /// Append an in-progress entry, or return the existing entry's id if one
    /// with the same `(activity_type, unique_key)` was already written.
    pub fn append(
        &self,
        activity_type: ActivityType,
        text: &str,
        unique_key: &str,
    ) -> Result<Uuid, DatabaseError> {
        self.db.with(|conn| {
            if let Some(id) = repo::find_activity_id(conn, &self.job_id, activity_type, unique_key)?
            {
                return Ok(id);
            }
            let activity = Activity::new(
                &self.job_id,
                &self.owner_user_id,
                activity_type,
                text,
                Some(unique_key),
            );
            repo::insert_activity(conn, &activity)?;
            Ok(activity.id)
        })
    }

    /// Partial update of an entry; `None` fields are left unchanged.
    pub fn update(
        &self,
        id: &Uuid,
        status: Option<ActivityStatus>,
        text: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.db.with(|conn| repo::update_activity(conn, id, status, text))
    }

    pub fn mark_done(&self, id: &Uuid, text: &str) -> Result<(), DatabaseError> {
        self.update(id, Some(ActivityStatus::Done), Some(text))
    }

    pub fn mark_error(&self, id: &Uuid, text: &str) -> Result<(), DatabaseError> {
        self.update(id, Some(ActivityStatus::Error), Some(text))
    }

    /// The job's entries in creation order.
    pub fn list(&self) -> Result<Vec<Activity>, DatabaseError> {
        self.db
            .with(|conn| repo::list_activities(conn, &self.job_id, &self.owner_user_id))
    }

    /// Remove every entry for the job. Returns the number deleted.
    pub fn delete_all(&self) -> Result<usize, DatabaseError> {
        self.db.with(|conn| repo::delete_activities(conn, &self.job_id))
    }
}
