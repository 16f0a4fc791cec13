//! Progress aggregator: load-merge-store over the job's snapshot row.
//!
//! Every update runs under a single connection guard, so concurrent batch
//! completions serialize and the merge rules hold:
//! - `progress` is monotone (max of stored and patch)
//! - a terminal status freezes the snapshot
//! - `sources` union by id, never duplicated
//! - `activities` are re-read from the activity log on every write

use crate::db::repository::{activity as activity_repo, progress as repo};
use crate::db::{Db, DatabaseError};
use crate::models::{ProgressPatch, ProgressSnapshot};

#[derive(Clone)]
pub struct ProgressTracker {
    db: Db,
    job_id: String,
    owner_user_id: String,
}

impl ProgressTracker {
    pub fn new(db: Db, job_id: &str, owner_user_id: &str) -> Self {
        Self {
            db,
            job_id: job_id.to_string(),
            owner_user_id: owner_user_id.to_string(),
        }
    }

    /// Merge `patch` into the stored snapshot and return the merged result.
    ///
    /// If the stored status is already terminal the patch is discarded and
    /// the stored snapshot returned unchanged.
    pub fn update(&self, patch: ProgressPatch) -> Result<ProgressSnapshot, DatabaseError> {
        self.db.with(|conn| {
            let mut snapshot = repo::get_snapshot(conn, &self.job_id)?
                .unwrap_or_else(ProgressSnapshot::initial);

            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }

            if let Some(p) = patch.progress {
                snapshot.progress = snapshot.progress.max(p);
            }
            if let Some(status) = patch.status {
                snapshot.status = status;
            }
            for source in patch.sources {
                if !snapshot.sources.iter().any(|s| s.id == source.id) {
                    snapshot.sources.push(source);
                }
            }
            if let Some(stats) = patch.passage_stats {
                snapshot.passage_stats = Some(stats);
            }
            if let Some(batch) = patch.current_batch {
                snapshot.current_batch = Some(batch);
            }
            if let Some(clauses) = patch.clauses {
                snapshot.clauses = Some(clauses);
            }
            if let Some(summary) = patch.summary {
                snapshot.summary = Some(summary);
            }
            if let Some(error) = patch.error {
                snapshot.error = Some(error);
            }

            snapshot.activities =
                activity_repo::list_activities(conn, &self.job_id, &self.owner_user_id)?;

            repo::upsert_snapshot(conn, &self.job_id, &self.owner_user_id, &snapshot)?;
            Ok(snapshot)
        })
    }

    /// The stored snapshot, or the initial one if nothing was written yet.
    pub fn snapshot(&self) -> Result<ProgressSnapshot, DatabaseError> {
        self.db.with(|conn| {
            Ok(repo::get_snapshot(conn, &self.job_id)?.unwrap_or_else(ProgressSnapshot::initial))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, ActivityType, JobStatus, SourceRef};

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Db::open_in_memory().unwrap(), "job-1", "user-1")
    }

    fn source(id: &str) -> SourceRef {
        SourceRef {
            id: id.into(),
            name: format!("{id}.pdf"),
        }
    }

    #[test]
    fn progress_never_regresses() {
        let t = tracker();
        t.update(ProgressPatch::progress(70)).unwrap();
        let snap = t.update(ProgressPatch::progress(40)).unwrap();
        assert_eq!(snap.progress, 70);

        let snap = t.update(ProgressPatch::progress(95)).unwrap();
        assert_eq!(snap.progress, 95);
    }

    #[test]
    fn terminal_status_freezes_snapshot() {
        let t = tracker();
        let mut patch = ProgressPatch::progress(100);
        patch.status = Some(JobStatus::Done);
        patch.summary = Some("All good.".into());
        t.update(patch).unwrap();

        let mut late = ProgressPatch::progress(100);
        late.status = Some(JobStatus::Errored);
        late.error = Some("stale writer".into());
        let snap = t.update(late).unwrap();
        assert_eq!(snap.status, JobStatus::Done);
        assert!(snap.error.is_none());
        assert_eq!(snap.summary.as_deref(), Some("All good."));
    }

    #[test]
    fn sources_union_by_id() {
        let t = tracker();
        let mut patch = ProgressPatch::default();
        patch.sources = vec![source("file-1")];
        t.update(patch).unwrap();

        let mut patch = ProgressPatch::default();
        patch.sources = vec![source("file-1"), source("file-2")];
        let snap = t.update(patch).unwrap();
        assert_eq!(snap.sources.len(), 2);
    }

    #[test]
    fn omitted_fields_keep_current_values() {
        let t = tracker();
        let mut patch = ProgressPatch::progress(10);
        patch.summary = Some("early".into());
        t.update(patch).unwrap();

        let snap = t.update(ProgressPatch::progress(50)).unwrap();
        assert_eq!(snap.summary.as_deref(), Some("early"));
    }

    #[test]
    fn activities_refreshed_from_log_on_every_update() {
        let db = Db::open_in_memory().unwrap();
        let t = ProgressTracker::new(db.clone(), "job-1", "user-1");
        t.update(ProgressPatch::progress(10)).unwrap();

        db.with(|conn| {
            crate::db::repository::activity::insert_activity(
                conn,
                &Activity::new("job-1", "user-1", ActivityType::Reading, "Reading", None),
            )
        })
        .unwrap();

        let snap = t.update(ProgressPatch::progress(20)).unwrap();
        assert_eq!(snap.activities.len(), 1);
        assert_eq!(snap.activities[0].text, "Reading");
    }

    #[test]
    fn snapshot_defaults_to_initial() {
        let snap = tracker().snapshot().unwrap();
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.status, JobStatus::InProgress);
    }
}
