use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{JobStatus, ProgressSnapshot};

/// Load a job's snapshot, if one has been created.
pub fn get_snapshot(
    conn: &Connection,
    job_id: &str,
) -> Result<Option<ProgressSnapshot>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT progress, status, sources, activities, passage_stats, current_batch,
             clauses, summary, error
             FROM progress_snapshots WHERE job_id = ?1",
            params![job_id],
            |row| {
                Ok(SnapshotRow {
                    progress: row.get(0)?,
                    status: row.get(1)?,
                    sources: row.get(2)?,
                    activities: row.get(3)?,
                    passage_stats: row.get(4)?,
                    current_batch: row.get(5)?,
                    clauses: row.get(6)?,
                    summary: row.get(7)?,
                    error: row.get(8)?,
                })
            },
        )
        .optional()?;

    match row {
        Some(row) => Ok(Some(snapshot_from_row(row)?)),
        None => Ok(None),
    }
}

/// Write the full merged snapshot for a job (insert or replace).
pub fn upsert_snapshot(
    conn: &Connection,
    job_id: &str,
    owner_user_id: &str,
    snapshot: &ProgressSnapshot,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO progress_snapshots
         (job_id, owner_user_id, progress, status, sources, activities, passage_stats,
          current_batch, clauses, summary, error, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(job_id) DO UPDATE SET
           progress = excluded.progress,
           status = excluded.status,
           sources = excluded.sources,
           activities = excluded.activities,
           passage_stats = excluded.passage_stats,
           current_batch = excluded.current_batch,
           clauses = excluded.clauses,
           summary = excluded.summary,
           error = excluded.error,
           updated_at = excluded.updated_at",
        params![
            job_id,
            owner_user_id,
            snapshot.progress,
            snapshot.status.as_str(),
            serde_json::to_string(&snapshot.sources)?,
            serde_json::to_string(&snapshot.activities)?,
            snapshot
                .passage_stats
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            snapshot
                .current_batch
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            snapshot
                .clauses
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            snapshot.summary,
            snapshot.error,
            chrono::Utc::now().naive_utc().to_string(),
        ],
    )?;
    Ok(())
}

/// Remove a job's snapshot row, if any.
pub fn delete_snapshot(conn: &Connection, job_id: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM progress_snapshots WHERE job_id = ?1",
        params![job_id],
    )?;
    Ok(())
}

struct SnapshotRow {
    progress: u8,
    status: String,
    sources: String,
    activities: String,
    passage_stats: Option<String>,
    current_batch: Option<String>,
    clauses: Option<String>,
    summary: Option<String>,
    error: Option<String>,
}

fn snapshot_from_row(row: SnapshotRow) -> Result<ProgressSnapshot, DatabaseError> {
    Ok(ProgressSnapshot {
        progress: row.progress,
        status: JobStatus::from_str(&row.status)?,
        sources: serde_json::from_str(&row.sources)?,
        activities: serde_json::from_str(&row.activities)?,
        passage_stats: row
            .passage_stats
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        current_batch: row
            .current_batch
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        clauses: row.clauses.as_deref().map(serde_json::from_str).transpose()?,
        summary: row.summary,
        error: row.error,
    })
}
