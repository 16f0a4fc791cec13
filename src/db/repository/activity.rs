use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Activity, ActivityStatus, ActivityType};

/// Look up the existing row for `(job_id, activity_type, unique_key)`.
///
/// This is the read half of the append idempotency check; there is no lock
/// across check and insert. Call sites keep correctness by using a distinct
/// deterministic key per logical event.
pub fn find_activity_id(
    conn: &Connection,
    job_id: &str,
    activity_type: ActivityType,
    unique_key: &str,
) -> Result<Option<Uuid>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id FROM activities
         WHERE job_id = ?1 AND activity_type = ?2 AND unique_key = ?3",
        params![job_id, activity_type.as_str(), unique_key],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(id) => Ok(Some(parse_uuid(&id)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_activity(conn: &Connection, activity: &Activity) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO activities (id, job_id, owner_user_id, activity_type, status,
         body, unique_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            activity.id.to_string(),
            activity.job_id,
            activity.owner_user_id,
            activity.activity_type.as_str(),
            activity.status.as_str(),
            activity.text,
            activity.unique_key,
            activity.created_at.to_string(),
        ],
    )?;
    Ok(())
}

/// Partial update: any `None` field is left unchanged.
pub fn update_activity(
    conn: &Connection,
    id: &Uuid,
    status: Option<ActivityStatus>,
    text: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE activities SET
         status = COALESCE(?2, status),
         body = COALESCE(?3, body)
         WHERE id = ?1",
        params![id.to_string(), status.map(|s| s.as_str()), text],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "activity".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// All of a job's activities in creation order, scoped to the owning user.
pub fn list_activities(
    conn: &Connection,
    job_id: &str,
    owner_user_id: &str,
) -> Result<Vec<Activity>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, job_id, owner_user_id, activity_type, status, body, unique_key, created_at
         FROM activities WHERE job_id = ?1 AND owner_user_id = ?2
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![job_id, owner_user_id], |row| {
        Ok(ActivityRow {
            id: row.get(0)?,
            job_id: row.get(1)?,
            owner_user_id: row.get(2)?,
            activity_type: row.get(3)?,
            status: row.get(4)?,
            body: row.get(5)?,
            unique_key: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    let mut activities = Vec::new();
    for row in rows {
        activities.push(activity_from_row(row?)?);
    }
    Ok(activities)
}

/// Bulk cleanup of a job's log.
pub fn delete_activities(conn: &Connection, job_id: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM activities WHERE job_id = ?1", params![job_id])?;
    Ok(deleted)
}

struct ActivityRow {
    id: String,
    job_id: String,
    owner_user_id: String,
    activity_type: String,
    status: String,
    body: String,
    unique_key: Option<String>,
    created_at: String,
}

fn activity_from_row(row: ActivityRow) -> Result<Activity, DatabaseError> {
    Ok(Activity {
        id: parse_uuid(&row.id)?,
        job_id: row.job_id,
        owner_user_id: row.owner_user_id,
        activity_type: ActivityType::from_str(&row.activity_type)?,
        status: ActivityStatus::from_str(&row.status)?,
        text: row.body,
        unique_key: row.unique_key,
        created_at: parse_datetime(&row.created_at)?,
    })
}
