//! Repository functions over the SQLite store.
//!
//! Free functions taking `&Connection`, one module per entity. Enum and
//! timestamp columns are stored as text; list-shaped columns as JSON.

pub mod activity;
pub mod clause;
pub mod document;
pub mod progress;

use chrono::NaiveDateTime;

use super::DatabaseError;

// Timestamps are stored via `NaiveDateTime::to_string`, which uses a space
// separator and an optional fractional part.
pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| DatabaseError::InvalidTimestamp(s.to_string()))
}

pub(crate) fn parse_uuid(s: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(s).map_err(|_| DatabaseError::InvalidUuid(s.to_string()))
}
