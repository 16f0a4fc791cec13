pub mod repository;
pub mod sqlite;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Invalid timestamp value: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid UUID value: {0}")]
    InvalidUuid(String),

    #[error("JSON column error: {0}")]
    JsonColumn(#[from] serde_json::Error),
}

/// Cloneable handle over a single SQLite connection.
///
/// The pipeline writes activity rows and progress snapshots from concurrent
/// extract-phase futures; serializing access through one mutex keeps each
/// load-merge-store cycle atomic without SQLite busy handling.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(sqlite::open_database(path)?))
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(sqlite::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let db = Db::open_in_memory().unwrap();
        let tables = db.with(|conn| sqlite::count_tables(conn)).unwrap();
        assert!(tables >= 5, "Expected migrated schema, got {tables} tables");
    }

    #[test]
    fn open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clauselens.db");
        let db = Db::open(&path).unwrap();
        db.with(|conn| {
            conn.execute(
                "INSERT INTO documents (id, owner_user_id, name, source_file_id, status,
                 clause_count, created_at, updated_at)
                 VALUES ('d1', 'u1', 'n', 'f1', 'analyzing', 0, '2026-01-01 00:00:00', '2026-01-01 00:00:00')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        // Reopen and verify persistence
        drop(db);
        let db = Db::open(&path).unwrap();
        let count: i64 = db
            .with(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn handle_is_cloneable_across_threads() {
        let db = Db::open_in_memory().unwrap();
        let db2 = db.clone();
        let handle = std::thread::spawn(move || {
            db2.with(|conn| sqlite::count_tables(conn)).unwrap()
        });
        assert!(handle.join().unwrap() >= 5);
    }
}
