use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Document, DocumentStatus};

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, owner_user_id, name, source_file_id, status,
         clause_count, summary, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            doc.id.to_string(),
            doc.owner_user_id,
            doc.name,
            doc.source_file_id,
            doc.status.as_str(),
            doc.clause_count,
            doc.summary,
            doc.created_at.to_string(),
            doc.updated_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_document(
    conn: &Connection,
    id: &Uuid,
    owner_user_id: &str,
) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_user_id, name, source_file_id, status, clause_count,
         summary, created_at, updated_at
         FROM documents WHERE id = ?1 AND owner_user_id = ?2",
    )?;

    let result = stmt.query_row(params![id.to_string(), owner_user_id], |row| {
        Ok(DocumentRow {
            id: row.get(0)?,
            owner_user_id: row.get(1)?,
            name: row.get(2)?,
            source_file_id: row.get(3)?,
            status: row.get(4)?,
            clause_count: row.get(5)?,
            summary: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move a document to a new status (and clause count), bumping `updated_at`.
pub fn update_document_status(
    conn: &Connection,
    id: &Uuid,
    status: DocumentStatus,
    clause_count: u32,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE documents SET status = ?2, clause_count = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            id.to_string(),
            status.as_str(),
            clause_count,
            chrono::Utc::now().naive_utc().to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn set_document_summary(
    conn: &Connection,
    id: &Uuid,
    summary: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET summary = ?2, updated_at = ?3 WHERE id = ?1",
        params![
            id.to_string(),
            summary,
            chrono::Utc::now().naive_utc().to_string(),
        ],
    )?;
    Ok(())
}

pub fn list_documents(
    conn: &Connection,
    owner_user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_user_id, name, source_file_id, status, clause_count,
         summary, created_at, updated_at
         FROM documents WHERE owner_user_id = ?1
         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
    )?;

    let rows = stmt.query_map(params![owner_user_id, limit, offset], |row| {
        Ok(DocumentRow {
            id: row.get(0)?,
            owner_user_id: row.get(1)?,
            name: row.get(2)?,
            source_file_id: row.get(3)?,
            status: row.get(4)?,
            clause_count: row.get(5)?,
            summary: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    })?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Delete a document; its clauses go with it via the FK cascade.
pub fn delete_document(
    conn: &Connection,
    id: &Uuid,
    owner_user_id: &str,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM documents WHERE id = ?1 AND owner_user_id = ?2",
        params![id.to_string(), owner_user_id],
    )?;
    Ok(deleted > 0)
}

struct DocumentRow {
    id: String,
    owner_user_id: String,
    name: String,
    source_file_id: String,
    status: String,
    clause_count: u32,
    summary: Option<String>,
    created_at: String,
    updated_at: String,
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: parse_uuid(&row.id)?,
        owner_user_id: row.owner_user_id,
        name: row.name,
        source_file_id: row.source_file_id,
        status: DocumentStatus::from_str(&row.status)?,
        clause_count: row.clause_count,
        summary: row.summary,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}
