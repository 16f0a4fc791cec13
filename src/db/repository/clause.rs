use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{ClauseFilter, ClauseRecord, ExtractedClause, RiskLevel};

/// Insert clause rows in fixed-size chunks, one transaction per chunk, to
/// bound statement size. The records are written once and never updated.
pub fn insert_clauses_chunked(
    conn: &Connection,
    records: &[ClauseRecord],
    chunk_size: usize,
) -> Result<(), DatabaseError> {
    for chunk in records.chunks(chunk_size.max(1)) {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO clauses (id, document_id, owner_user_id, clause_type, title,
                 body, key_points, risk_level, source_passage_id, source_batch_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for record in chunk {
                stmt.execute(params![
                    record.id.to_string(),
                    record.document_id.to_string(),
                    record.owner_user_id,
                    record.clause.clause_type,
                    record.clause.title,
                    record.clause.text,
                    serde_json::to_string(&record.clause.key_points)?,
                    record.clause.risk_level.as_str(),
                    record.clause.source_passage_id,
                    record.clause.source_batch_index,
                    record.created_at.to_string(),
                ])?;
            }
        }
        tx.commit()?;
    }
    Ok(())
}

/// List a document's clauses in stored (batch) order, with optional
/// risk/type filters and limit/offset pagination.
pub fn list_clauses(
    conn: &Connection,
    document_id: &Uuid,
    owner_user_id: &str,
    filter: &ClauseFilter,
) -> Result<Vec<ClauseRecord>, DatabaseError> {
    let mut sql = String::from(
        "SELECT id, document_id, owner_user_id, clause_type, title, body,
         key_points, risk_level, source_passage_id, source_batch_index, created_at
         FROM clauses WHERE document_id = ?1 AND owner_user_id = ?2",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(document_id.to_string()),
        Box::new(owner_user_id.to_string()),
    ];

    if let Some(risk) = filter.risk_level {
        args.push(Box::new(risk.as_str().to_string()));
        sql.push_str(&format!(" AND risk_level = ?{}", args.len()));
    }
    if let Some(ref ty) = filter.clause_type {
        args.push(Box::new(ty.clone()));
        sql.push_str(&format!(" AND clause_type = ?{}", args.len()));
    }

    sql.push_str(" ORDER BY source_batch_index ASC, rowid ASC");

    args.push(Box::new(filter.limit.unwrap_or(u32::MAX)));
    sql.push_str(&format!(" LIMIT ?{}", args.len()));
    args.push(Box::new(filter.offset.unwrap_or(0)));
    sql.push_str(&format!(" OFFSET ?{}", args.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
        Ok(ClauseRow {
            id: row.get(0)?,
            document_id: row.get(1)?,
            owner_user_id: row.get(2)?,
            clause_type: row.get(3)?,
            title: row.get(4)?,
            body: row.get(5)?,
            key_points: row.get(6)?,
            risk_level: row.get(7)?,
            source_passage_id: row.get(8)?,
            source_batch_index: row.get(9)?,
            created_at: row.get(10)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(clause_from_row(row?)?);
    }
    Ok(records)
}

pub fn count_clauses(conn: &Connection, document_id: &Uuid) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM clauses WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(count)
}

struct ClauseRow {
    id: String,
    document_id: String,
    owner_user_id: String,
    clause_type: String,
    title: String,
    body: String,
    key_points: String,
    risk_level: String,
    source_passage_id: String,
    source_batch_index: usize,
    created_at: String,
}

fn clause_from_row(row: ClauseRow) -> Result<ClauseRecord, DatabaseError> {
    Ok(ClauseRecord {
        id: parse_uuid(&row.id)?,
        document_id: parse_uuid(&row.document_id)?,
        owner_user_id: row.owner_user_id,
        clause: ExtractedClause {
            clause_type: row.clause_type,
            title: row.title,
            text: row.body,
            key_points: serde_json::from_str(&row.key_points)?,
            risk_level: RiskLevel::from_str(&row.risk_level)?,
            source_passage_id: row.source_passage_id,
            source_batch_index: row.source_batch_index,
        },
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::document::insert_document;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Document;

    fn make_clause(i: usize, risk: RiskLevel) -> ExtractedClause {
        ExtractedClause {
            clause_type: if i % 2 == 0 { "payment" } else { "liability" }.to_string(),
            title: format!("Clause {i}"),
            text: format!("The parties agree to clause number {i}."),
            key_points: vec![format!("point {i}")],
            risk_level: risk,
            source_passage_id: format!("p-{i}"),
            source_batch_index: i / 3,
        }
    }

    fn seed(conn: &Connection, n: usize) -> Uuid {
        let doc = Document::new("user-1", "MSA.pdf", "file-1");
        insert_document(conn, &doc).unwrap();
        let records: Vec<ClauseRecord> = (0..n)
            .map(|i| {
                let risk = if i % 3 == 0 { RiskLevel::High } else { RiskLevel::Low };
                ClauseRecord::from_extracted(doc.id, "user-1", make_clause(i, risk))
            })
            .collect();
        insert_clauses_chunked(conn, &records, 50).unwrap();
        doc.id
    }

    #[test]
    fn chunked_insert_stores_all_rows() {
        let conn = open_memory_database().unwrap();
        let doc = Document::new("user-1", "MSA.pdf", "file-1");
        insert_document(&conn, &doc).unwrap();
        let records: Vec<ClauseRecord> = (0..123)
            .map(|i| ClauseRecord::from_extracted(doc.id, "user-1", make_clause(i, RiskLevel::Low)))
            .collect();

        // Chunk size smaller than the record count forces several transactions
        insert_clauses_chunked(&conn, &records, 50).unwrap();
        assert_eq!(count_clauses(&conn, &doc.id).unwrap(), 123);
    }

    #[test]
    fn list_preserves_batch_order() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed(&conn, 9);
        let records = list_clauses(&conn, &doc_id, "user-1", &ClauseFilter::default()).unwrap();
        assert_eq!(records.len(), 9);
        let indices: Vec<usize> = records
            .iter()
            .map(|r| r.clause.source_batch_index)
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn risk_filter_applies() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed(&conn, 9);
        let filter = ClauseFilter {
            risk_level: Some(RiskLevel::High),
            ..Default::default()
        };
        let records = list_clauses(&conn, &doc_id, "user-1", &filter).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.clause.risk_level == RiskLevel::High));
    }

    #[test]
    fn pagination_applies() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed(&conn, 9);
        let filter = ClauseFilter {
            limit: Some(4),
            offset: Some(6),
            ..Default::default()
        };
        let records = list_clauses(&conn, &doc_id, "user-1", &filter).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn listing_scoped_to_owner() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed(&conn, 3);
        let records = list_clauses(&conn, &doc_id, "user-2", &ClauseFilter::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn document_delete_cascades_to_clauses() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed(&conn, 5);
        assert!(crate::db::repository::document::delete_document(&conn, &doc_id, "user-1").unwrap());
        assert_eq!(count_clauses(&conn, &doc_id).unwrap(), 0);
    }
}
