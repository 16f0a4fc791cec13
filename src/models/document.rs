use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentStatus;

/// Parent record for one extraction job's output. Created at phase-1 start
/// with status `analyzing`, moved to `completed` with the final clause count
/// in the persist phase, or to `error` on fatal failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_user_id: String,
    pub name: String,
    pub source_file_id: String,
    pub status: DocumentStatus,
    pub clause_count: u32,
    pub summary: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Document {
    pub fn new(owner_user_id: &str, name: &str, source_file_id: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            name: name.to_string(),
            source_file_id: source_file_id.to_string(),
            status: DocumentStatus::Analyzing,
            clause_count: 0,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_starts_analyzing() {
        let doc = Document::new("user-1", "MSA.pdf", "file-9");
        assert_eq!(doc.status, DocumentStatus::Analyzing);
        assert_eq!(doc.clause_count, 0);
        assert!(doc.summary.is_none());
    }
}
