use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RiskLevel;

/// A single contractual clause extracted from one batch.
///
/// The set of all clauses from all batches is the pipeline's output,
/// written once to the store and never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedClause {
    pub clause_type: String,
    pub title: String,
    pub text: String,
    pub key_points: Vec<String>,
    pub risk_level: RiskLevel,
    /// Id of the passage this clause was extracted from, resolved by the
    /// adapter from the collaborator's 1-based index (clamped, not trusted).
    pub source_passage_id: String,
    pub source_batch_index: usize,
}

/// Persisted clause row, scoped to an owning document and user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub owner_user_id: String,
    pub clause: ExtractedClause,
    pub created_at: NaiveDateTime,
}

impl ClauseRecord {
    pub fn from_extracted(
        document_id: Uuid,
        owner_user_id: &str,
        clause: ExtractedClause,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            owner_user_id: owner_user_id.to_string(),
            clause,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Filter + pagination for clause listing.
#[derive(Debug, Clone, Default)]
pub struct ClauseFilter {
    pub risk_level: Option<RiskLevel>,
    pub clause_type: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_clause() -> ExtractedClause {
        ExtractedClause {
            clause_type: "indemnification".into(),
            title: "Mutual Indemnification".into(),
            text: "Each party shall indemnify the other...".into(),
            key_points: vec!["mutual".into(), "capped at fees paid".into()],
            risk_level: RiskLevel::Medium,
            source_passage_id: "p-42".into(),
            source_batch_index: 3,
        }
    }

    #[test]
    fn record_carries_ownership() {
        let doc_id = Uuid::new_v4();
        let record = ClauseRecord::from_extracted(doc_id, "user-1", sample_clause());
        assert_eq!(record.document_id, doc_id);
        assert_eq!(record.owner_user_id, "user-1");
        assert_eq!(record.clause.source_batch_index, 3);
    }

    #[test]
    fn clause_serde_roundtrip() {
        let clause = sample_clause();
        let json = serde_json::to_string(&clause).unwrap();
        assert!(json.contains("\"risk_level\":\"medium\""));
        let parsed: ExtractedClause = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, clause);
    }
}
