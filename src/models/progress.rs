use serde::{Deserialize, Serialize};

use super::activity::Activity;
use super::clause::ExtractedClause;
use super::enums::JobStatus;

/// A source document shown to the observer. Keyed by id; the aggregator
/// unions sources idempotently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub name: String,
}

/// Passage-level counters for the observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageStats {
    pub total_passages: u32,
    pub processed_passages: u32,
    pub skipped_passages: u32,
    pub batch_count: u32,
    pub clauses_found: u32,
}

/// Which batch the extract phase is currently on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub index: usize,
    pub total: usize,
    pub label: String,
}

/// The aggregated progress state of one job, pushed to the observer.
///
/// Invariants: `progress` never regresses across updates; once `status` is
/// terminal no further field changes. `activities` is always refreshed from
/// the activity log, never hand-merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub progress: u8,
    pub status: JobStatus,
    pub sources: Vec<SourceRef>,
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_stats: Option<PassageStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<BatchProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clauses: Option<Vec<ExtractedClause>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressSnapshot {
    /// Fresh snapshot at job start.
    pub fn initial() -> Self {
        Self {
            progress: 0,
            status: JobStatus::InProgress,
            sources: Vec::new(),
            activities: Vec::new(),
            passage_stats: None,
            current_batch: None,
            clauses: None,
            summary: None,
            error: None,
        }
    }
}

/// Partial update applied by the progress aggregator. Omitted fields keep
/// their current value; `progress` only ever raises the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProgressPatch {
    pub progress: Option<u8>,
    pub status: Option<JobStatus>,
    pub sources: Vec<SourceRef>,
    pub passage_stats: Option<PassageStats>,
    pub current_batch: Option<BatchProgress>,
    pub clauses: Option<Vec<ExtractedClause>>,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl ProgressPatch {
    pub fn progress(value: u8) -> Self {
        Self {
            progress: Some(value),
            ..Default::default()
        }
    }

    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_snapshot_is_empty_in_progress() {
        let snap = ProgressSnapshot::initial();
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.status, JobStatus::InProgress);
        assert!(snap.sources.is_empty());
        assert!(snap.clauses.is_none());
    }

    #[test]
    fn snapshot_serde_skips_empty_optionals() {
        let snap = ProgressSnapshot::initial();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("passage_stats"));
        assert!(!json.contains("summary"));
    }
}
