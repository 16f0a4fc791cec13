use serde::{Deserialize, Serialize};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "clauselens=info"
}

/// Tunables for one pipeline instance.
///
/// The batching constants mirror the passage batcher contract: passages
/// shorter than `min_passage_chars` are noise, headers need
/// `header_section_min_chars` to open a section, and no batch grows past
/// `max_batch_size` passages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds between indexing-status polls.
    pub poll_interval_secs: u64,
    /// Hard ceiling on the indexing wait; exceeding it fails the job.
    pub index_timeout_secs: u64,
    /// Passages shorter than this are skipped as noise.
    pub min_passage_chars: usize,
    /// Titles/subtitles at or above this length open a new section batch.
    pub header_section_min_chars: usize,
    /// Safety valve against pathologically long sections.
    pub max_batch_size: usize,
    /// Simultaneous in-flight extraction calls during the extract phase.
    pub max_concurrent_extractions: usize,
    /// Clause rows written per insert transaction.
    pub insert_chunk_size: usize,
    /// Collapse exact-duplicate clauses across batch boundaries before
    /// persisting. Off by default: structural batching already minimizes
    /// duplicates and the pass adds latency.
    pub review_pass: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            index_timeout_secs: 120,
            min_passage_chars: 50,
            header_section_min_chars: 100,
            max_batch_size: 10,
            max_concurrent_extractions: 3,
            insert_chunk_size: 50,
            review_pass: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.index_timeout_secs, 120);
        assert_eq!(config.min_passage_chars, 50);
        assert_eq!(config.header_section_min_chars, 100);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.max_concurrent_extractions, 3);
        assert_eq!(config.insert_chunk_size, 50);
        assert!(!config.review_pass);
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = PipelineConfig {
            review_pass: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.review_pass);
        assert_eq!(parsed.max_batch_size, 10);
    }
}
