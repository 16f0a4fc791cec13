//! Passage batcher: orders passages into structure-aligned batches.
//!
//! Section boundaries are the natural unit of semantic coherence for the
//! downstream extraction call; grouping by document structure rather than
//! fixed-size windows reduces duplicate extractions across batch
//! boundaries. The size cap is a safety valve against pathologically long
//! sections. Pure function: no I/O, no randomness, single linear pass.

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::models::{PageRange, Passage, PassageBatch};

/// Why a passage was excluded from every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Shorter than the minimum content length.
    TooShort,
    /// A title/subtitle too short to open a section of its own.
    HeaderOnly,
}

#[derive(Debug, Clone)]
pub struct SkippedPassage {
    pub passage: Passage,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total_passages: u32,
    pub batched_passages: u32,
    pub skipped_passages: u32,
    pub batch_count: u32,
}

/// Result of one batching pass. Every input passage lands in exactly one
/// batch or in `skipped` — never both, never neither.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batches: Vec<PassageBatch>,
    pub skipped: Vec<SkippedPassage>,
    pub stats: BatchStats,
}

pub struct PassageBatcher {
    min_passage_chars: usize,
    header_section_min_chars: usize,
    max_batch_size: usize,
}

impl PassageBatcher {
    pub fn new() -> Self {
        Self::from_config(&PipelineConfig::default())
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            min_passage_chars: config.min_passage_chars,
            header_section_min_chars: config.header_section_min_chars,
            max_batch_size: config.max_batch_size.max(1),
        }
    }

    pub fn batch(&self, passages: &[Passage]) -> BatchOutcome {
        let mut batches: Vec<PassageBatch> = Vec::new();
        let mut skipped: Vec<SkippedPassage> = Vec::new();
        let mut current = CurrentBatch::empty();

        for passage in passages {
            if passage.content.len() < self.min_passage_chars {
                skipped.push(SkippedPassage {
                    passage: passage.clone(),
                    reason: SkipReason::TooShort,
                });
                continue;
            }

            if passage.is_header() {
                if passage.content.len() < self.header_section_min_chars {
                    skipped.push(SkippedPassage {
                        passage: passage.clone(),
                        reason: SkipReason::HeaderOnly,
                    });
                    continue;
                }
                // Section boundary: flush and open a new batch led by the
                // header passage itself.
                current.flush_into(&mut batches);
                current.section_header = Some(passage.content.trim().to_string());
                current.passages.push(passage.clone());
                continue;
            }

            if current.passages.len() >= self.max_batch_size {
                // Size cap inside a long section: the continuation batch
                // keeps the section header for extraction context.
                let header = current.section_header.clone();
                current.flush_into(&mut batches);
                current.section_header = header;
            }
            current.passages.push(passage.clone());
        }

        current.flush_into(&mut batches);

        let batched: u32 = batches.iter().map(|b| b.passages.len() as u32).sum();
        let stats = BatchStats {
            total_passages: passages.len() as u32,
            batched_passages: batched,
            skipped_passages: skipped.len() as u32,
            batch_count: batches.len() as u32,
        };

        BatchOutcome {
            batches,
            skipped,
            stats,
        }
    }
}

impl Default for PassageBatcher {
    fn default() -> Self {
        Self::new()
    }
}

struct CurrentBatch {
    section_header: Option<String>,
    passages: Vec<Passage>,
}

impl CurrentBatch {
    fn empty() -> Self {
        Self {
            section_header: None,
            passages: Vec::new(),
        }
    }

    /// Emit the in-progress batch if non-empty, resetting self.
    fn flush_into(&mut self, batches: &mut Vec<PassageBatch>) {
        if self.passages.is_empty() {
            self.section_header = None;
            return;
        }
        let passages = std::mem::take(&mut self.passages);
        let total_chars = passages.iter().map(|p| p.content.len()).sum();
        let page_range = page_range_of(&passages);
        batches.push(PassageBatch {
            index: batches.len(),
            section_header: self.section_header.take(),
            passages,
            total_chars,
            page_range,
        });
    }
}

fn page_range_of(passages: &[Passage]) -> Option<PageRange> {
    let mut range: Option<PageRange> = None;
    for page in passages.iter().filter_map(|p| p.page_number) {
        range = Some(match range {
            None => PageRange {
                start: page,
                end: page,
            },
            Some(r) => PageRange {
                start: r.start.min(page),
                end: r.end.max(page),
            },
        });
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StructuralRole;

    fn body(id: &str, chars: usize) -> Passage {
        Passage {
            id: id.to_string(),
            content: "x".repeat(chars),
            page_number: None,
            position: None,
            structural_role: Some(StructuralRole::Body),
        }
    }

    fn body_on_page(id: &str, chars: usize, page: u32) -> Passage {
        Passage {
            page_number: Some(page),
            ..body(id, chars)
        }
    }

    fn header(id: &str, text: &str) -> Passage {
        Passage {
            id: id.to_string(),
            content: text.to_string(),
            page_number: None,
            position: None,
            structural_role: Some(StructuralRole::Title),
        }
    }

    fn long_header(id: &str, name: &str) -> Passage {
        // Pad the section name past the 100-char boundary threshold
        header(id, &format!("{name}{}", " - General Terms and Conditions".repeat(4)))
    }

    #[test]
    fn empty_input_produces_nothing() {
        let outcome = PassageBatcher::new().batch(&[]);
        assert!(outcome.batches.is_empty());
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.stats, BatchStats::default());
    }

    #[test]
    fn unstructured_document_splits_by_size_cap() {
        // 23 ordinary passages, no headers: ceil(23/10) = 3 batches
        let passages: Vec<Passage> = (0..23).map(|i| body(&format!("p{i}"), 200)).collect();
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 3);
        let sizes: Vec<usize> = outcome.batches.iter().map(|b| b.passages.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert!(outcome.batches.iter().all(|b| b.section_header.is_none()));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn section_headers_open_new_batches() {
        let passages = vec![
            long_header("h1", "Intro"),
            body("b1", 200),
            body("b2", 60),
            long_header("h2", "Terms"),
            body("b3", 300),
        ];
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 2);
        let first = &outcome.batches[0];
        assert!(first.section_header.as_deref().unwrap().starts_with("Intro"));
        assert_eq!(
            first.passages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["h1", "b1", "b2"]
        );
        let second = &outcome.batches[1];
        assert!(second.section_header.as_deref().unwrap().starts_with("Terms"));
        assert_eq!(
            second.passages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["h2", "b3"]
        );
    }

    #[test]
    fn header_passage_is_first_member_of_its_batch() {
        let passages = vec![body("b0", 120), long_header("h1", "Payment"), body("b1", 120)];
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 2);
        assert_eq!(outcome.batches[1].passages[0].id, "h1");
    }

    #[test]
    fn short_passages_skipped_as_too_short() {
        let passages = vec![body("b1", 200), body("tiny", 10), body("b2", 200)];
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.batches[0].passages.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, SkipReason::TooShort);
        assert_eq!(outcome.skipped[0].passage.id, "tiny");
    }

    #[test]
    fn short_header_skipped_as_header_only() {
        // Long enough to clear the noise floor, too short to open a section
        let passages = vec![body("b1", 200), header("h1", &"Definitions ".repeat(6)), body("b2", 200)];
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.batches[0].passages.len(), 2);
        assert_eq!(outcome.skipped[0].reason, SkipReason::HeaderOnly);
    }

    #[test]
    fn trailing_short_header_is_dropped_not_emitted_empty() {
        let passages = vec![body("b1", 200), header("h1", &"Appendix ".repeat(7))];
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.batches.iter().all(|b| !b.passages.is_empty()));
    }

    #[test]
    fn long_section_continuation_keeps_header() {
        let mut passages = vec![long_header("h1", "Liability")];
        for i in 0..12 {
            passages.push(body(&format!("b{i}"), 150));
        }
        let outcome = PassageBatcher::new().batch(&passages);

        assert_eq!(outcome.batches.len(), 2);
        assert_eq!(outcome.batches[0].passages.len(), 10);
        assert_eq!(outcome.batches[1].passages.len(), 3);
        assert_eq!(
            outcome.batches[0].section_header,
            outcome.batches[1].section_header
        );
    }

    #[test]
    fn every_passage_batched_or_skipped_exactly_once() {
        let passages = vec![
            body("b1", 10),
            long_header("h1", "One"),
            body("b2", 200),
            header("h2", &"Short ".repeat(10)),
            body("b3", 400),
            body("b4", 49),
        ];
        let outcome = PassageBatcher::new().batch(&passages);

        let mut seen: Vec<&str> = outcome
            .batches
            .iter()
            .flat_map(|b| b.passages.iter().map(|p| p.id.as_str()))
            .chain(outcome.skipped.iter().map(|s| s.passage.id.as_str()))
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
        assert_eq!(
            outcome.stats.batched_passages + outcome.stats.skipped_passages,
            outcome.stats.total_passages
        );
    }

    #[test]
    fn batching_is_deterministic() {
        let passages: Vec<Passage> = (0..40)
            .map(|i| {
                if i % 7 == 0 {
                    long_header(&format!("h{i}"), "Section")
                } else {
                    body(&format!("b{i}"), 60 + i)
                }
            })
            .collect();
        let batcher = PassageBatcher::new();
        let a = batcher.batch(&passages);
        let b = batcher.batch(&passages);

        assert_eq!(a.batches.len(), b.batches.len());
        for (x, y) in a.batches.iter().zip(&b.batches) {
            assert_eq!(x.section_header, y.section_header);
            let ids_x: Vec<&str> = x.passages.iter().map(|p| p.id.as_str()).collect();
            let ids_y: Vec<&str> = y.passages.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids_x, ids_y);
        }
        assert_eq!(a.skipped.len(), b.skipped.len());
    }

    #[test]
    fn batch_records_char_total_and_page_range() {
        let passages = vec![
            body_on_page("b1", 100, 3),
            body_on_page("b2", 150, 5),
            body("b3", 75),
        ];
        let outcome = PassageBatcher::new().batch(&passages);

        let batch = &outcome.batches[0];
        assert_eq!(batch.total_chars, 325);
        assert_eq!(batch.page_range, Some(PageRange { start: 3, end: 5 }));
    }

    #[test]
    fn page_range_absent_when_no_passage_has_one() {
        let passages = vec![body("b1", 100), body("b2", 150)];
        let outcome = PassageBatcher::new().batch(&passages);
        assert!(outcome.batches[0].page_range.is_none());
    }

    #[test]
    fn batch_indices_are_contiguous() {
        let passages: Vec<Passage> = (0..25).map(|i| body(&format!("b{i}"), 100)).collect();
        let outcome = PassageBatcher::new().batch(&passages);
        for (i, batch) in outcome.batches.iter().enumerate() {
            assert_eq!(batch.index, i);
        }
    }
}
