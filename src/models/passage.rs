use serde::{Deserialize, Serialize};

use super::enums::StructuralRole;

/// Smallest unit of retrievable document text, produced entirely by the
/// indexing collaborator. Never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural_role: Option<StructuralRole>,
}

impl Passage {
    /// True for title/subtitle passages, the batcher's section markers.
    pub fn is_header(&self) -> bool {
        matches!(
            self.structural_role,
            Some(StructuralRole::Title) | Some(StructuralRole::Subtitle)
        )
    }
}

/// Inclusive page span covered by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// A contiguous, structure-aligned group of passages sent to extraction as
/// one unit. Created once by the batcher, consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageBatch {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_header: Option<String>,
    pub passages: Vec<Passage>,
    pub total_chars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_range: Option<PageRange>,
}
