//! Extraction client adapter: one structured-extraction call per batch.
//!
//! Formats the batch as numbered, page-annotated text blocks, sends it with
//! the fixed clause schema, and resolves each returned clause back to its
//! source passage. The adapter does not retry; failure handling belongs to
//! the orchestrator.

use std::str::FromStr;

use crate::clients::extraction::{ClauseExtractionClient, ExtractionRequest, RawClause};
use crate::clients::ClientError;
use crate::models::{ExtractedClause, PassageBatch, RiskLevel};

/// Output schema sent with every extraction request.
pub fn clause_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "clauses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "clause_type": { "type": "string" },
                        "title": { "type": "string" },
                        "text": { "type": "string" },
                        "key_points": { "type": "array", "items": { "type": "string" } },
                        "risk_level": { "type": "string", "enum": ["low", "medium", "high"] },
                        "passage_index": {
                            "type": "integer",
                            "description": "1-based index of the passage the clause came from"
                        }
                    },
                    "required": ["clause_type", "title", "text"]
                }
            }
        },
        "required": ["clauses"]
    })
}

/// Render a batch as the text body of one extraction call.
pub fn format_batch_text(batch: &PassageBatch, perspective: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(p) = perspective {
        out.push_str(&format!("Analysis perspective: {p}\n"));
    }
    if let Some(header) = &batch.section_header {
        out.push_str(&format!("Section: {header}\n"));
    }
    if let Some(range) = batch.page_range {
        if range.start == range.end {
            out.push_str(&format!("Page {}\n", range.start));
        } else {
            out.push_str(&format!("Pages {}-{}\n", range.start, range.end));
        }
    }
    out.push('\n');

    for (i, passage) in batch.passages.iter().enumerate() {
        match passage.page_number {
            Some(page) => out.push_str(&format!("[{}] (page {page})\n", i + 1)),
            None => out.push_str(&format!("[{}]\n", i + 1)),
        }
        out.push_str(passage.content.trim());
        out.push_str("\n\n");
    }
    out
}

/// Run one extraction call for `batch` and resolve passage attribution.
pub async fn extract_batch<C: ClauseExtractionClient>(
    client: &C,
    batch: &PassageBatch,
    perspective: Option<&str>,
) -> Result<Vec<ExtractedClause>, ClientError> {
    if batch.passages.is_empty() {
        return Ok(Vec::new());
    }

    let request = ExtractionRequest {
        text: format_batch_text(batch, perspective),
        schema: clause_schema(),
        context: batch.section_header.clone(),
    };

    let raw = client.extract_clauses(&request).await?;
    Ok(raw.into_iter().map(|r| resolve_clause(r, batch)).collect())
}

/// The collaborator's passage index is best-effort: clamp a slightly
/// out-of-range answer into the batch rather than crashing on it.
fn resolve_clause(raw: RawClause, batch: &PassageBatch) -> ExtractedClause {
    let last = batch.passages.len() - 1;
    let passage_idx = raw
        .passage_index
        .map(|n| (n.saturating_sub(1) as usize).min(last))
        .unwrap_or(0);

    let risk_level = raw
        .risk_level
        .as_deref()
        .map(str::to_ascii_lowercase)
        .and_then(|s| RiskLevel::from_str(&s).ok())
        .unwrap_or_else(|| {
            tracing::debug!(
                title = %raw.title,
                raw = ?raw.risk_level,
                "Unrecognized risk level, defaulting to medium"
            );
            RiskLevel::Medium
        });

    ExtractedClause {
        clause_type: raw.clause_type,
        title: raw.title,
        text: raw.text,
        key_points: raw.key_points,
        risk_level,
        source_passage_id: batch.passages[passage_idx].id.clone(),
        source_batch_index: batch.index,
    }
}
