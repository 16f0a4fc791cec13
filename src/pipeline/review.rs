//! Optional review pass over assembled clauses.
//!
//! Collapses exact duplicates that arise when a clause spans a batch
//! boundary and both extraction calls report it. Off by default; assembly
//! keeps everything the extractor returned unless the review pass is
//! enabled in config.

use std::collections::HashSet;

use crate::models::ExtractedClause;

/// Drop later occurrences of clauses whose normalized
/// `(clause_type, title, text)` triple was already seen. Order of the
/// survivors is preserved. Returns the kept clauses and the drop count.
pub fn collapse_duplicates(clauses: Vec<ExtractedClause>) -> (Vec<ExtractedClause>, usize) {
    let mut seen = HashSet::new();
    let total = clauses.len();
    let kept: Vec<ExtractedClause> = clauses
        .into_iter()
        .filter(|c| seen.insert(dedup_key(c)))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

fn dedup_key(clause: &ExtractedClause) -> (String, String, String) {
    (
        normalize(&clause.clause_type),
        normalize(&clause.title),
        normalize(&clause.text),
    )
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
