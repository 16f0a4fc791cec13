//! Clauselens — contract clause extraction pipeline.
//!
//! Takes an uploaded document that an external indexing service turns into
//! retrievable text passages, groups those passages into structure-aligned
//! batches, runs bounded-concurrency clause extraction against each batch,
//! persists the results, and reports live, monotonically-advancing progress
//! to an observer document.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator → Batcher (once)
//!              → Extraction Adapter (per batch, 3-way concurrent)
//!              → Activity Log + Progress Aggregator (continuously)
//!              → SQLite store (clauses, chunked inserts)
//!              → Extraction Adapter again (summary)
//! ```
//!
//! The indexing service, the structured-extraction service, and the progress
//! observer are external collaborators behind narrow trait seams in
//! [`clients`]; everything that mutates shared state goes through the
//! activity log and progress aggregator in [`pipeline`].

pub mod clients;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

pub use config::PipelineConfig;
pub use db::Db;
pub use pipeline::error::PipelineError;
pub use pipeline::orchestrator::{
    ClausePipeline, ExtractionJobInput, ExtractionOutcome, JobHandle,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the crate default filter, honoring `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
