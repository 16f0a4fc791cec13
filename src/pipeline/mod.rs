//! The clause extraction pipeline.
//!
//! Five components connected by the orchestrator:
//! ```text
//! Batcher → Extraction Adapter → Activity Log + Progress Aggregator → Store
//! ```
//!
//! The activity log and the progress aggregator are the only permitted
//! mutation points for their tables; no other component writes activity
//! rows or progress fields directly.

pub mod activity;
pub mod batcher;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod progress;
pub mod review;

pub use activity::ActivityLog;
pub use batcher::{BatchOutcome, PassageBatcher, SkipReason};
pub use error::PipelineError;
pub use orchestrator::{ClausePipeline, ExtractionJobInput, ExtractionOutcome, JobHandle};
pub use progress::ProgressTracker;
