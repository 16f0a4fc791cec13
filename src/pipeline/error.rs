//! Pipeline-level error taxonomy.
//!
//! Only job-aborting conditions appear here. A single batch's extraction
//! failure is absorbed in the extract phase (logged, zero records) and a
//! failed summary call degrades to an empty summary; neither becomes a
//! `PipelineError`.

use thiserror::Error;

use crate::clients::ClientError;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document indexing timed out after {0}s")]
    IndexingTimeout(u64),

    #[error("Document indexing failed: {0}")]
    IndexingFailed(String),

    #[error("Document produced no passages")]
    NoPassages,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Indexing service error: {0}")]
    IndexService(#[from] ClientError),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job task failed: {0}")]
    JobTask(String),
}
