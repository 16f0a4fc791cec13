//! HTTP collaborators: the document indexing service and the structured
//! extraction service. Both are narrow trait seams with reqwest-backed
//! implementations and mock counterparts for tests.

pub mod extraction;
pub mod indexing;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Cannot reach service at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Service error (HTTP {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

pub(crate) fn map_reqwest_error(base_url: &str, timeout_secs: u64, e: reqwest::Error) -> ClientError {
    if e.is_connect() {
        ClientError::Connection(base_url.to_string())
    } else if e.is_timeout() {
        ClientError::Timeout(timeout_secs)
    } else {
        ClientError::ResponseParsing(e.to_string())
    }
}
