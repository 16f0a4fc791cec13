use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{map_reqwest_error, ClientError};
use crate::models::Passage;

/// Indexing lifecycle of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub state: IndexState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One page of passages plus an opaque continuation token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassagePage {
    pub passages: Vec<Passage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// The document indexing collaborator: poll status until ready, then fetch
/// all passages paginated. That is the entire surface the pipeline needs.
pub trait DocumentIndexClient: Send + Sync + 'static {
    fn status(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<IndexStatus, ClientError>> + Send;

    fn passages(
        &self,
        file_id: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<PassagePage, ClientError>> + Send;
}

/// HTTP implementation over the indexing service's REST surface.
pub struct HttpIndexClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpIndexClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::ResponseParsing(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<Option<T>, ClientError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&self.base_url, self.timeout_secs, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| ClientError::ResponseParsing(e.to_string()))?;
        Ok(Some(parsed))
    }
}

impl DocumentIndexClient for HttpIndexClient {
    async fn status(&self, file_id: &str) -> Result<IndexStatus, ClientError> {
        let url = format!("{}/files/{file_id}/status", self.base_url);
        // A file the service has not seen yet is transient, not failed:
        // the upload may still be propagating when the first poll lands.
        match self.get_json::<IndexStatus>(url).await? {
            Some(status) => Ok(status),
            None => Ok(IndexStatus {
                state: IndexState::Pending,
                reason: Some("file not yet known to the indexing service".into()),
            }),
        }
    }

    async fn passages(
        &self,
        file_id: &str,
        page_token: Option<&str>,
    ) -> Result<PassagePage, ClientError> {
        let mut url = format!("{}/files/{file_id}/passages", self.base_url);
        if let Some(token) = page_token {
            url.push_str("?page_token=");
            url.push_str(token);
        }
        match self.get_json::<PassagePage>(url).await? {
            Some(page) => Ok(page),
            None => Err(ClientError::Service {
                status: 404,
                body: format!("passages for {file_id} not found"),
            }),
        }
    }
}

/// Scripted index client for tests: a queue of status answers and a list of
/// passage pages served in order of continuation token.
#[derive(Default)]
pub struct MockIndexClient {
    statuses: Mutex<VecDeque<IndexStatus>>,
    pages: Vec<PassagePage>,
}

impl MockIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one status answer; the last queued answer repeats once the
    /// queue drains.
    pub fn push_status(mut self, state: IndexState) -> Self {
        self.statuses.get_mut().unwrap_or_else(|e| e.into_inner())
            .push_back(IndexStatus { state, reason: None });
        self
    }

    pub fn push_failed(mut self, reason: &str) -> Self {
        self.statuses.get_mut().unwrap_or_else(|e| e.into_inner())
            .push_back(IndexStatus {
                state: IndexState::Failed,
                reason: Some(reason.to_string()),
            });
        self
    }

    /// Serve `passages` split into pages of `page_size`, chained by tokens.
    pub fn with_passages(mut self, passages: Vec<Passage>, page_size: usize) -> Self {
        let mut pages: Vec<PassagePage> = passages
            .chunks(page_size.max(1))
            .map(|chunk| PassagePage {
                passages: chunk.to_vec(),
                next_page_token: None,
            })
            .collect();
        let total = pages.len();
        for (i, page) in pages.iter_mut().enumerate() {
            if i + 1 < total {
                page.next_page_token = Some(format!("page-{}", i + 1));
            }
        }
        if pages.is_empty() {
            pages.push(PassagePage::default());
        }
        self.pages = pages;
        self
    }
}

impl DocumentIndexClient for MockIndexClient {
    async fn status(&self, _file_id: &str) -> Result<IndexStatus, ClientError> {
        let mut queue = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() > 1 {
            Ok(queue.pop_front().expect("non-empty queue"))
        } else {
            queue.front().cloned().ok_or_else(|| ClientError::Service {
                status: 500,
                body: "mock has no scripted status".into(),
            })
        }
    }

    async fn passages(
        &self,
        _file_id: &str,
        page_token: Option<&str>,
    ) -> Result<PassagePage, ClientError> {
        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ClientError::ResponseParsing(format!("bad token {token}")))?,
        };
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| ClientError::Service {
                status: 404,
                body: format!("no page {index}"),
            })
    }
}
