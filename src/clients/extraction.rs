use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{map_reqwest_error, ClientError};

/// One structured-extraction call: batch text, target schema, optional
/// free-form context (section header, analysis perspective).
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub text: String,
    pub schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// A clause as the extraction service returns it, before the adapter
/// resolves passage attribution. `passage_index` is 1-based and untrusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawClause {
    pub clause_type: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub passage_index: Option<u32>,
}

/// The structured-extraction collaborator: an opaque, fallible,
/// latency-bearing RPC. The pipeline never retries it; batch-level failures
/// are absorbed upstream.
pub trait ClauseExtractionClient: Send + Sync + 'static {
    fn extract_clauses(
        &self,
        request: &ExtractionRequest,
    ) -> impl Future<Output = Result<Vec<RawClause>, ClientError>> + Send;

    /// Short natural-language answer over `text` (used for the job summary).
    fn answer(
        &self,
        text: &str,
        question: &str,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    clauses: Vec<RawClause>,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    text: &'a str,
    question: &'a str,
}

#[derive(Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    answer: String,
}

/// HTTP implementation over the extraction service's REST surface.
pub struct HttpExtractionClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpExtractionClient {
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

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&self.base_url, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Service {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::ResponseParsing(e.to_string()))
    }
}

impl ClauseExtractionClient for HttpExtractionClient {
    async fn extract_clauses(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Vec<RawClause>, ClientError> {
        let response: ExtractResponse = self.post_json("/v1/extract", request).await?;
        Ok(response.clauses)
    }

    async fn answer(&self, text: &str, question: &str) -> Result<String, ClientError> {
        let response: AnswerResponse = self
            .post_json("/v1/answer", &AnswerRequest { text, question })
            .await?;
        Ok(response.answer)
    }
}

/// Scripted extraction client for tests: a queue of per-call results in
/// dispatch order, plus a fixed answer for summary calls.
pub struct MockExtractionClient {
    results: Mutex<VecDeque<Result<Vec<RawClause>, ClientError>>>,
    answer: Mutex<Result<String, ClientError>>,
}

impl MockExtractionClient {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            answer: Mutex::new(Ok(String::new())),
        }
    }

    pub fn push_clauses(self, clauses: Vec<RawClause>) -> Self {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(clauses));
        self
    }

    pub fn push_failure(self) -> Self {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(ClientError::Service {
                status: 502,
                body: "mock extraction failure".into(),
            }));
        self
    }

    pub fn with_answer(self, answer: &str) -> Self {
        *self.answer.lock().unwrap_or_else(|e| e.into_inner()) = Ok(answer.to_string());
        self
    }

    pub fn with_answer_failure(self) -> Self {
        *self.answer.lock().unwrap_or_else(|e| e.into_inner()) = Err(ClientError::Timeout(30));
        self
    }
}

impl Default for MockExtractionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ClauseExtractionClient for MockExtractionClient {
    async fn extract_clauses(
        &self,
        _request: &ExtractionRequest,
    ) -> Result<Vec<RawClause>, ClientError> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            // An unscripted call yields no clauses rather than failing
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn answer(&self, _text: &str, _question: &str) -> Result<String, ClientError> {
        match &*self.answer.lock().unwrap_or_else(|e| e.into_inner()) {
            Ok(s) => Ok(s.clone()),
            Err(_) => Err(ClientError::Timeout(30)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_clause(title: &str, passage_index: Option<u32>) -> RawClause {
        RawClause {
            clause_type: "termination".into(),
            title: title.into(),
            text: "Either party may terminate with 30 days notice.".into(),
            key_points: vec!["30 days".into()],
            risk_level: Some("medium".into()),
            passage_index,
        }
    }

    #[tokio::test]
    async fn mock_replays_results_in_order() {
        let client = MockExtractionClient::new()
            .push_clauses(vec![raw_clause("A", Some(1))])
            .push_failure()
            .push_clauses(vec![]);

        let req = ExtractionRequest {
            text: "t".into(),
            schema: serde_json::json!({}),
            context: None,
        };
        assert_eq!(client.extract_clauses(&req).await.unwrap()[0].title, "A");
        assert!(client.extract_clauses(&req).await.is_err());
        assert!(client.extract_clauses(&req).await.unwrap().is_empty());
        // Queue exhausted: empty result, not an error
        assert!(client.extract_clauses(&req).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mock_answer_modes() {
        let ok = MockExtractionClient::new().with_answer("A services agreement.");
        assert_eq!(ok.answer("digest", "q").await.unwrap(), "A services agreement.");

        let failing = MockExtractionClient::new().with_answer_failure();
        assert!(failing.answer("digest", "q").await.is_err());
    }

    #[test]
    fn raw_clause_tolerates_sparse_response() {
        let clause: RawClause = serde_json::from_str(
            r#"{"clause_type":"payment","title":"Fees","text":"Fees are due net-30."}"#,
        )
        .unwrap();
        assert!(clause.key_points.is_empty());
        assert!(clause.risk_level.is_none());
        assert!(clause.passage_index.is_none());
    }

    #[test]
    fn http_client_trims_trailing_slash() {
        let client = HttpExtractionClient::new("http://localhost:8300/", 60).unwrap();
        assert_eq!(client.base_url, "http://localhost:8300");
    }
}
