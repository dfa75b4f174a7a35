use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::errors::GatewayError;

const MAX_DETAILS_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

#[derive(Clone)]
pub enum UpstreamBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// An outbound call. Headers, query and body may carry credentials, so the
/// `Debug` impl prints only the verb and URL.
#[derive(Clone)]
pub struct UpstreamRequest {
    pub verb: Verb,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<UpstreamBody>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            verb: Verb::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            verb: Verb::Post,
            ..Self::get(url)
        }
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(UpstreamBody::Json(body));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(UpstreamBody::Form(fields));
        self
    }
}

impl fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("verb", &self.verb)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, GatewayError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| GatewayError::Shape(format!("upstream body is not valid JSON: {e}")))
    }
}

/// Transport seam for everything the gateway sends to third parties.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, GatewayError>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, GatewayError> {
        let mut builder = match request.verb {
            Verb::Get => self.client.get(&request.url),
            Verb::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(UpstreamBody::Json(body)) => builder.json(body),
            Some(UpstreamBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        // reqwest errors embed the full URL, query string (and API key) included.
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;
        Ok(RawResponse { status, body })
    }
}

/// Issues upstream calls under a deadline. Dropping the in-flight future on
/// expiry aborts the network operation. No retries.
#[derive(Clone)]
pub struct RequestExecutor {
    upstream: Arc<dyn Upstream>,
}

impl RequestExecutor {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    pub async fn call(
        &self,
        request: UpstreamRequest,
        limit: Duration,
    ) -> Result<RawResponse, GatewayError> {
        let url = request.url.clone();
        let response = match timeout(limit, self.upstream.send(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(%url, timeout_ms = limit.as_millis() as u64, "upstream call timed out");
                return Err(GatewayError::Timeout);
            }
        };

        if response.is_success() {
            return Ok(response);
        }

        let details = diagnostic_text(&response.body);
        warn!(%url, status = response.status, "upstream returned an error");
        Err(GatewayError::Upstream {
            status: response.status,
            details,
        })
    }
}

/// Body of an error response as text, truncated; `None` when empty.
fn diagnostic_text(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= MAX_DETAILS_CHARS {
        return Some(text.to_string());
    }
    let mut truncated: String = text.chars().take(MAX_DETAILS_CHARS).collect();
    truncated.push_str("...");
    Some(truncated)
}
