use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::GatewayConfig;
use crate::services::{
    CredentialBroker, HttpUpstream, RateLimiter, RequestExecutor, ResponseCache, Upstream,
};

/// A serialized response body and the moment it was stored. Never mutated
/// after insertion; a newer store replaces it wholesale.
#[derive(Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Bytes,
    pub stored_at: Instant,
}

pub struct RateWindow {
    pub count: u32,
    pub window_start: Instant,
}

/// An identifier that clients may send either as a JSON string or number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Text(String),
    Number(u64),
}

impl IdValue {
    /// Trimmed textual form; `None` when blank.
    pub fn normalized(&self) -> Option<String> {
        let text = match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        };
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIdeasRequest {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub region_id: Option<IdValue>,
    #[serde(default)]
    pub language_id: Option<IdValue>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIdea {
    pub keyword: String,
    pub avg_monthly_searches: u64,
    pub competition_index: u64,
}

impl KeywordIdea {
    /// Placeholder for a record that could not be read.
    pub fn unknown() -> Self {
        Self {
            keyword: "Unknown".to_string(),
            avg_monthly_searches: 0,
            competition_index: 0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIdeasResponse {
    pub elapsed_ms: u64,
    pub results: Vec<KeywordIdea>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopResultsRequest {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub language_id: Option<IdValue>,
    #[serde(default)]
    pub region_id: Option<IdValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub display_link: String,
}

impl SearchResult {
    pub fn unknown() -> Self {
        Self {
            title: "Unknown".to_string(),
            link: String::new(),
            display_link: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopResultsResponse {
    pub results: Vec<SearchResult>,
    pub params: SearchParams,
    pub q: String,
    pub params_used: String,
    pub serp_key: String,
}

/// Services shared by every request, built once at startup.
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub rate_limiter: RateLimiter,
    pub keyword_cache: ResponseCache,
    pub search_cache: ResponseCache,
    pub broker: CredentialBroker,
    pub executor: RequestExecutor,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_upstream(config, Arc::new(HttpUpstream::new()))
    }

    pub fn with_upstream(config: GatewayConfig, upstream: Arc<dyn Upstream>) -> Self {
        let config = Arc::new(config);
        let executor = RequestExecutor::new(upstream);
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window),
            keyword_cache: ResponseCache::new(config.cache_ttl),
            search_cache: ResponseCache::new(config.cache_ttl),
            broker: CredentialBroker::new(config.clone(), executor.clone()),
            executor,
            config,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        self.config.rate_limit_sweep
    }
}
