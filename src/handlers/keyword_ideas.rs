use bytes::Bytes;
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{json_reply, parse_body, to_json_bytes};
use crate::config::GatewayConfig;
use crate::errors::{reject, GatewayError, Route};
use crate::models::{AppState, KeywordIdeasRequest, KeywordIdeasResponse};
use crate::services::locale::{is_criterion_id, DEFAULT_LANGUAGE_ID, DEFAULT_REGION_ID};
use crate::services::transform::normalize_keyword_ideas;
use crate::services::{Credential, RateDecision, UpstreamRequest};

pub const DEFAULT_PAGE_SIZE: i64 = 15;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// A validated `/keyword-ideas` request with every qualifier resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordQuery {
    pub keyword: String,
    pub region_id: String,
    pub language_id: String,
    pub page_size: i64,
}

impl KeywordQuery {
    pub fn from_request(request: KeywordIdeasRequest) -> Result<Self, GatewayError> {
        let keyword = request
            .keyword
            .as_deref()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GatewayError::Validation("Keyword is required".to_string()))?;

        let region_id = request
            .region_id
            .and_then(|r| r.normalized())
            .unwrap_or_else(|| DEFAULT_REGION_ID.to_string());
        if !is_criterion_id(&region_id) {
            return Err(GatewayError::Validation(format!(
                "regionId must be a numeric geo target id, got {region_id:?}"
            )));
        }

        let language_id = request
            .language_id
            .and_then(|l| l.normalized())
            .unwrap_or_else(|| DEFAULT_LANGUAGE_ID.to_string());
        if !is_criterion_id(&language_id) {
            return Err(GatewayError::Validation(format!(
                "languageId must be a numeric language id, got {language_id:?}"
            )));
        }

        let page_size = request.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(GatewayError::Validation(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(Self {
            keyword,
            region_id,
            language_id,
            page_size,
        })
    }

    /// The ids are digits only, so encoding the keyword keeps the key unambiguous.
    pub fn cache_key(&self) -> String {
        format!(
            "keyword-ideas:{}:{}:{}:{}",
            urlencoding::encode(&self.keyword),
            self.region_id,
            self.language_id,
            self.page_size
        )
    }

    fn upstream_request(
        &self,
        config: &GatewayConfig,
        credential: &Credential,
    ) -> Result<UpstreamRequest, GatewayError> {
        let secrets = &config.secrets;
        let (Some(customer_id), Some(developer_token)) =
            (secrets.customer_id.as_ref(), secrets.developer_token.as_ref())
        else {
            return Err(GatewayError::Config(secrets.missing_keyword_secrets()));
        };

        let url = format!(
            "{}/{}/customers/{}:generateKeywordIdeas",
            config.ads_api_base.trim_end_matches('/'),
            config.ads_api_version,
            digits_only(customer_id.expose_secret()),
        );
        let mut request = UpstreamRequest::post(url)
            .header(
                "authorization",
                format!("Bearer {}", credential.access_token.expose_secret()),
            )
            .header("developer-token", developer_token.expose_secret());
        if let Some(login) = secrets.login_customer_id.as_ref() {
            request = request.header("login-customer-id", digits_only(login.expose_secret()));
        }

        Ok(request.json(json!({
            "keywordSeed": { "keywords": [self.keyword] },
            "language": format!("languageConstants/{}", self.language_id),
            "geoTargetConstants": [format!("geoTargetConstants/{}", self.region_id)],
            "keywordPlanNetwork": "GOOGLE_SEARCH",
            "includeAdultKeywords": false,
            "pageSize": self.page_size,
        })))
    }
}

fn digits_only(id: &str) -> String {
    id.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub async fn keyword_ideas(
    client_id: String,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let started = Instant::now();
    match generate(&state, &client_id, &body, started).await {
        Ok(response) => Ok(response),
        Err(error) => {
            info!(
                client = %client_id,
                status = error.status().as_u16(),
                error = %error,
                "keyword-ideas request failed"
            );
            Err(reject(Route::KeywordIdeas, error))
        }
    }
}

async fn generate(
    state: &AppState,
    client_id: &str,
    body: &[u8],
    started: Instant,
) -> Result<warp::reply::Response, GatewayError> {
    if state.rate_limiter.check(client_id).await == RateDecision::Limited {
        warn!(client = %client_id, "rate limit exceeded");
        return Err(GatewayError::RateLimited);
    }

    let query = KeywordQuery::from_request(parse_body(body)?)?;

    if !state.broker.validate_config() {
        return Err(GatewayError::Config(state.broker.missing_secrets()));
    }

    let key = query.cache_key();
    if let Some(cached) = state.keyword_cache.lookup(&key).await {
        debug!(%key, "keyword-ideas cache hit");
        return Ok(json_reply(cached));
    }

    let credential = state.broker.get_fresh_access_token().await?;
    let request = query.upstream_request(&state.config, &credential)?;
    let raw = state
        .executor
        .call(request, state.config.keyword_timeout)
        .await?;
    let page = normalize_keyword_ideas(&raw.json()?)?;

    let response = KeywordIdeasResponse {
        elapsed_ms: started.elapsed().as_millis() as u64,
        results: page.ideas,
        next_page_token: page.next_page_token,
    };
    debug!(
        %key,
        results = response.results.len(),
        elapsed_ms = response.elapsed_ms,
        "keyword-ideas fetched"
    );
    let body = to_json_bytes(&response)?;
    state.keyword_cache.store(&key, body.clone()).await;
    Ok(json_reply(body))
}
