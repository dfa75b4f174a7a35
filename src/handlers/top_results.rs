use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};

use super::{json_reply, parse_body, to_json_bytes};
use crate::errors::{reject, GatewayError, Route};
use crate::models::{AppState, SearchParams, TopResultsRequest, TopResultsResponse};
use crate::services::locale::{country_restrict, language_restrict};
use crate::services::redact::{params_used, scrub};
use crate::services::transform::normalize_search_results;
use crate::services::UpstreamRequest;

pub const RESULTS_PER_PAGE: &str = "10";
const SECRET_PARAMS: &[&str] = &["key", "cx"];

/// A validated `/top-results` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub params: SearchParams,
}

impl SearchQuery {
    pub fn from_request(request: TopResultsRequest) -> Result<Self, GatewayError> {
        let q = request
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| GatewayError::Validation("Query parameter q is required".to_string()))?
            .to_string();

        let params = SearchParams {
            lr: request
                .language_id
                .and_then(|l| l.normalized())
                .and_then(|l| language_restrict(&l)),
            cr: request
                .region_id
                .and_then(|r| r.normalized())
                .and_then(|r| country_restrict(&r)),
        };
        Ok(Self { q, params })
    }

    /// Restricts are `lang_xx`/`countryXX`, so only the term needs encoding.
    pub fn serp_key(&self) -> String {
        format!(
            "serp:{}:{}:{}",
            urlencoding::encode(&self.q.to_lowercase()),
            self.params.lr.as_deref().unwrap_or_default(),
            self.params.cr.as_deref().unwrap_or_default(),
        )
    }

    /// Query parameters in the order they are sent, credentials first.
    pub fn query_params(&self, key: &SecretString, cx: &SecretString) -> Vec<(String, String)> {
        let mut params = vec![
            ("key".to_string(), key.expose_secret().to_string()),
            ("cx".to_string(), cx.expose_secret().to_string()),
            ("q".to_string(), self.q.clone()),
            ("num".to_string(), RESULTS_PER_PAGE.to_string()),
        ];
        if let Some(lr) = &self.params.lr {
            params.push(("lr".to_string(), lr.clone()));
        }
        if let Some(cr) = &self.params.cr {
            params.push(("cr".to_string(), cr.clone()));
        }
        params
    }
}

pub async fn top_results(
    body: Bytes,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, warp::Rejection> {
    search(&state, &body).await.map_err(|error| {
        info!(
            status = error.status().as_u16(),
            error = %error,
            "top-results request failed"
        );
        reject(Route::TopResults, error)
    })
}

async fn search(state: &AppState, body: &[u8]) -> Result<warp::reply::Response, GatewayError> {
    let query = SearchQuery::from_request(parse_body(body)?)?;

    let secrets = &state.config.secrets;
    let (Some(api_key), Some(engine_id)) =
        (secrets.cse_api_key.as_ref(), secrets.cse_engine_id.as_ref())
    else {
        return Err(GatewayError::Config(secrets.missing_search_secrets()));
    };

    let serp_key = query.serp_key();
    if let Some(cached) = state.search_cache.lookup(&serp_key).await {
        debug!(%serp_key, "top-results cache hit");
        return Ok(json_reply(cached));
    }

    let params = query.query_params(api_key, engine_id);
    let used = params_used(&params, SECRET_PARAMS, &[api_key, engine_id]);
    let request = params.iter().fold(
        UpstreamRequest::get(state.config.cse_url.as_str()),
        |request, (name, value)| request.query(name, value.as_str()),
    );

    let raw = state
        .executor
        .call(request, state.config.search_timeout)
        .await
        .map_err(|e| match e {
            GatewayError::Upstream { status, details } => GatewayError::Upstream {
                status,
                details: details.map(|d| scrub(&d, &[api_key, engine_id])),
            },
            other => other,
        })?;
    let results = normalize_search_results(&raw.json()?)?;

    let response = TopResultsResponse {
        results,
        params: query.params,
        q: query.q,
        params_used: used,
        serp_key: serp_key.clone(),
    };
    debug!(%serp_key, results = response.results.len(), "top-results fetched");
    let body = to_json_bytes(&response)?;
    state.search_cache.store(&serp_key, body.clone()).await;
    Ok(json_reply(body))
}
