use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{secret, GatewayConfig};
use crate::errors::GatewayError;
use crate::services::locale::{country_restrict, is_criterion_id, language_restrict};
use crate::services::redact::{mask_tail, params_used, scrub, REDACTED};
use crate::services::{
    CredentialBroker, RateDecision, RateLimiter, RawResponse, RequestExecutor, ResponseCache,
    Upstream, UpstreamBody, UpstreamRequest,
};

/// Replies with a fixed status and body after an optional delay, recording
/// every request it sees.
struct StubUpstream {
    status: u16,
    body: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<UpstreamRequest>>,
}

impl StubUpstream {
    fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_string(),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            body: "{}".to_string(),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Upstream for StubUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RawResponse {
            status: self.status,
            body: Bytes::from(self.body.clone()),
        })
    }
}

fn oauth_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.oauth_token_url = "https://auth.test/token".to_string();
    config.secrets.client_id = Some(secret("client-id"));
    config.secrets.client_secret = Some(secret("client-secret"));
    config.secrets.refresh_token = Some(secret("refresh-token"));
    config.secrets.customer_id = Some(secret("123-456-7890"));
    config.secrets.developer_token = Some(secret("dev-token"));
    config
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_allows_capacity_then_limits() {
    let limiter = RateLimiter::new(3, Duration::from_secs(5));

    for _ in 0..3 {
        assert_eq!(limiter.check("203.0.113.7").await, RateDecision::Allowed);
    }
    assert_eq!(limiter.check("203.0.113.7").await, RateDecision::Limited);
    // Limited calls do not extend or consume anything further.
    assert_eq!(limiter.check("203.0.113.7").await, RateDecision::Limited);

    // Other clients have their own window.
    assert_eq!(limiter.check("198.51.100.4").await, RateDecision::Allowed);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_window_reset() {
    let limiter = RateLimiter::new(3, Duration::from_secs(5));
    for _ in 0..4 {
        limiter.check("127.0.0.1").await;
    }
    assert_eq!(limiter.check("127.0.0.1").await, RateDecision::Limited);

    // Exactly at the boundary the old window still applies.
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(limiter.check("127.0.0.1").await, RateDecision::Limited);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(limiter.check("127.0.0.1").await, RateDecision::Allowed);
    assert_eq!(limiter.check("127.0.0.1").await, RateDecision::Allowed);
    assert_eq!(limiter.check("127.0.0.1").await, RateDecision::Allowed);
    assert_eq!(limiter.check("127.0.0.1").await, RateDecision::Limited);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_sweep_drops_elapsed_windows() {
    let limiter = RateLimiter::new(3, Duration::from_secs(5));
    limiter.check("a").await;
    limiter.check("b").await;
    tokio::time::advance(Duration::from_secs(4)).await;
    limiter.check("c").await;

    assert_eq!(limiter.sweep().await, 0);
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(limiter.sweep().await, 2);
    assert_eq!(limiter.tracked_clients().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_operations() {
    let cache = ResponseCache::new(Duration::from_secs(120));
    let body = Bytes::from_static(b"{\"results\":[]}");

    assert!(cache.lookup("k").await.is_none());
    cache.store("k", body.clone()).await;
    assert_eq!(cache.lookup("k").await, Some(body));
    assert!(cache.lookup("other").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cache_expiration_evicts_on_read() {
    let cache = ResponseCache::new(Duration::from_secs(120));
    cache.store("k", Bytes::from_static(b"old")).await;

    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(cache.lookup("k").await, Some(Bytes::from_static(b"old")));
    assert_eq!(cache.len().await, 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.lookup("k").await.is_none());
    assert!(cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_cache_store_is_last_writer_wins() {
    let cache = ResponseCache::new(Duration::from_secs(120));
    cache.store("k", Bytes::from_static(b"first")).await;
    cache.store("k", Bytes::from_static(b"second")).await;
    assert_eq!(cache.lookup("k").await, Some(Bytes::from_static(b"second")));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_executor_passes_success_through() {
    let upstream = StubUpstream::new(200, "{\"ok\":true}");
    let executor = RequestExecutor::new(upstream.clone());

    let response = executor
        .call(UpstreamRequest::get("https://api.test/"), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap(), json!({ "ok": true }));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_executor_mirrors_upstream_status() {
    let upstream = StubUpstream::new(403, "{\"error\":{\"message\":\"PERMISSION_DENIED\"}}");
    let executor = RequestExecutor::new(upstream);

    let err = executor
        .call(UpstreamRequest::get("https://api.test/"), Duration::from_secs(1))
        .await
        .unwrap_err();
    match &err {
        GatewayError::Upstream { status, details } => {
            assert_eq!(*status, 403);
            assert!(details.as_deref().unwrap().contains("PERMISSION_DENIED"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status().as_u16(), 403);
}

#[tokio::test]
async fn test_executor_truncates_long_details() {
    let upstream = StubUpstream::new(500, &"x".repeat(5000));
    let executor = RequestExecutor::new(upstream);

    let err = executor
        .call(UpstreamRequest::get("https://api.test/"), Duration::from_secs(1))
        .await
        .unwrap_err();
    let details = err.details().unwrap();
    assert!(details.len() < 2100);
    assert!(details.ends_with("..."));
}

#[tokio::test(start_paused = true)]
async fn test_executor_timeout() {
    let upstream = StubUpstream::slow(Duration::from_secs(30));
    let executor = RequestExecutor::new(upstream);

    let err = executor
        .call(UpstreamRequest::get("https://api.test/"), Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout));
    assert_eq!(err.status().as_u16(), 408);
}

#[test]
fn test_upstream_request_debug_hides_credentials() {
    let request = UpstreamRequest::get("https://api.test/search")
        .query("key", "super-secret-key")
        .header("authorization", "Bearer super-secret-token");
    let printed = format!("{request:?}");
    assert!(printed.contains("https://api.test/search"));
    assert!(!printed.contains("super-secret"));
}

#[tokio::test]
async fn test_broker_exchanges_refresh_token() {
    let upstream = StubUpstream::new(200, "{\"access_token\":\"ya29.fresh\",\"expires_in\":3599}");
    let config = Arc::new(oauth_config());
    let broker = CredentialBroker::new(config, RequestExecutor::new(upstream.clone()));

    assert!(broker.validate_config());
    let credential = broker.get_fresh_access_token().await.unwrap();
    assert_eq!(
        secrecy::ExposeSecret::expose_secret(&credential.access_token),
        "ya29.fresh"
    );
    assert_eq!(credential.expires_in, Some(3599));
    assert!(!format!("{credential:?}").contains("ya29.fresh"));

    let seen = upstream.seen.lock().unwrap();
    assert_eq!(seen[0].url, "https://auth.test/token");
    match &seen[0].body {
        Some(UpstreamBody::Form(fields)) => {
            assert!(fields.contains(&("grant_type".to_string(), "refresh_token".to_string())));
            assert!(fields.contains(&("refresh_token".to_string(), "refresh-token".to_string())));
        }
        _ => panic!("token exchange must be form encoded"),
    }
}

#[tokio::test]
async fn test_broker_does_not_reuse_tokens() {
    let upstream = StubUpstream::new(200, "{\"access_token\":\"t\",\"expires_in\":3599}");
    let broker = CredentialBroker::new(
        Arc::new(oauth_config()),
        RequestExecutor::new(upstream.clone()),
    );

    broker.get_fresh_access_token().await.unwrap();
    broker.get_fresh_access_token().await.unwrap();
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_broker_missing_secrets_fails_before_network() {
    let upstream = StubUpstream::new(200, "{\"access_token\":\"t\"}");
    let mut config = oauth_config();
    config.secrets.refresh_token = None;
    let broker = CredentialBroker::new(Arc::new(config), RequestExecutor::new(upstream.clone()));

    assert!(!broker.validate_config());
    assert_eq!(broker.missing_secrets(), vec!["GOOGLE_ADS_REFRESH_TOKEN"]);
    let err = broker.get_fresh_access_token().await.unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
    assert_eq!(err.status().as_u16(), 500);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_broker_rejected_exchange_is_auth_error() {
    let upstream = StubUpstream::new(400, "{\"error\":\"invalid_grant\"}");
    let broker = CredentialBroker::new(Arc::new(oauth_config()), RequestExecutor::new(upstream));

    let err = broker.get_fresh_access_token().await.unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamAuth(ref d) if d.contains("invalid_grant")));
}

#[tokio::test]
async fn test_broker_missing_token_is_auth_error() {
    let upstream = StubUpstream::new(200, "{\"token_type\":\"Bearer\"}");
    let broker = CredentialBroker::new(Arc::new(oauth_config()), RequestExecutor::new(upstream));

    let err = broker.get_fresh_access_token().await.unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamAuth(_)));
}

#[test]
fn test_params_used_redacts_credentials() {
    let key = secret("AIzaSyExampleKey123");
    let cx = secret("engine:abc123");
    let params = vec![
        ("key".to_string(), "AIzaSyExampleKey123".to_string()),
        ("cx".to_string(), "engine:abc123".to_string()),
        ("q".to_string(), "seo tools".to_string()),
        ("num".to_string(), "10".to_string()),
    ];

    let used = params_used(&params, &["key", "cx"], &[&key, &cx]);
    assert_eq!(
        used,
        format!("key={REDACTED}&cx={REDACTED}&q=seo%20tools&num=10")
    );
}

#[test]
fn test_params_used_scrubs_secrets_echoed_in_input() {
    let key = secret("AIzaSyExampleKey123");
    let cx = secret("engine:abc123");
    let params = vec![
        ("key".to_string(), "AIzaSyExampleKey123".to_string()),
        ("cx".to_string(), "engine:abc123".to_string()),
        ("q".to_string(), "AIzaSyExampleKey123 engine:abc123".to_string()),
    ];

    let used = params_used(&params, &["key", "cx"], &[&key, &cx]);
    assert!(!used.contains("AIzaSyExampleKey123"));
    assert!(!used.contains("engine:abc123"));
    assert!(!used.contains("engine%3Aabc123"));
}

#[test]
fn test_scrub_and_mask() {
    let key = secret("abcdef123456");
    assert_eq!(scrub("key was abcdef123456!", &[&key]), format!("key was {REDACTED}!"));
    assert_eq!(mask_tail(&key, 4), "****3456");
    assert_eq!(mask_tail(&secret("ab"), 4), "****");
}

#[test]
fn test_locale_restricts() {
    assert_eq!(language_restrict("1000").as_deref(), Some("lang_en"));
    assert_eq!(language_restrict("DE").as_deref(), Some("lang_de"));
    assert_eq!(language_restrict("9999"), None);
    assert_eq!(country_restrict("2840").as_deref(), Some("countryUS"));
    assert_eq!(country_restrict("gb").as_deref(), Some("countryGB"));
    assert_eq!(country_restrict("usa"), None);

    assert!(is_criterion_id("2840"));
    assert!(!is_criterion_id("28a0"));
    assert!(!is_criterion_id(""));
}
