use secrecy::{ExposeSecret, SecretBox, SecretString};
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
pub const RATE_LIMIT_REQUESTS: u32 = 3; // requests per window
pub const RATE_LIMIT_WINDOW_SECS: u64 = 5; // window size in seconds
pub const RATE_LIMIT_SWEEP_SECS: u64 = 60;
pub const CACHE_DURATION_SECS: u64 = 120; // 2 minutes
pub const KEYWORD_TIMEOUT_MS: u64 = 10_000;
pub const SEARCH_TIMEOUT_MS: u64 = 8_000;
pub const TOKEN_TIMEOUT_MS: u64 = 10_000;

pub const ADS_API_BASE: &str = "https://googleads.googleapis.com";
pub const ADS_API_VERSION: &str = "v17";
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

pub const ENV_CUSTOMER_ID: &str = "GOOGLE_ADS_CUSTOMER_ID";
pub const ENV_DEVELOPER_TOKEN: &str = "GOOGLE_ADS_DEVELOPER_TOKEN";
pub const ENV_CLIENT_ID: &str = "GOOGLE_ADS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "GOOGLE_ADS_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "GOOGLE_ADS_REFRESH_TOKEN";
pub const ENV_LOGIN_CUSTOMER_ID: &str = "GOOGLE_ADS_LOGIN_CUSTOMER_ID";
pub const ENV_CSE_API_KEY: &str = "GOOGLE_CSE_API_KEY";
pub const ENV_CSE_ENGINE_ID: &str = "GOOGLE_CSE_ENGINE_ID";

/// Process-level secrets. Every field is optional at startup; each route
/// checks the ones it needs before touching the network.
#[derive(Clone, Default)]
pub struct Secrets {
    pub customer_id: Option<SecretString>,
    pub developer_token: Option<SecretString>,
    pub client_id: Option<SecretString>,
    pub client_secret: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub login_customer_id: Option<SecretString>,
    pub cse_api_key: Option<SecretString>,
    pub cse_engine_id: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            customer_id: secret_var(ENV_CUSTOMER_ID),
            developer_token: secret_var(ENV_DEVELOPER_TOKEN),
            client_id: secret_var(ENV_CLIENT_ID),
            client_secret: secret_var(ENV_CLIENT_SECRET),
            refresh_token: secret_var(ENV_REFRESH_TOKEN),
            login_customer_id: secret_var(ENV_LOGIN_CUSTOMER_ID),
            cse_api_key: secret_var(ENV_CSE_API_KEY),
            cse_engine_id: secret_var(ENV_CSE_ENGINE_ID),
        }
    }

    /// Names of the keyword-metrics secrets that are unset or blank.
    pub fn missing_keyword_secrets(&self) -> Vec<&'static str> {
        missing(&[
            (ENV_CUSTOMER_ID, &self.customer_id),
            (ENV_DEVELOPER_TOKEN, &self.developer_token),
            (ENV_CLIENT_ID, &self.client_id),
            (ENV_CLIENT_SECRET, &self.client_secret),
            (ENV_REFRESH_TOKEN, &self.refresh_token),
        ])
    }

    /// Names of the web-search secrets that are unset or blank.
    pub fn missing_search_secrets(&self) -> Vec<&'static str> {
        missing(&[
            (ENV_CSE_API_KEY, &self.cse_api_key),
            (ENV_CSE_ENGINE_ID, &self.cse_engine_id),
        ])
    }

    /// Every secret slot with its variable name, for the startup log.
    pub fn all(&self) -> [(&'static str, &Option<SecretString>); 8] {
        [
            (ENV_CUSTOMER_ID, &self.customer_id),
            (ENV_DEVELOPER_TOKEN, &self.developer_token),
            (ENV_CLIENT_ID, &self.client_id),
            (ENV_CLIENT_SECRET, &self.client_secret),
            (ENV_REFRESH_TOKEN, &self.refresh_token),
            (ENV_LOGIN_CUSTOMER_ID, &self.login_customer_id),
            (ENV_CSE_API_KEY, &self.cse_api_key),
            (ENV_CSE_ENGINE_ID, &self.cse_engine_id),
        ]
    }
}

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_sweep: Duration,
    pub cache_ttl: Duration,
    pub keyword_timeout: Duration,
    pub search_timeout: Duration,
    pub token_timeout: Duration,
    pub ads_api_base: String,
    pub ads_api_version: String,
    pub oauth_token_url: String,
    pub cse_url: String,
    pub secrets: Secrets,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDR.to_string(),
            rate_limit_requests: RATE_LIMIT_REQUESTS,
            rate_limit_window: Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
            rate_limit_sweep: Duration::from_secs(RATE_LIMIT_SWEEP_SECS),
            cache_ttl: Duration::from_secs(CACHE_DURATION_SECS),
            keyword_timeout: Duration::from_millis(KEYWORD_TIMEOUT_MS),
            search_timeout: Duration::from_millis(SEARCH_TIMEOUT_MS),
            token_timeout: Duration::from_millis(TOKEN_TIMEOUT_MS),
            ads_api_base: ADS_API_BASE.to_string(),
            ads_api_version: ADS_API_VERSION.to_string(),
            oauth_token_url: OAUTH_TOKEN_URL.to_string(),
            cse_url: CSE_URL.to_string(),
            secrets: Secrets::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_address: std::env::var("GATEWAY_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            rate_limit_requests: std::env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(RATE_LIMIT_REQUESTS),
            rate_limit_window: Duration::from_secs(
                std::env::var("RATE_LIMIT_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(RATE_LIMIT_WINDOW_SECS),
            ),
            rate_limit_sweep: Duration::from_secs(
                std::env::var("RATE_LIMIT_SWEEP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(RATE_LIMIT_SWEEP_SECS),
            ),
            cache_ttl: Duration::from_secs(
                std::env::var("CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(CACHE_DURATION_SECS),
            ),
            keyword_timeout: millis_var("KEYWORD_TIMEOUT_MS", KEYWORD_TIMEOUT_MS),
            search_timeout: millis_var("SEARCH_TIMEOUT_MS", SEARCH_TIMEOUT_MS),
            token_timeout: millis_var("TOKEN_TIMEOUT_MS", TOKEN_TIMEOUT_MS),
            ads_api_base: std::env::var("GOOGLE_ADS_API_BASE")
                .unwrap_or_else(|_| ADS_API_BASE.to_string()),
            ads_api_version: std::env::var("GOOGLE_ADS_API_VERSION")
                .unwrap_or_else(|_| ADS_API_VERSION.to_string()),
            oauth_token_url: std::env::var("GOOGLE_OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| OAUTH_TOKEN_URL.to_string()),
            cse_url: std::env::var("GOOGLE_CSE_URL").unwrap_or_else(|_| CSE_URL.to_string()),
            secrets: Secrets::from_env(),
        }
    }
}

/// Wraps a plain string as a secret.
pub fn secret(value: &str) -> SecretString {
    SecretBox::new(value.to_string().into_boxed_str())
}

fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| SecretBox::new(v.into_boxed_str()))
}

fn millis_var(name: &str, default: u64) -> Duration {
    Duration::from_millis(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(default),
    )
}

fn missing(entries: &[(&'static str, &Option<SecretString>)]) -> Vec<&'static str> {
    entries
        .iter()
        .filter(|(_, value)| {
            value
                .as_ref()
                .map_or(true, |v| v.expose_secret().trim().is_empty())
        })
        .map(|(name, _)| *name)
        .collect()
}
