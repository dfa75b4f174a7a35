use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{secret, GatewayConfig};
use crate::errors::GatewayError;
use crate::services::executor::{RequestExecutor, UpstreamRequest};

/// A short-lived bearer token. `Debug` never shows the token.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: SecretString,
    pub expires_in: Option<u64>,
}

/// Trades the long-lived refresh token for an access token. Every call
/// performs a full exchange; nothing is cached between calls.
pub struct CredentialBroker {
    config: Arc<GatewayConfig>,
    executor: RequestExecutor,
}

impl CredentialBroker {
    pub fn new(config: Arc<GatewayConfig>, executor: RequestExecutor) -> Self {
        Self { config, executor }
    }

    pub fn validate_config(&self) -> bool {
        self.missing_secrets().is_empty()
    }

    pub fn missing_secrets(&self) -> Vec<&'static str> {
        self.config.secrets.missing_keyword_secrets()
    }

    pub async fn get_fresh_access_token(&self) -> Result<Credential, GatewayError> {
        let secrets = &self.config.secrets;
        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            secrets.client_id.as_ref(),
            secrets.client_secret.as_ref(),
            secrets.refresh_token.as_ref(),
        ) else {
            return Err(GatewayError::Config(self.missing_secrets()));
        };

        let request = UpstreamRequest::post(&self.config.oauth_token_url).form(vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("client_id".to_string(), client_id.expose_secret().to_string()),
            ("client_secret".to_string(), client_secret.expose_secret().to_string()),
            ("refresh_token".to_string(), refresh_token.expose_secret().to_string()),
        ]);

        let response = match self.executor.call(request, self.config.token_timeout).await {
            Ok(response) => response,
            Err(GatewayError::Timeout) => return Err(GatewayError::Timeout),
            Err(GatewayError::Upstream { status, details }) => {
                warn!(status, "token exchange rejected");
                return Err(GatewayError::UpstreamAuth(details.unwrap_or_else(|| {
                    format!("token endpoint returned status {status}")
                })));
            }
            Err(e) => return Err(GatewayError::UpstreamAuth(e.to_string())),
        };

        let payload = response
            .json()
            .map_err(|_| GatewayError::UpstreamAuth("token endpoint returned invalid JSON".into()))?;
        let token = payload
            .get("access_token")
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GatewayError::UpstreamAuth("token endpoint returned no access token".into())
            })?;
        let expires_in = payload.get("expires_in").and_then(|e| e.as_u64());

        debug!(?expires_in, "obtained fresh access token");
        Ok(Credential {
            access_token: secret(token),
            expires_in,
        })
    }
}
