use http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Every way a gateway request can fail. Variants are produced where the
/// failure happens and dispatched on directly when rendering the response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),
    #[error("Server configuration error: missing {}", .0.join(", "))]
    Config(Vec<&'static str>),
    #[error("Rate limit exceeded, please slow down")]
    RateLimited,
    #[error("Upstream API returned status {status}")]
    Upstream { status: u16, details: Option<String> },
    #[error("Upstream request timed out")]
    Timeout,
    #[error("Unexpected upstream response: {0}")]
    Shape(String),
    #[error("Failed to obtain upstream access token")]
    UpstreamAuth(String),
    #[error("Upstream request failed")]
    Transport(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Config(_) | Self::Shape(_) | Self::UpstreamAuth(_) | Self::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Upstream { details, .. } => details.as_deref(),
            Self::UpstreamAuth(d) | Self::Transport(d) => Some(d),
            _ => None,
        }
    }

    /// `{ "error": { "code", "message", "details"? } }`, used by `/keyword-ideas`.
    /// JSON details are embedded as JSON, anything else as a string.
    pub fn nested_envelope(&self) -> Value {
        let mut error = json!({
            "code": self.status().as_u16(),
            "message": self.to_string(),
        });
        if let Some(details) = self.details() {
            error["details"] = serde_json::from_str::<Value>(details)
                .unwrap_or_else(|_| Value::String(details.to_string()));
        }
        json!({ "error": error })
    }

    /// `{ "error": "<message>", "details"?: "<text>" }`, used by `/top-results`.
    pub fn flat_envelope(&self) -> Value {
        let mut body = json!({ "error": self.to_string() });
        if let Some(details) = self.details() {
            body["details"] = Value::String(details.to_string());
        }
        body
    }
}

/// The route an error belongs to; each route has its own envelope shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    KeywordIdeas,
    TopResults,
}

#[derive(Debug)]
pub struct RouteRejection {
    pub route: Route,
    pub error: GatewayError,
}

impl RouteRejection {
    pub fn envelope(&self) -> Value {
        match self.route {
            Route::KeywordIdeas => self.error.nested_envelope(),
            Route::TopResults => self.error.flat_envelope(),
        }
    }
}

impl warp::reject::Reject for RouteRejection {}

pub fn reject(route: Route, error: GatewayError) -> warp::Rejection {
    warp::reject::custom(RouteRejection { route, error })
}
