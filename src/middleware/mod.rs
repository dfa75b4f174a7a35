use http::{header::{HeaderName, HeaderValue}, HeaderMap};
use warp::Reply;


/// Shared bucket for requests that arrive without proxy headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

pub fn with_cors<R: Reply>(reply: R) -> warp::reply::Response {
    let mut response = reply.into_response();
    add_cors_headers(response.headers_mut());
    response
}

/// Client identity for rate limiting: the first hop of `x-forwarded-for`,
/// then `x-real-ip`, then [`UNKNOWN_CLIENT`].
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}
