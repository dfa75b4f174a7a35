use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;

use crate::errors::{GatewayError, Route, RouteRejection};

mod keyword_ideas;
mod top_results;


pub use keyword_ideas::{keyword_ideas, KeywordQuery};
pub use top_results::{top_results, SearchQuery};

pub const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Fallback for requests that matched no route.
pub async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    Ok(render_rejection(None, &err))
}

pub async fn keyword_ideas_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, Infallible> {
    Ok(render_rejection(Some(Route::KeywordIdeas), &err))
}

pub async fn top_results_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    Ok(render_rejection(Some(Route::TopResults), &err))
}

/// Renders a rejection in the envelope of the route it came from; warp's
/// own rejections on `/keyword-ideas` get the nested `{ code, message }` form.
pub fn render_rejection(
    route: Option<Route>,
    err: &warp::Rejection,
) -> warp::reply::WithStatus<warp::reply::Json> {
    if let Some(rejection) = err.find::<RouteRejection>() {
        return warp::reply::with_status(
            warp::reply::json(&rejection.envelope()),
            rejection.error.status(),
        );
    }

    let (code, message) = warp_failure(err);
    let body = match route {
        Some(Route::KeywordIdeas) => {
            json!({ "error": { "code": code.as_u16(), "message": message } })
        }
        Some(Route::TopResults) | None => json!({ "error": message }),
    };
    warp::reply::with_status(warp::reply::json(&body), code)
}

// Body limits come before the method check: combined rejections can carry
// a MethodNotAllowed from a sibling filter even when the method was right.
fn warp_failure(err: &warp::Rejection) -> (StatusCode, &'static str) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Length Required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// Parses a JSON request body; an empty body reads as `{}`.
fn parse_body<T>(body: &[u8]) -> Result<T, GatewayError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::Validation(format!("Invalid JSON body: {e}")))
}

fn to_json_bytes<T: Serialize>(value: &T) -> Result<Bytes, GatewayError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| GatewayError::Shape(format!("failed to encode response: {e}")))
}

fn json_reply(body: Bytes) -> warp::reply::Response {
    let mut response = warp::reply::Response::new(body.into());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
