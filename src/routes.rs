use http::{HeaderMap, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

use crate::handlers::{
    self, handle_rejection, keyword_ideas_rejection, top_results_rejection, MAX_BODY_BYTES,
};
use crate::middleware::{client_identity, with_cors};
use crate::models::AppState;

/// The full filter tree. Every response, errors included, carries CORS headers.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Infallible> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let client = warp::header::headers_cloned().map(|headers: HeaderMap| client_identity(&headers));
    let json_body = warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes());

    let health_check = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    let preflight = warp::path("keyword-ideas")
        .or(warp::path("top-results"))
        .unify()
        .and(warp::path::end())
        .and(warp::options())
        .map(|| StatusCode::NO_CONTENT);

    // Each API route recovers its own rejections so they keep its envelope.
    let keyword_ideas = warp::path("keyword-ideas").and(warp::path::end()).and(
        warp::post()
            .and(client)
            .and(json_body)
            .and(state_filter.clone())
            .and_then(handlers::keyword_ideas)
            .recover(keyword_ideas_rejection),
    );

    let top_results = warp::path("top-results").and(warp::path::end()).and(
        warp::post()
            .and(json_body)
            .and(state_filter)
            .and_then(handlers::top_results)
            .recover(top_results_rejection),
    );

    health_check
        .or(preflight)
        .or(keyword_ideas)
        .or(top_results)
        .recover(handle_rejection)
        .map(with_cors)
}

pub fn log_request(info: warp::log::Info<'_>) {
    tracing::info!(
        "{} {} {} {}ms",
        info.method(),
        info.path(),
        info.status().as_u16(),
        info.elapsed().as_millis()
    );
}
