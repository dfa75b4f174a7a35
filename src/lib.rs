pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::GatewayConfig;
pub use errors::{GatewayError, Route, RouteRejection};
pub use models::{AppState, CacheEntry, RateWindow};
pub use routes::routes;
