use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warp::Filter;

use keyword_gateway::{
    routes::{log_request, routes},
    services::redact::mask_tail,
    AppState, GatewayConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid GATEWAY_BIND_ADDR {:?}", config.bind_address))?;

    for (name, value) in config.secrets.all() {
        match value {
            Some(secret) => info!("{name}: {}", mask_tail(secret, 4)),
            None => warn!("{name} is not set"),
        }
    }
    if !config.secrets.missing_keyword_secrets().is_empty() {
        warn!("/keyword-ideas will answer 500 until its credentials are configured");
    }
    if !config.secrets.missing_search_secrets().is_empty() {
        warn!("/top-results will answer 500 until its credentials are configured");
    }

    let state = Arc::new(AppState::new(config));

    // Rate-limit windows are otherwise never removed.
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweeper.sweep_interval());
        loop {
            interval.tick().await;
            sweeper.rate_limiter.sweep().await;
        }
    });

    let routes = routes(state).with(warp::log::custom(log_request));

    let (bound, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {e}");
        }
    });
    info!("Keyword gateway running on http://{bound}");
    server.await;
    info!("Keyword gateway stopped");
    Ok(())
}
