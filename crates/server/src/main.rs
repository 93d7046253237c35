use std::net::SocketAddr;
use std::sync::Arc;

use api_types::clock::SystemClock;
use clap::Parser;
use eyre::WrapErr;
use manhunt_server::{AppState, config::Config, cors::CorsPolicy, routes, run_eviction};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if config.verbose {
                "debug"
            } else {
                "info,tower_http=info"
            })
        }))
        .init();

    let cors = CorsPolicy::new(&config.allowed_origins, &config.default_origin)
        .wrap_err("invalid CORS origin")?;
    let state = AppState::new(&config, Arc::new(SystemClock));

    tokio::spawn(run_eviction(state.clone(), config.eviction_interval()));

    let app = routes::create_router(state, cors);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .wrap_err_with(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        max_position_age = config.max_position_age,
        rate_limit = config.rate_limit,
        trust_proxy_headers = config.trust_proxy_headers,
        "relay listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    })
    .await?;

    Ok(())
}
