//! # manhunt-server
//!
//! Position relay for manhunt games. Clients push their latest fix with
//! `POST /updateLocation` and pull everyone's with `GET /locations`. State
//! is in memory only and forgets players a while after they stop reporting.

use std::sync::Arc;
use std::time::Duration;

use api_types::clock::Clock;

pub mod config;
pub mod cors;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod store;
pub mod validation;

use crate::{config::Config, rate_limit::RateLimiter, routes::ProxyTrust, store::PositionStore};

/// Everything the handlers share, built once per process.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PositionStore>,
    pub limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
    pub proxy: ProxyTrust,
}

impl AppState {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(PositionStore::new(config.max_position_age_ms())),
            limiter: Arc::new(RateLimiter::new(config.rate_limit, config.rate_window_ms())),
            clock,
            proxy: ProxyTrust(config.trust_proxy_headers),
        }
    }

    /// Drop expired positions, empty games and stale rate windows.
    pub async fn sweep(&self, now: i64) {
        let eviction = self.store.evict(now).await;
        let windows = self.limiter.prune(now).await;

        if eviction.positions > 0 || windows > 0 {
            tracing::info!(
                positions = eviction.positions,
                games = eviction.games,
                rate_windows = windows,
                "evicted stale entries"
            );
        }
    }
}

/// Sweep on a fixed timer, on top of the sweep every request does.
pub async fn run_eviction(state: AppState, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        state.sweep(state.clock.now_ms()).await;
    }
}
