//! Talking to the position relay.
//!
//! The runner only sees [`RelayClient`]; [`HttpRelayClient`] is the real
//! implementation.

use std::future::Future;
use std::pin::Pin;

use api_types::{PlayerPosition, UpdateLocationResponse};

mod http;

pub use http::HttpRelayClient;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay answered {status}: {message}")]
    Status { status: u16, message: String },
}

pub type RelayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, NetworkError>> + Send + 'a>>;

pub trait RelayClient: Send + Sync {
    /// Upsert this player's position; resolves to the game's player count.
    fn update_location<'a>(
        &'a self,
        position: &'a PlayerPosition,
    ) -> RelayFuture<'a, UpdateLocationResponse>;

    /// Every position the relay holds for `game_code`.
    fn locations<'a>(&'a self, game_code: &'a str) -> RelayFuture<'a, Vec<PlayerPosition>>;
}
