//! # manhunt-core
//!
//! Client side of a two-team location game. Hunters see where the hunted
//! were a while ago, and the hunted see the hunters the same way. A hunter
//! who reaches a visible hunted position wins; if the clock runs out first,
//! the hunted survive.
//!
//! - [`game`] holds the rules: who may see whom, capture and survival.
//! - [`runner`] drives a live session against a [`relay::RelayClient`],
//!   a [`location::GeolocationProvider`] and a [`render::MarkerSink`].

pub mod distance;
pub mod game;
pub mod location;
pub mod relay;
pub mod render;
pub mod runner;

pub use api_types::{PlayerPosition, Role, clock};
