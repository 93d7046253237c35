//! # api-types
//!
//! Wire model shared by the relay server and its clients.
//!
//! Every body is JSON with camelCase keys. Timestamps are milliseconds since
//! the Unix epoch, read from a [`clock::Clock`] on both sides.

use serde::{Deserialize, Serialize};

pub mod clock;

/// Which team a player is on.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Hunter,
    Hunted,
}

impl Role {
    /// The team this role plays against.
    pub fn opponent(self) -> Self {
        match self {
            Role::Hunter => Role::Hunted,
            Role::Hunted => Role::Hunter,
        }
    }
}

/// One player's last reported fix, as stored by the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPosition {
    pub player_id: String,
    pub player_name: String,
    pub role: Role,
    pub game_code: String,
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f64,
    pub timestamp: i64,
}

/// Body of `POST /updateLocation`.
///
/// Every field is optional on the wire so the relay can name what is missing
/// instead of failing deserialization wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub role: Option<String>,
    pub game_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub accuracy: Option<f64>,
    /// Client clock at the time of the fix. The relay ignores it.
    pub timestamp: Option<i64>,
}

impl From<&PlayerPosition> for UpdateLocationRequest {
    fn from(position: &PlayerPosition) -> Self {
        Self {
            player_id: Some(position.player_id.clone()),
            player_name: Some(position.player_name.clone()),
            role: Some(position.role.to_string()),
            game_code: Some(position.game_code.clone()),
            lat: Some(position.lat),
            lon: Some(position.lon),
            accuracy: Some(position.accuracy),
            timestamp: Some(position.timestamp),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationResponse {
    pub success: bool,
    pub player_count: usize,
}

/// Query string of `GET /locations`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsQuery {
    pub game_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<PlayerPosition>,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_games: usize,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Canonical form of a game code: trimmed and uppercased.
pub fn normalize_game_code(code: &str) -> String {
    code.trim().to_uppercase()
}
