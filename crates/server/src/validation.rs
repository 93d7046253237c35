//! Turning untrusted update bodies into stored positions.

use api_types::{PlayerPosition, Role, UpdateLocationRequest, normalize_game_code};

use crate::error::RelayError;

pub const MAX_GAME_CODE_CHARS: usize = 10;
pub const MAX_PLAYER_ID_CHARS: usize = 50;
pub const MAX_PLAYER_NAME_CHARS: usize = 20;

fn required_text<'a>(value: &'a Option<String>, field: &str, max_chars: usize) -> Result<&'a str, RelayError> {
    let value = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RelayError::validation(format!("Missing required field: {field}")))?;

    if value.chars().count() > max_chars {
        return Err(RelayError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(value)
}

fn coordinate(value: Option<f64>, field: &str, limit: f64) -> Result<f64, RelayError> {
    let value =
        value.ok_or_else(|| RelayError::validation(format!("Missing required field: {field}")))?;

    if !value.is_finite() || !(-limit..=limit).contains(&value) {
        return Err(RelayError::validation(format!(
            "{field} must be between -{limit} and {limit}"
        )));
    }
    Ok(value)
}

/// Validate an update and stamp it with the relay's own receipt time.
/// Whatever timestamp the client sent is discarded.
pub fn validate_update(request: UpdateLocationRequest, received_at: i64) -> Result<PlayerPosition, RelayError> {
    let game_code = normalize_game_code(required_text(
        &request.game_code,
        "gameCode",
        MAX_GAME_CODE_CHARS,
    )?);
    let player_id = required_text(&request.player_id, "playerId", MAX_PLAYER_ID_CHARS)?;
    let player_name = required_text(&request.player_name, "playerName", MAX_PLAYER_NAME_CHARS)?;

    let role = required_text(&request.role, "role", usize::MAX)?
        .parse::<Role>()
        .map_err(|_| RelayError::validation("role must be \"hunter\" or \"hunted\""))?;

    let lat = coordinate(request.lat, "lat", 90.0)?;
    let lon = coordinate(request.lon, "lon", 180.0)?;

    let accuracy = request.accuracy.unwrap_or(0.0);
    if !accuracy.is_finite() || accuracy < 0.0 {
        return Err(RelayError::validation("accuracy must be a non-negative number"));
    }

    Ok(PlayerPosition {
        player_id: player_id.to_string(),
        player_name: player_name.to_string(),
        role,
        game_code,
        lat,
        lon,
        accuracy,
        timestamp: received_at,
    })
}
