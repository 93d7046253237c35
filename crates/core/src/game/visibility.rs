use api_types::PlayerPosition;
use geo::Point;

use crate::game::{rules::GameRules, session::PlayerIdentity};

/// An opponent position old enough to be shown.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleOpponent {
    pub position: PlayerPosition,
    /// `now - position.timestamp`, in milliseconds
    pub age_ms: i64,
}

impl VisibleOpponent {
    pub fn point(&self) -> Point {
        Point::new(self.position.lon, self.position.lat)
    }
}

/// Pick the opponent positions `viewer` may see at `now`.
///
/// Self and same-team records are never returned. Opponent records younger
/// than the position delay are skipped for this call only; the same record
/// shows up once it has aged past the delay. Snapshot order is preserved.
pub fn filter_visible_opponents(
    snapshot: &[PlayerPosition],
    viewer: &PlayerIdentity,
    rules: &GameRules,
    now: i64,
) -> Vec<VisibleOpponent> {
    snapshot
        .iter()
        .filter(|entry| entry.player_id != viewer.player_id)
        .filter(|entry| entry.role != viewer.role)
        .filter_map(|entry| {
            let age_ms = now.saturating_sub(entry.timestamp);
            (age_ms >= rules.position_delay_ms).then(|| VisibleOpponent {
                position: entry.clone(),
                age_ms,
            })
        })
        .collect()
}

/// Human readable age, e.g. `2m 5s ago`.
pub fn format_age(age_ms: i64) -> String {
    let seconds = age_ms.max(0) / 1000;
    let (minutes, seconds) = (seconds / 60, seconds % 60);

    if minutes > 0 {
        format!("{minutes}m {seconds}s ago")
    } else {
        format!("{seconds}s ago")
    }
}
