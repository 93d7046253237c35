use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable constants of a match. All durations are milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameRules {
    /// Minimum age a position must reach before the other team sees it
    pub position_delay_ms: i64,
    /// A hunter this close to a visible hunted position wins
    pub capture_distance_m: f64,
    /// Match length; the hunted survive once it elapses
    pub game_duration_ms: i64,
    /// Fixes less accurate than this are discarded
    pub max_accuracy_m: f64,
    pub poll_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub fix_timeout_ms: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            position_delay_ms: 120_000,
            capture_distance_m: 50.0,
            game_duration_ms: 600_000,
            max_accuracy_m: 100.0,
            poll_interval_ms: 5_000,
            tick_interval_ms: 1_000,
            fix_timeout_ms: 10_000,
        }
    }
}

impl GameRules {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.fix_timeout_ms)
    }

    /// Whether `distance_m` is close enough to count as a capture.
    /// The boundary itself counts.
    pub fn is_capture_distance(&self, distance_m: f64) -> bool {
        distance_m <= self.capture_distance_m
    }
}
