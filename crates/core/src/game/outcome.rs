use std::fmt;

use api_types::{PlayerPosition, Role};

use crate::{
    distance::haversine_distance,
    game::{
        rules::GameRules,
        session::{LocalGameSession, Outcome},
        visibility::{VisibleOpponent, filter_visible_opponents},
    },
    location::LocationFix,
};

/// A hunter within reach of a visible hunted player.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub opponent: PlayerPosition,
    pub distance_m: f64,
}

impl From<Capture> for Outcome {
    fn from(capture: Capture) -> Self {
        Outcome::Victory {
            opponent_id: capture.opponent.player_id,
            opponent_name: capture.opponent.player_name,
            distance_m: capture.distance_m,
        }
    }
}

/// The first visible opponent, in snapshot order, within capture distance of
/// the last accepted own fix. Only hunters capture, and nothing is checked
/// until an own fix exists.
pub fn evaluate_capture(
    visible: &[VisibleOpponent],
    own_position: Option<&LocationFix>,
    role: Role,
    rules: &GameRules,
) -> Option<Capture> {
    if role != Role::Hunter {
        return None;
    }
    let own = own_position?;

    visible.iter().find_map(|opponent| {
        let distance_m = haversine_distance(own.point, opponent.point());
        rules.is_capture_distance(distance_m).then(|| Capture {
            opponent: opponent.position.clone(),
            distance_m,
        })
    })
}

/// Whether the match clock has run out. Applies to both roles.
pub fn evaluate_survival(start_time: i64, now: i64, rules: &GameRules) -> bool {
    now - start_time >= rules.game_duration_ms
}

/// Time left in the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    pub remaining_ms: i64,
}

impl Countdown {
    pub fn at(start_time: i64, now: i64, rules: &GameRules) -> Self {
        Self {
            remaining_ms: (rules.game_duration_ms - (now - start_time)).max(0),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.remaining_ms / 1000;
        write!(f, "{}:{:02}", seconds / 60, seconds % 60)
    }
}

/// Result of one poll cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub visible: Vec<VisibleOpponent>,
    pub outcome: Option<Outcome>,
}

/// Evaluate a fresh relay snapshot against the session.
///
/// Capture is checked before the clock so a hunter who catches someone in
/// the final cycle still wins. An inactive session yields an empty report.
pub fn evaluate_cycle(
    session: &LocalGameSession,
    snapshot: &[PlayerPosition],
    rules: &GameRules,
    now: i64,
) -> CycleReport {
    let Some(identity) = session.identity().filter(|_| session.is_active()) else {
        return CycleReport::default();
    };

    let visible = filter_visible_opponents(snapshot, identity, rules, now);

    let outcome = evaluate_capture(
        &visible,
        session.last_known_position(),
        identity.role,
        rules,
    )
    .map(Outcome::from)
    .or_else(|| evaluate_survival(session.start_time(), now, rules).then_some(Outcome::Timeout));

    CycleReport { visible, outcome }
}
