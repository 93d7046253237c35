//! Map markers, as commands to whatever draws them.

use std::collections::HashSet;

use api_types::Role;
use geo::Point;

use crate::{
    game::{session::PlayerIdentity, visibility::{VisibleOpponent, format_age}},
    location::LocationFix,
};

/// Id of the local player's own marker.
pub const OWN_MARKER_ID: &str = "self";

const OPPONENT_MARKER_PREFIX: &str = "opponent:";

/// Marker id for an opponent. Relay player ids are arbitrary strings, so
/// they live under their own prefix and can never equal [`OWN_MARKER_ID`].
pub fn opponent_marker_id(player_id: &str) -> String {
    format!("{OPPONENT_MARKER_PREFIX}{player_id}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Own,
    Opponent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub id: String,
    pub kind: MarkerKind,
    pub role: Role,
    pub label: String,
    pub position: Point,
    pub accuracy_m: f64,
}

/// A map surface. It only receives commands; it never owns game state.
pub trait MarkerSink: Send {
    fn add_marker(&mut self, marker: &Marker);
    fn update_marker(&mut self, marker: &Marker);
    fn remove_marker(&mut self, id: &str);
}

/// Tracks which markers are on the map so each evaluation becomes the
/// minimal add/update/remove commands.
#[derive(Debug, Default)]
pub struct MapMarkers {
    own_shown: bool,
    opponents: HashSet<String>,
}

impl MapMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_own(&mut self, identity: &PlayerIdentity, fix: &LocationFix, sink: &mut dyn MarkerSink) {
        let marker = Marker {
            id: OWN_MARKER_ID.to_string(),
            kind: MarkerKind::Own,
            role: identity.role,
            label: format!("{} (you)", identity.player_name),
            position: fix.point,
            accuracy_m: fix.accuracy,
        };

        if self.own_shown {
            sink.update_marker(&marker);
        } else {
            sink.add_marker(&marker);
            self.own_shown = true;
        }
    }

    /// Draw exactly `visible`, retracting anyone drawn before who is not in it.
    pub fn show_opponents(&mut self, visible: &[VisibleOpponent], sink: &mut dyn MarkerSink) {
        let mut current = HashSet::with_capacity(visible.len());

        for opponent in visible {
            let marker = Marker {
                id: opponent_marker_id(&opponent.position.player_id),
                kind: MarkerKind::Opponent,
                role: opponent.position.role,
                label: format!(
                    "{} ({})",
                    opponent.position.player_name,
                    format_age(opponent.age_ms)
                ),
                position: opponent.point(),
                accuracy_m: opponent.position.accuracy,
            };

            if self.opponents.contains(&marker.id) {
                sink.update_marker(&marker);
            } else {
                sink.add_marker(&marker);
            }
            current.insert(marker.id);
        }

        for gone in self.opponents.difference(&current) {
            sink.remove_marker(gone);
        }
        self.opponents = current;
    }

    pub fn clear(&mut self, sink: &mut dyn MarkerSink) {
        if std::mem::take(&mut self.own_shown) {
            sink.remove_marker(OWN_MARKER_ID);
        }
        for id in self.opponents.drain() {
            sink.remove_marker(&id);
        }
    }

    pub fn opponent_count(&self) -> usize {
        self.opponents.len()
    }
}
