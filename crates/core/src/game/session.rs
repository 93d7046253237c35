use api_types::{PlayerPosition, Role, normalize_game_code};
use rand::{Rng, distr::Alphanumeric};

use crate::{
    distance::format_distance,
    game::rules::GameRules,
    location::{FixQuality, LocationFix},
};

pub const MAX_PLAYER_NAME_CHARS: usize = 20;
pub const MAX_GAME_CODE_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("a player name is required")]
    MissingName,

    #[error("a game code is required")]
    MissingGameCode,

    #[error("game code must be at most {MAX_GAME_CODE_CHARS} characters")]
    GameCodeTooLong,

    #[error("a role is required")]
    MissingRole,

    #[error("a session is already running or has not been reset")]
    NotIdle,
}

/// What the player filled in before pressing start.
#[derive(Clone, Debug, Default)]
pub struct SessionRequest {
    pub player_name: String,
    pub game_code: String,
    pub role: Option<Role>,
}

/// Who the local player is for the length of one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub player_id: String,
    pub player_name: String,
    pub role: Role,
    pub game_code: String,
}

impl PlayerIdentity {
    /// Validate and normalize a start request.
    pub fn from_request(request: &SessionRequest, player_id: String) -> Result<Self, StartError> {
        let player_name = request.player_name.trim();
        if player_name.is_empty() {
            return Err(StartError::MissingName);
        }

        let game_code = normalize_game_code(&request.game_code);
        if game_code.is_empty() {
            return Err(StartError::MissingGameCode);
        }
        if game_code.chars().count() > MAX_GAME_CODE_CHARS {
            return Err(StartError::GameCodeTooLong);
        }

        let role = request.role.ok_or(StartError::MissingRole)?;

        Ok(Self {
            player_id,
            player_name: player_name.chars().take(MAX_PLAYER_NAME_CHARS).collect(),
            role,
            game_code,
        })
    }
}

/// A fresh opaque player id, e.g. `player_k3x9a0b2q`.
pub fn generate_player_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("player_{suffix}")
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The hunter came within capture distance of a visible hunted player.
    Victory {
        opponent_id: String,
        opponent_name: String,
        distance_m: f64,
    },
    /// The match ran its full duration.
    Timeout,
    /// The local player quit.
    Left,
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::Victory {
                opponent_name,
                distance_m,
                ..
            } => format!(
                "You caught {opponent_name}! ({} away)",
                format_distance(*distance_m)
            ),
            Outcome::Timeout => "Time's up! The hunted survived.".to_string(),
            Outcome::Left => "You left the game.".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionPhase {
    Idle,
    Active,
    Ended(Outcome),
}

/// The single running session of a client.
///
/// `Idle -> Active -> Ended`, and back to `Idle` only through [`reset`].
///
/// [`reset`]: LocalGameSession::reset
#[derive(Clone, Debug)]
pub struct LocalGameSession {
    phase: SessionPhase,
    identity: Option<PlayerIdentity>,
    start_time: i64,
    last_known_position: Option<LocationFix>,
}

impl Default for LocalGameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalGameSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            identity: None,
            start_time: 0,
            last_known_position: None,
        }
    }

    pub fn start(
        &mut self,
        request: &SessionRequest,
        player_id: String,
        now: i64,
    ) -> Result<&PlayerIdentity, StartError> {
        if self.phase != SessionPhase::Idle {
            return Err(StartError::NotIdle);
        }

        let identity = PlayerIdentity::from_request(request, player_id)?;
        tracing::info!(
            player_id = %identity.player_id,
            game_code = %identity.game_code,
            role = %identity.role,
            "session started"
        );

        self.phase = SessionPhase::Active;
        self.start_time = now;
        self.last_known_position = None;

        Ok(self.identity.insert(identity))
    }

    /// Move to `Ended`. Returns `false` if the session was not active, in
    /// which case nothing changes.
    pub fn end(&mut self, outcome: Outcome) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }

        tracing::info!(?outcome, "session ended");
        self.phase = SessionPhase::Ended(outcome);
        true
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.phase {
            SessionPhase::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&PlayerIdentity> {
        self.identity.as_ref()
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn last_known_position(&self) -> Option<&LocationFix> {
        self.last_known_position.as_ref()
    }

    /// Offer a raw provider sample. Only fixes within the accuracy threshold
    /// replace the last known position; worse ones leave it untouched.
    pub fn accept_fix(&mut self, fix: LocationFix, rules: &GameRules) -> FixQuality {
        let quality = FixQuality::classify(fix.accuracy, rules.max_accuracy_m);
        if self.is_active() && quality.is_accepted() {
            self.last_known_position = Some(fix);
        }
        quality
    }

    /// The record this client pushes to the relay, if it has a fix yet.
    pub fn own_record(&self) -> Option<PlayerPosition> {
        let identity = self.identity.as_ref()?;
        let fix = self.last_known_position.as_ref()?;

        Some(PlayerPosition {
            player_id: identity.player_id.clone(),
            player_name: identity.player_name.clone(),
            role: identity.role,
            game_code: identity.game_code.clone(),
            lat: fix.point.y(),
            lon: fix.point.x(),
            accuracy: fix.accuracy,
            timestamp: fix.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: Option<Role>) -> SessionRequest {
        SessionRequest {
            player_name: "  Ada  ".into(),
            game_code: " abc1 ".into(),
            role,
        }
    }

    fn fix(accuracy: f64) -> LocationFix {
        LocationFix::new(51.5, -0.12, accuracy, 10)
    }

    #[test]
    fn test_start_normalizes_identity() {
        let mut session = LocalGameSession::new();
        let identity = session
            .start(&request(Some(Role::Hunter)), "p1".into(), 5_000)
            .unwrap()
            .clone();

        assert_eq!(identity.player_name, "Ada");
        assert_eq!(identity.game_code, "ABC1");
        assert!(session.is_active());
        assert_eq!(session.start_time(), 5_000);
    }

    #[test]
    fn test_start_requires_all_fields() {
        let mut session = LocalGameSession::new();
        assert_eq!(
            session.start(&request(None), "p1".into(), 0).unwrap_err(),
            StartError::MissingRole
        );

        let no_name = SessionRequest {
            player_name: " ".into(),
            ..request(Some(Role::Hunted))
        };
        assert_eq!(
            session.start(&no_name, "p1".into(), 0).unwrap_err(),
            StartError::MissingName
        );

        let long_code = SessionRequest {
            game_code: "ABCDEFGHIJK".into(),
            ..request(Some(Role::Hunted))
        };
        assert_eq!(
            session.start(&long_code, "p1".into(), 0).unwrap_err(),
            StartError::GameCodeTooLong
        );

        assert_eq!(session.phase(), &SessionPhase::Idle);
    }

    #[test]
    fn test_long_names_are_capped() {
        let long = SessionRequest {
            player_name: "A".repeat(40),
            ..request(Some(Role::Hunted))
        };
        let identity = PlayerIdentity::from_request(&long, "p".into()).unwrap();
        assert_eq!(identity.player_name.chars().count(), MAX_PLAYER_NAME_CHARS);
    }

    #[test]
    fn test_ended_is_terminal_until_reset() {
        let mut session = LocalGameSession::new();
        session.start(&request(Some(Role::Hunted)), "p1".into(), 0).unwrap();

        assert!(session.end(Outcome::Timeout));
        assert!(!session.end(Outcome::Left));
        assert_eq!(session.outcome(), Some(&Outcome::Timeout));
        assert_eq!(
            session.start(&request(Some(Role::Hunted)), "p1".into(), 0).unwrap_err(),
            StartError::NotIdle
        );

        session.reset();
        assert_eq!(session.phase(), &SessionPhase::Idle);
        assert!(session.identity().is_none());
        assert!(session.start(&request(Some(Role::Hunted)), "p2".into(), 0).is_ok());
    }

    #[test]
    fn test_inaccurate_fix_keeps_previous_position() {
        let rules = GameRules::default();
        let mut session = LocalGameSession::new();
        session.start(&request(Some(Role::Hunter)), "p1".into(), 0).unwrap();

        assert!(session.accept_fix(fix(10.0), &rules).is_accepted());
        assert_eq!(session.accept_fix(fix(150.0), &rules), FixQuality::Rejected);
        assert_eq!(session.last_known_position().unwrap().accuracy, 10.0);

        assert!(session.accept_fix(fix(100.0), &rules).is_accepted());
        assert_eq!(session.last_known_position().unwrap().accuracy, 100.0);
    }

    #[test]
    fn test_own_record_needs_a_fix() {
        let rules = GameRules::default();
        let mut session = LocalGameSession::new();
        session.start(&request(Some(Role::Hunted)), "p1".into(), 0).unwrap();
        assert!(session.own_record().is_none());

        session.accept_fix(fix(5.0), &rules);
        let record = session.own_record().unwrap();
        assert_eq!(record.player_id, "p1");
        assert_eq!(record.role, Role::Hunted);
        assert_eq!(record.lat, 51.5);
        assert_eq!(record.lon, -0.12);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate_player_id();
        let b = generate_player_id();
        assert!(a.starts_with("player_"));
        assert_eq!(a.len(), "player_".len() + 9);
        assert_ne!(a, b);
    }

    #[test]
    fn test_outcome_messages() {
        let victory = Outcome::Victory {
            opponent_id: "k".into(),
            opponent_name: "Kim".into(),
            distance_m: 5.2,
        };
        assert_eq!(victory.message(), "You caught Kim! (5m away)");
        assert_eq!(Outcome::Timeout.message(), "Time's up! The hunted survived.");
    }
}
