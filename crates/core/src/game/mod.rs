//! Rules of a hunter/hunted match, evaluated client side.

pub mod outcome;
pub mod rules;
pub mod session;
pub mod visibility;

pub use outcome::{Capture, Countdown, CycleReport, evaluate_capture, evaluate_cycle, evaluate_survival};
pub use rules::GameRules;
pub use session::{LocalGameSession, Outcome, PlayerIdentity, SessionPhase, SessionRequest, StartError};
pub use visibility::{VisibleOpponent, filter_visible_opponents};
