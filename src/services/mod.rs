//! Services - coaching logic and session state
//!
//! - `visibility` - Full-body visibility gate
//! - `calibration` - Standing baseline calibration
//! - `rep_detector` - Hysteresis repetition detector
//! - `tempo` - Frame-driven beat scheduler
//! - `messages` - Feedback pools and random selection
//! - `session` - Goal / extra-goal lifecycle and pacing feedback
//! - `coach` - Session object and frame-loop driver

pub mod calibration;
pub mod coach;
pub mod messages;
pub mod rep_detector;
pub mod session;
pub mod tempo;
pub mod visibility;

// Re-export commonly used types
pub use calibration::CalibrationEngine;
pub use coach::{Coach, CoachPhase, SessionSummary};
pub use messages::{MessageBook, RandomSource, RngSource};
pub use rep_detector::RepetitionDetector;
pub use session::SessionController;
pub use tempo::{TempoAnchor, TempoScheduler};
