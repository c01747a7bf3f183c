/// Errors raised by the coaching core
///
/// I/O and configuration failures use `anyhow` at the edges; these cover
/// misuse of the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoachError {
    /// Reset requested while a countdown or training session is running
    SessionActive { phase: &'static str },
    /// Goal must be a positive repetition count
    InvalidGoal { goal: u32 },
    /// Session started before a goal was set
    GoalNotSet,
}

impl std::fmt::Display for CoachError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionActive { phase } => {
                write!(f, "cannot reset while session is active (phase={phase})")
            }
            Self::InvalidGoal { goal } => {
                write!(f, "invalid goal {goal}: must be positive with room for the extra reps")
            }
            Self::GoalNotSet => write!(f, "session started without a goal"),
        }
    }
}

impl std::error::Error for CoachError {}
