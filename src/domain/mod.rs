//! Domain models - landmarks, repetition records and outbound events
//!
//! - `types` - landmark frames, depth categories, calibration baseline
//! - `events` - `CoachEvent` contract and the `EventSink` trait
//! - `error` - session lifecycle errors

pub mod error;
pub mod events;
pub mod types;

pub use error::CoachError;
pub use events::{CalibrationReason, CoachEvent, EventSink};
pub use types::{
    CalibrationBaseline, DepthCategory, DepthCounts, Landmark, LandmarkFrame, LandmarkId,
    RepetitionRecord,
};
