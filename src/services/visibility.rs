//! Full-body visibility gate
//!
//! Stateless check that every keypoint the coach depends on is in frame
//! with enough estimator confidence.

use crate::domain::types::{LandmarkFrame, LandmarkId};
use smallvec::SmallVec;

/// Minimum visibility for a required keypoint to count as seen
pub const MIN_VISIBILITY: f64 = 0.5;

/// Keypoints that must all be visible for a full-body frame
pub const REQUIRED_POINTS: [LandmarkId; 8] = [
    LandmarkId::LeftShoulder,
    LandmarkId::RightShoulder,
    LandmarkId::LeftHip,
    LandmarkId::RightHip,
    LandmarkId::LeftKnee,
    LandmarkId::RightKnee,
    LandmarkId::LeftAnkle,
    LandmarkId::RightAnkle,
];

/// Result of a visibility check
#[derive(Debug, Clone, PartialEq)]
pub struct FullBodyStatus {
    /// Missing keypoints in `REQUIRED_POINTS` order
    pub missing: SmallVec<[LandmarkId; 8]>,
}

impl FullBodyStatus {
    #[inline]
    pub fn is_full_body(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|id| id.as_str().to_string()).collect()
    }
}

/// Check whether all required keypoints are present with visibility >= 0.5
pub fn check_full_body(frame: &LandmarkFrame) -> FullBodyStatus {
    let missing = REQUIRED_POINTS
        .iter()
        .copied()
        .filter(|&id| !frame.get(id).is_some_and(|lm| lm.is_visible(MIN_VISIBILITY)))
        .collect();
    FullBodyStatus { missing }
}
