//! Shared types for the squat coach

use serde::{Deserialize, Serialize};

/// Body keypoints the coach reads from the external pose estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum LandmarkId {
    Nose = 0,
    LeftEar = 1,
    RightEar = 2,
    LeftShoulder = 3,
    RightShoulder = 4,
    LeftHip = 5,
    RightHip = 6,
    LeftKnee = 7,
    RightKnee = 8,
    LeftAnkle = 9,
    RightAnkle = 10,
}

impl LandmarkId {
    pub const COUNT: usize = 11;

    pub const ALL: [LandmarkId; Self::COUNT] = [
        LandmarkId::Nose,
        LandmarkId::LeftEar,
        LandmarkId::RightEar,
        LandmarkId::LeftShoulder,
        LandmarkId::RightShoulder,
        LandmarkId::LeftHip,
        LandmarkId::RightHip,
        LandmarkId::LeftKnee,
        LandmarkId::RightKnee,
        LandmarkId::LeftAnkle,
        LandmarkId::RightAnkle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LandmarkId::Nose => "nose",
            LandmarkId::LeftEar => "left_ear",
            LandmarkId::RightEar => "right_ear",
            LandmarkId::LeftShoulder => "left_shoulder",
            LandmarkId::RightShoulder => "right_shoulder",
            LandmarkId::LeftHip => "left_hip",
            LandmarkId::RightHip => "right_hip",
            LandmarkId::LeftKnee => "left_knee",
            LandmarkId::RightKnee => "right_knee",
            LandmarkId::LeftAnkle => "left_ankle",
            LandmarkId::RightAnkle => "right_ankle",
        }
    }

    /// Inverse of `as_str`; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_str() == name)
    }
}

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single keypoint in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized X (0.0 left .. 1.0 right)
    pub x: f64,
    /// Normalized Y (0.0 top .. 1.0 bottom)
    pub y: f64,
    /// Estimator confidence (0.0..1.0)
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    #[inline]
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    #[inline]
    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility >= threshold
    }
}

/// One estimator output: a timestamp plus whatever keypoints were produced
#[derive(Debug, Clone, Default)]
pub struct LandmarkFrame {
    /// Frame time in milliseconds; the only clock the coach uses
    pub ts_ms: u64,
    landmarks: [Option<Landmark>; LandmarkId::COUNT],
}

impl LandmarkFrame {
    pub fn new(ts_ms: u64) -> Self {
        Self { ts_ms, landmarks: [None; LandmarkId::COUNT] }
    }

    /// Builder-style setter
    pub fn with(mut self, id: LandmarkId, landmark: Landmark) -> Self {
        self.set(id, landmark);
        self
    }

    pub fn set(&mut self, id: LandmarkId, landmark: Landmark) {
        self.landmarks[id as usize] = Some(landmark);
    }

    #[inline]
    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks[id as usize].as_ref()
    }

    /// Present keypoints in `LandmarkId::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (LandmarkId, &Landmark)> + '_ {
        LandmarkId::ALL.iter().filter_map(|&id| self.get(id).map(|lm| (id, lm)))
    }

    /// Mean y of a left/right pair, if both sides are present
    pub fn mean_y(&self, left: LandmarkId, right: LandmarkId) -> Option<f64> {
        match (self.get(left), self.get(right)) {
            (Some(l), Some(r)) => Some((l.y + r.y) / 2.0),
            _ => None,
        }
    }

    #[inline]
    pub fn hip_y(&self) -> Option<f64> {
        self.mean_y(LandmarkId::LeftHip, LandmarkId::RightHip)
    }

    #[inline]
    pub fn knee_y(&self) -> Option<f64> {
        self.mean_y(LandmarkId::LeftKnee, LandmarkId::RightKnee)
    }
}

/// Squat quality classified from the peak depth of one repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthCategory {
    Shallow,
    Medium,
    Deep,
}

/// Peak depth below this is shallow
pub const MEDIUM_DEPTH: f64 = 0.4;
/// Peak depth at or above this is deep
pub const DEEP_DEPTH: f64 = 0.7;

impl DepthCategory {
    /// `shallow < 0.4 <= medium < 0.7 <= deep`
    pub fn from_depth(depth: f64) -> Self {
        if depth < MEDIUM_DEPTH {
            DepthCategory::Shallow
        } else if depth < DEEP_DEPTH {
            DepthCategory::Medium
        } else {
            DepthCategory::Deep
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepthCategory::Shallow => "shallow",
            DepthCategory::Medium => "medium",
            DepthCategory::Deep => "deep",
        }
    }
}

/// Running tally of completed repetitions by category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DepthCounts {
    pub shallow: u32,
    pub medium: u32,
    pub deep: u32,
}

impl DepthCounts {
    pub fn record(&mut self, category: DepthCategory) {
        match category {
            DepthCategory::Shallow => self.shallow += 1,
            DepthCategory::Medium => self.medium += 1,
            DepthCategory::Deep => self.deep += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.shallow + self.medium + self.deep
    }
}

/// A completed repetition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepetitionRecord {
    /// 1-based repetition number within the session
    pub index: u32,
    pub category: DepthCategory,
    pub peak_depth: f64,
    pub timestamp_ms: u64,
}

/// Rise threshold as a fraction of leg length
pub const SQUAT_THRESHOLD_RATIO: f64 = 0.15;
/// Full-depth threshold as a fraction of leg length
pub const DEEP_SQUAT_THRESHOLD_RATIO: f64 = 0.4;

/// Personal standing posture measured during calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBaseline {
    pub standing_hip_y: f64,
    pub standing_knee_y: f64,
    /// Hip displacement that counts as going down
    pub squat_threshold: f64,
    /// Hip displacement that maps to depth 1.0
    pub deep_squat_threshold: f64,
}

impl CalibrationBaseline {
    pub fn from_standing(standing_hip_y: f64, standing_knee_y: f64) -> Self {
        let leg_length = standing_knee_y - standing_hip_y;
        Self {
            standing_hip_y,
            standing_knee_y,
            squat_threshold: leg_length * SQUAT_THRESHOLD_RATIO,
            deep_squat_threshold: leg_length * DEEP_SQUAT_THRESHOLD_RATIO,
        }
    }

    #[inline]
    pub fn leg_length(&self) -> f64 {
        self.standing_knee_y - self.standing_hip_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_thresholds() {
        let baseline = CalibrationBaseline::from_standing(0.50, 0.70);
        assert!((baseline.leg_length() - 0.20).abs() < 1e-12);
        assert!((baseline.squat_threshold - 0.03).abs() < 1e-12);
        assert!((baseline.deep_squat_threshold - 0.08).abs() < 1e-12);
        assert!(baseline.deep_squat_threshold > baseline.squat_threshold);
    }

    #[test]
    fn test_depth_category_boundaries() {
        assert_eq!(DepthCategory::from_depth(0.0), DepthCategory::Shallow);
        assert_eq!(DepthCategory::from_depth(0.399), DepthCategory::Shallow);
        assert_eq!(DepthCategory::from_depth(0.4), DepthCategory::Medium);
        assert_eq!(DepthCategory::from_depth(0.699), DepthCategory::Medium);
        assert_eq!(DepthCategory::from_depth(0.7), DepthCategory::Deep);
        assert_eq!(DepthCategory::from_depth(1.0), DepthCategory::Deep);
    }

    #[test]
    fn test_frame_mean_y_requires_both_sides() {
        let frame = LandmarkFrame::new(0)
            .with(LandmarkId::LeftHip, Landmark::new(0.4, 0.50, 0.9))
            .with(LandmarkId::RightHip, Landmark::new(0.6, 0.54, 0.9))
            .with(LandmarkId::LeftKnee, Landmark::new(0.4, 0.70, 0.9));

        let hip = frame.hip_y().unwrap();
        assert!((hip - 0.52).abs() < 1e-9);
        assert_eq!(frame.knee_y(), None);
    }

    #[test]
    fn test_landmark_id_serde_names() {
        let json = serde_json::to_string(&LandmarkId::LeftAnkle).unwrap();
        assert_eq!(json, "\"left_ankle\"");
        let id: LandmarkId = serde_json::from_str("\"right_shoulder\"").unwrap();
        assert_eq!(id, LandmarkId::RightShoulder);
        for id in LandmarkId::ALL {
            assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", id.as_str()));
            assert_eq!(LandmarkId::from_name(id.as_str()), Some(id));
        }
        assert_eq!(LandmarkId::from_name("left_wrist"), None);
    }

    #[test]
    fn test_frame_iter_in_id_order() {
        let frame = LandmarkFrame::new(0)
            .with(LandmarkId::RightAnkle, Landmark::new(0.5, 0.9, 1.0))
            .with(LandmarkId::Nose, Landmark::new(0.5, 0.1, 1.0));
        let ids: Vec<LandmarkId> = frame.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![LandmarkId::Nose, LandmarkId::RightAnkle]);
    }

    #[test]
    fn test_depth_counts_record() {
        let mut counts = DepthCounts::default();
        counts.record(DepthCategory::Deep);
        counts.record(DepthCategory::Deep);
        counts.record(DepthCategory::Shallow);
        assert_eq!(counts, DepthCounts { shallow: 1, medium: 0, deep: 2 });
        assert_eq!(counts.total(), 3);
    }
}
