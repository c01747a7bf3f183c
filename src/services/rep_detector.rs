//! Repetition detection from the calibrated hip signal
//!
//! Two-state hysteresis machine. Going down needs the hip to drop past
//! `squat_threshold`; coming back up needs it to rise above half of that.
//! The gap between the two triggers keeps a hip hovering near the threshold
//! from counting phantom reps.

use crate::domain::types::{
    CalibrationBaseline, DepthCategory, DepthCounts, LandmarkFrame, RepetitionRecord,
};
use tracing::{debug, info};

/// Return-to-standing trigger as a fraction of `squat_threshold`
pub const RELEASE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepPhase {
    Standing,
    /// Below the squat threshold; carries the deepest point reached so far
    Descending { peak_depth: f64 },
}

/// Per-frame view of the depth signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepetitionSignal {
    /// Normalized depth, clamped to [0, 1]
    pub depth: f64,
    /// Hip currently below the squat threshold
    pub is_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorUpdate {
    pub signal: RepetitionSignal,
    /// Set on the frame a repetition finishes
    pub completed: Option<RepetitionRecord>,
}

pub struct RepetitionDetector {
    baseline: CalibrationBaseline,
    phase: RepPhase,
    count: u32,
    depth_counts: DepthCounts,
    records: Vec<RepetitionRecord>,
}

impl RepetitionDetector {
    pub fn new(baseline: CalibrationBaseline) -> Self {
        Self {
            baseline,
            phase: RepPhase::Standing,
            count: 0,
            depth_counts: DepthCounts::default(),
            records: Vec::new(),
        }
    }

    pub fn baseline(&self) -> &CalibrationBaseline {
        &self.baseline
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    /// Peak depth of the repetition in progress (0 while standing)
    pub fn peak_depth(&self) -> f64 {
        match self.phase {
            RepPhase::Standing => 0.0,
            RepPhase::Descending { peak_depth } => peak_depth,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn depth_counts(&self) -> DepthCounts {
        self.depth_counts
    }

    pub fn records(&self) -> &[RepetitionRecord] {
        &self.records
    }

    /// Map a hip displacement to normalized depth
    pub fn depth_for(&self, displacement: f64) -> f64 {
        (displacement / self.baseline.deep_squat_threshold).clamp(0.0, 1.0)
    }

    /// Process one frame. Frames without both hips are skipped (`None`).
    pub fn update(&mut self, frame: &LandmarkFrame) -> Option<DetectorUpdate> {
        let hip_y = frame.hip_y()?;
        let displacement = hip_y - self.baseline.standing_hip_y;
        let depth = self.depth_for(displacement);
        let is_down = displacement > self.baseline.squat_threshold;

        let mut completed = None;
        match self.phase {
            RepPhase::Standing => {
                if is_down {
                    debug!(ts_ms = %frame.ts_ms, depth = %depth, "rep_descending");
                    self.phase = RepPhase::Descending { peak_depth: depth };
                }
            }
            RepPhase::Descending { peak_depth } => {
                let peak_depth = peak_depth.max(depth);
                if displacement < self.baseline.squat_threshold * RELEASE_RATIO {
                    completed = Some(self.finish_rep(peak_depth, frame.ts_ms));
                    self.phase = RepPhase::Standing;
                } else {
                    self.phase = RepPhase::Descending { peak_depth };
                }
            }
        }

        Some(DetectorUpdate { signal: RepetitionSignal { depth, is_down }, completed })
    }

    fn finish_rep(&mut self, peak_depth: f64, timestamp_ms: u64) -> RepetitionRecord {
        self.count += 1;
        let category = DepthCategory::from_depth(peak_depth);
        self.depth_counts.record(category);

        let record = RepetitionRecord { index: self.count, category, peak_depth, timestamp_ms };
        self.records.push(record);

        info!(
            count = %self.count,
            category = %category.as_str(),
            peak_depth = %peak_depth,
            ts_ms = %timestamp_ms,
            "rep_completed"
        );

        record
    }
}
