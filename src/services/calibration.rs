//! Standing-posture calibration
//!
//! Phases: `NotFullBody -> Waiting -> Sampling -> Complete`.
//! - The wait only starts on the rising edge of full-body visibility and must
//!   hold continuously; any loss starts it over.
//! - Only standing frames (knees well below hips) are sampled.
//! - Once enough samples are in, the baseline is the mean of all samples and
//!   the engine ignores further frames until `reset()`.

use crate::domain::events::CalibrationReason;
use crate::domain::types::{CalibrationBaseline, LandmarkFrame};
use crate::infra::config::Config;
use crate::services::visibility::{check_full_body, FullBodyStatus};
use tracing::{debug, info};

/// Minimum knee-below-hip span (normalized) for a frame to count as standing
pub const STANDING_MIN_SPAN: f64 = 0.15;

/// Default number of standing samples to average
pub const DEFAULT_REQUIRED_SAMPLES: usize = 30;

/// Default continuous-visibility wait before sampling
pub const DEFAULT_VISIBILITY_WAIT_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    NotFullBody,
    /// Full body seen continuously since `since_ms`
    Waiting { since_ms: u64 },
    Sampling,
    Complete,
}

impl CalibrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationPhase::NotFullBody => "not_full_body",
            CalibrationPhase::Waiting { .. } => "waiting",
            CalibrationPhase::Sampling => "sampling",
            CalibrationPhase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StandingSample {
    hip_y: f64,
    knee_y: f64,
}

/// Outcome of feeding one frame to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStep {
    pub full_body: FullBodyStatus,
    pub progress_percent: f64,
    pub is_correct_pose: bool,
    pub reason: CalibrationReason,
    pub countdown_seconds: u32,
    /// Set exactly once, on the frame that completes calibration
    pub completed: Option<CalibrationBaseline>,
}

pub struct CalibrationEngine {
    required_samples: usize,
    visibility_wait_ms: u64,
    phase: CalibrationPhase,
    samples: Vec<StandingSample>,
    baseline: Option<CalibrationBaseline>,
}

impl CalibrationEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_settings(config.required_samples(), config.visibility_wait_ms())
    }

    pub fn with_settings(required_samples: usize, visibility_wait_ms: u64) -> Self {
        let required_samples = required_samples.max(1);
        Self {
            required_samples,
            visibility_wait_ms,
            phase: CalibrationPhase::NotFullBody,
            samples: Vec::with_capacity(required_samples),
            baseline: None,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn baseline(&self) -> Option<&CalibrationBaseline> {
        self.baseline.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == CalibrationPhase::Complete
    }

    pub fn progress_percent(&self) -> f64 {
        (self.samples.len() as f64 / self.required_samples as f64 * 100.0).min(100.0)
    }

    /// Feed one frame. Returns `None` once calibration is complete.
    pub fn process(&mut self, frame: &LandmarkFrame) -> Option<CalibrationStep> {
        if self.phase == CalibrationPhase::Complete {
            return None;
        }

        let full_body = check_full_body(frame);
        let now_ms = frame.ts_ms;

        if !full_body.is_full_body() {
            if self.phase != CalibrationPhase::NotFullBody {
                debug!(
                    from = %self.phase.as_str(),
                    missing = ?full_body.missing_names(),
                    "calibration_full_body_lost"
                );
            }
            self.phase = CalibrationPhase::NotFullBody;
            return Some(Self::step(full_body, 0.0, false, CalibrationReason::NotFullBody, 0));
        }

        if self.phase == CalibrationPhase::NotFullBody {
            debug!(ts_ms = %now_ms, wait_ms = %self.visibility_wait_ms, "calibration_wait_started");
            self.phase = CalibrationPhase::Waiting { since_ms: now_ms };
        }

        if let CalibrationPhase::Waiting { since_ms } = self.phase {
            let elapsed = now_ms.saturating_sub(since_ms);
            if elapsed < self.visibility_wait_ms {
                let remaining = self.visibility_wait_ms - elapsed;
                let countdown = remaining.div_ceil(1000) as u32;
                return Some(Self::step(full_body, 0.0, false, CalibrationReason::Waiting, countdown));
            }
            debug!(ts_ms = %now_ms, "calibration_sampling_started");
            self.phase = CalibrationPhase::Sampling;
        }

        let (Some(hip_y), Some(knee_y)) = (frame.hip_y(), frame.knee_y()) else {
            let progress = self.progress_percent();
            return Some(Self::step(full_body, progress, false, CalibrationReason::NotStanding, 0));
        };

        if knee_y - hip_y <= STANDING_MIN_SPAN {
            let progress = self.progress_percent();
            return Some(Self::step(full_body, progress, false, CalibrationReason::NotStanding, 0));
        }

        self.samples.push(StandingSample { hip_y, knee_y });
        let progress = self.progress_percent();
        let mut step = Self::step(full_body, progress, true, CalibrationReason::Standing, 0);

        if self.samples.len() >= self.required_samples {
            let baseline = self.complete();
            step.completed = Some(baseline);
        }

        Some(step)
    }

    fn complete(&mut self) -> CalibrationBaseline {
        let count = self.samples.len() as f64;
        let (hip_sum, knee_sum) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(hip, knee), s| (hip + s.hip_y, knee + s.knee_y));

        let baseline = CalibrationBaseline::from_standing(hip_sum / count, knee_sum / count);
        self.baseline = Some(baseline);
        self.phase = CalibrationPhase::Complete;

        info!(
            samples = %self.samples.len(),
            standing_hip_y = %baseline.standing_hip_y,
            standing_knee_y = %baseline.standing_knee_y,
            squat_threshold = %baseline.squat_threshold,
            deep_squat_threshold = %baseline.deep_squat_threshold,
            "calibration_complete"
        );

        baseline
    }

    /// Discard samples and baseline; safe to call at any time
    pub fn reset(&mut self) {
        self.samples.clear();
        self.baseline = None;
        self.phase = CalibrationPhase::NotFullBody;
    }

    fn step(
        full_body: FullBodyStatus,
        progress_percent: f64,
        is_correct_pose: bool,
        reason: CalibrationReason,
        countdown_seconds: u32,
    ) -> CalibrationStep {
        CalibrationStep {
            full_body,
            progress_percent,
            is_correct_pose,
            reason,
            countdown_seconds,
            completed: None,
        }
    }
}
