//! Coaching session and frame-loop driver
//!
//! The Coach owns every piece of per-session state and routes each frame:
//! - Calibration (visibility gate + standing baseline)
//! - Pre-start countdown
//! - Training (repetition detector, session controller, tempo clock)
//!
//! Frame time (`ts_ms`) is the only clock. Events leave through an
//! `EventSink` in the order they happen within a frame.

mod handlers;

use crate::domain::error::CoachError;
use crate::domain::events::EventSink;
use crate::domain::types::{DepthCounts, LandmarkFrame};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::egress_channel::EgressSender;
use crate::services::calibration::CalibrationEngine;
use crate::services::messages::RandomSource;
use crate::services::rep_detector::RepetitionDetector;
use crate::services::session::{validate_goal, SessionController};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoachPhase {
    Calibrating,
    /// Next countdown entry `step` is due at `due_ms`
    Countdown { step: usize, due_ms: u64 },
    Training,
    Finished,
    /// Cancelled before finishing
    Stopped,
}

impl CoachPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoachPhase::Calibrating => "calibrating",
            CoachPhase::Countdown { .. } => "countdown",
            CoachPhase::Training => "training",
            CoachPhase::Finished => "finished",
            CoachPhase::Stopped => "stopped",
        }
    }

    /// Countdown and training hold a live session
    pub fn is_active(&self) -> bool {
        matches!(self, CoachPhase::Countdown { .. } | CoachPhase::Training)
    }
}

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub phase: &'static str,
    pub final_count: u32,
    pub goal: u32,
    pub actual_goal: u32,
    pub depth_counts: DepthCounts,
    pub missed_cycles: u32,
}

impl SessionSummary {
    pub fn log(&self) {
        info!(
            session_id = %self.session_id,
            phase = %self.phase,
            final_count = %self.final_count,
            goal = %self.goal,
            actual_goal = %self.actual_goal,
            shallow = %self.depth_counts.shallow,
            medium = %self.depth_counts.medium,
            deep = %self.depth_counts.deep,
            missed_cycles = %self.missed_cycles,
            "session_summary"
        );
    }
}

/// One coaching session from calibration to the closing message
pub struct Coach {
    pub(crate) config: Config,
    pub(crate) session_id: Uuid,
    pub(crate) phase: CoachPhase,
    pub(crate) calibration: CalibrationEngine,
    /// Built from the baseline once calibration completes
    pub(crate) detector: Option<RepetitionDetector>,
    pub(crate) session: SessionController,
    pub(crate) random: Box<dyn RandomSource + Send>,
    pub(crate) metrics: Arc<Metrics>,
}

impl Coach {
    /// Create a coach waiting for calibration frames
    pub fn new(
        config: Config,
        random: Box<dyn RandomSource + Send>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, CoachError> {
        validate_goal(config.goal())?;
        let coach = Self {
            session_id: Uuid::now_v7(),
            phase: CoachPhase::Calibrating,
            calibration: CalibrationEngine::new(&config),
            detector: None,
            session: SessionController::new(&config),
            config,
            random,
            metrics,
        };
        info!(
            session_id = %coach.session_id,
            goal = %coach.config.goal(),
            "coach_created"
        );
        Ok(coach)
    }

    pub fn phase(&self) -> CoachPhase {
        self.phase
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn calibration(&self) -> &CalibrationEngine {
        &self.calibration
    }

    pub fn detector(&self) -> Option<&RepetitionDetector> {
        self.detector.as_ref()
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Route one frame through the current phase
    pub fn process_frame(&mut self, frame: &LandmarkFrame, sink: &mut dyn EventSink) {
        let process_start = Instant::now();

        match self.phase {
            CoachPhase::Calibrating => self.handle_calibration_frame(frame, sink),
            CoachPhase::Countdown { .. } => self.advance_countdown(frame.ts_ms, sink),
            CoachPhase::Training => self.handle_training_frame(frame, sink),
            CoachPhase::Finished | CoachPhase::Stopped => return,
        }

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_frame_processed(latency_us);
    }

    /// Cancel the session; no closing message is emitted
    pub fn stop(&mut self) {
        if matches!(self.phase, CoachPhase::Finished | CoachPhase::Stopped) {
            return;
        }
        self.session.stop();
        info!(session_id = %self.session_id, from = %self.phase.as_str(), "coach_stopped");
        self.phase = CoachPhase::Stopped;
    }

    /// Start over from calibration. Rejected while a session is live.
    pub fn reset(&mut self) -> Result<(), CoachError> {
        if self.phase.is_active() {
            return Err(CoachError::SessionActive { phase: self.phase.as_str() });
        }
        self.replace_state();
        Ok(())
    }

    /// Stop whatever is running and start over from calibration
    pub fn restart(&mut self) {
        self.stop();
        self.replace_state();
    }

    fn replace_state(&mut self) {
        self.calibration = CalibrationEngine::new(&self.config);
        self.detector = None;
        self.session = SessionController::new(&self.config);
        self.phase = CoachPhase::Calibrating;
        self.session_id = Uuid::now_v7();
        info!(session_id = %self.session_id, "coach_reset");
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.session.state();
        SessionSummary {
            session_id: self.session_id.to_string(),
            phase: self.phase.as_str(),
            final_count: state.current_count,
            goal: self.config.goal(),
            actual_goal: state.actual_goal,
            depth_counts: self.detector.as_ref().map(|d| d.depth_counts()).unwrap_or_default(),
            missed_cycles: state.missed_cycles,
        }
    }

    /// Consume frames until the channel closes, the session finishes or
    /// shutdown is signalled. Each frame's events go out as one batch.
    pub async fn run(
        &mut self,
        mut frames_rx: mpsc::Receiver<LandmarkFrame>,
        egress: &EgressSender,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionSummary {
        info!(session_id = %self.session_id, "coach_running");

        loop {
            tokio::select! {
                frame = frames_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let mut batch = Vec::new();
                            self.process_frame(&frame, &mut batch);
                            if !batch.is_empty() {
                                let session_id = self.session_id.to_string();
                                egress.send_events(&session_id, frame.ts_ms, batch).await;
                            }
                            if self.phase == CoachPhase::Finished {
                                break;
                            }
                        }
                        None => break, // Channel closed
                    }
                }
                Ok(()) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("coach_shutdown");
                        self.stop();
                        break;
                    }
                }
            }
        }

        self.summary()
    }
}
