//! Per-phase frame handlers for the Coach

use super::{Coach, CoachPhase};
use crate::domain::error::CoachError;
use crate::domain::events::{CoachEvent, EventSink};
use crate::domain::types::LandmarkFrame;
use crate::services::messages::COUNTDOWN;
use crate::services::rep_detector::RepetitionDetector;
use tracing::{debug, error, info};

impl Coach {
    /// Feed the calibration engine; on completion build the detector and
    /// move on to the countdown (or straight to training)
    pub(crate) fn handle_calibration_frame(
        &mut self,
        frame: &LandmarkFrame,
        sink: &mut dyn EventSink,
    ) {
        let Some(step) = self.calibration.process(frame) else {
            return;
        };

        sink.emit(CoachEvent::FullBodyStatus {
            is_full_body: step.full_body.is_full_body(),
            missing_parts: step.full_body.missing_names(),
        });
        sink.emit(CoachEvent::CalibrationProgress {
            progress_percent: step.progress_percent,
            is_correct_pose: step.is_correct_pose,
            reason: step.reason,
            countdown_seconds: step.countdown_seconds,
        });

        let Some(baseline) = step.completed else {
            return;
        };
        sink.emit(CoachEvent::CalibrationComplete { baseline });
        self.detector = Some(RepetitionDetector::new(baseline));

        if self.config.countdown_enabled() {
            // One step of quiet before "5"
            let due_ms = frame.ts_ms + self.config.countdown_step_ms();
            self.phase = CoachPhase::Countdown { step: 0, due_ms };
        } else {
            self.begin_training(frame.ts_ms, sink);
        }
    }

    /// Emit the next countdown entry when due; after the last one and the
    /// final delay, start training. At most one step per call.
    pub(crate) fn advance_countdown(&mut self, now_ms: u64, sink: &mut dyn EventSink) {
        let CoachPhase::Countdown { step, due_ms } = self.phase else {
            return;
        };
        if now_ms < due_ms {
            return;
        }

        match COUNTDOWN.get(step) {
            Some(text) => {
                debug!(step = %step, text = %text, ts_ms = %now_ms, "countdown_step");
                sink.emit(CoachEvent::feedback(*text));
                let delay = if step + 1 < COUNTDOWN.len() {
                    self.config.countdown_step_ms()
                } else {
                    self.config.countdown_final_delay_ms()
                };
                self.phase = CoachPhase::Countdown { step: step + 1, due_ms: due_ms + delay };
            }
            None => self.begin_training(now_ms, sink),
        }
    }

    pub(crate) fn begin_training(&mut self, now_ms: u64, sink: &mut dyn EventSink) {
        if let Err(e) = self.start_session(now_ms, sink) {
            error!(session_id = %self.session_id, error = %e, "session_start_failed");
            self.phase = CoachPhase::Stopped;
            return;
        }
        self.phase = CoachPhase::Training;
        info!(
            session_id = %self.session_id,
            goal = %self.session.goal(),
            ts_ms = %now_ms,
            "training_started"
        );
    }

    fn start_session(&mut self, now_ms: u64, sink: &mut dyn EventSink) -> Result<(), CoachError> {
        self.session.set_goal(self.config.goal(), &mut *self.random)?;
        self.session.start(now_ms, &mut *self.random, sink)
    }

    /// Detector first, then the controller, then the tempo clock.
    /// Frames missing a hip still advance the clock.
    pub(crate) fn handle_training_frame(&mut self, frame: &LandmarkFrame, sink: &mut dyn EventSink) {
        let Some(detector) = self.detector.as_mut() else {
            return;
        };

        match detector.update(frame) {
            Some(update) => {
                if let Some(record) = update.completed {
                    self.metrics.record_rep(record.category);
                    sink.emit(CoachEvent::RepetitionComplete {
                        count: record.index,
                        category: record.category,
                        peak_depth: record.peak_depth,
                    });
                    self.session.on_repetition(
                        record.index,
                        record.category,
                        &mut *self.random,
                        sink,
                    );
                }
                // session_finished stays the last event of the session
                if !self.session.is_finished() {
                    sink.emit(CoachEvent::PoseUpdate {
                        depth: update.signal.depth,
                        is_squatting: update.signal.is_down,
                    });
                }
            }
            None => {
                self.metrics.record_frame_skipped();
                debug!(ts_ms = %frame.ts_ms, "frame_skipped_missing_hip");
            }
        }

        if let Some(outcome) = self.session.poll_tempo(frame.ts_ms, &mut *self.random, sink) {
            self.metrics.record_beat(outcome.behind_tempo);
        }

        if self.session.is_finished() {
            self.phase = CoachPhase::Finished;
        }
    }
}
