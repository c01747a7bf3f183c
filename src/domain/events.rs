//! Events emitted by the coach toward the UI/egress side
//!
//! Payload shapes are part of the external contract: each event serializes as
//! one JSON object tagged with `"type"`.

use crate::domain::types::{CalibrationBaseline, DepthCategory};
use serde::Serialize;

/// Why a calibration frame did or did not contribute a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationReason {
    NotFullBody,
    Waiting,
    NotStanding,
    Standing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoachEvent {
    FullBodyStatus {
        is_full_body: bool,
        missing_parts: Vec<String>,
    },
    CalibrationProgress {
        progress_percent: f64,
        is_correct_pose: bool,
        reason: CalibrationReason,
        countdown_seconds: u32,
    },
    CalibrationComplete {
        baseline: CalibrationBaseline,
    },
    RepetitionComplete {
        count: u32,
        category: DepthCategory,
        peak_depth: f64,
    },
    PoseUpdate {
        depth: f64,
        is_squatting: bool,
    },
    BeatTick {
        beat_index: u64,
        is_strong: bool,
    },
    FeedbackMessage {
        text: String,
    },
    ExtraTrainingEntered {},
    SessionFinished {
        final_count: u32,
        closing_message: String,
    },
}

impl CoachEvent {
    pub fn feedback(text: impl Into<String>) -> Self {
        CoachEvent::FeedbackMessage { text: text.into() }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            CoachEvent::FullBodyStatus { .. } => "full_body_status",
            CoachEvent::CalibrationProgress { .. } => "calibration_progress",
            CoachEvent::CalibrationComplete { .. } => "calibration_complete",
            CoachEvent::RepetitionComplete { .. } => "repetition_complete",
            CoachEvent::PoseUpdate { .. } => "pose_update",
            CoachEvent::BeatTick { .. } => "beat_tick",
            CoachEvent::FeedbackMessage { .. } => "feedback_message",
            CoachEvent::ExtraTrainingEntered {} => "extra_training_entered",
            CoachEvent::SessionFinished { .. } => "session_finished",
        }
    }
}

/// Receiver of coach events
///
/// The frame loop is single-threaded; sinks are called synchronously in the
/// order events happen within a frame.
pub trait EventSink {
    fn emit(&mut self, event: CoachEvent);
}

impl EventSink for Vec<CoachEvent> {
    fn emit(&mut self, event: CoachEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_json_shape() {
        let event = CoachEvent::RepetitionComplete {
            count: 3,
            category: DepthCategory::Medium,
            peak_depth: 0.5,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "repetition_complete", "count": 3, "category": "medium", "peak_depth": 0.5})
        );

        let event = CoachEvent::CalibrationProgress {
            progress_percent: 0.0,
            is_correct_pose: false,
            reason: CalibrationReason::Waiting,
            countdown_seconds: 2,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "calibration_progress");
        assert_eq!(value["reason"], "waiting");
        assert_eq!(value["countdown_seconds"], 2);
    }

    #[test]
    fn test_empty_payload_event() {
        let value = serde_json::to_value(CoachEvent::ExtraTrainingEntered {}).unwrap();
        assert_eq!(value, json!({"type": "extra_training_entered"}));
    }

    #[test]
    fn test_vec_sink_keeps_order() {
        let mut sink: Vec<CoachEvent> = Vec::new();
        sink.emit(CoachEvent::feedback("a"));
        sink.emit(CoachEvent::BeatTick { beat_index: 1, is_strong: true });
        assert_eq!(sink[0].kind(), "feedback_message");
        assert_eq!(sink[1].kind(), "beat_tick");
    }
}
