//! End-to-end coaching sessions through the public API

use squat_coach::domain::events::CoachEvent;
use squat_coach::domain::types::{Landmark, LandmarkFrame, LandmarkId};
use squat_coach::infra::{Config, Metrics};
use squat_coach::io::{create_egress_channel, EventWriter, FrameReader, FrameRecord};
use squat_coach::services::visibility::REQUIRED_POINTS;
use squat_coach::services::{Coach, CoachPhase, RngSource};
use std::io::Write;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::{mpsc, watch};

const STEP_MS: u64 = 33;

fn body_frame(ts_ms: u64, hip_y: f64) -> LandmarkFrame {
    let mut frame = LandmarkFrame::new(ts_ms);
    for id in REQUIRED_POINTS {
        let y = match id {
            LandmarkId::LeftShoulder | LandmarkId::RightShoulder => 0.30,
            LandmarkId::LeftHip | LandmarkId::RightHip => hip_y,
            LandmarkId::LeftKnee | LandmarkId::RightKnee => 0.70,
            _ => 0.90,
        };
        frame.set(id, Landmark::new(0.5, y, 0.95));
    }
    frame
}

/// Standing long enough for calibration and the countdown, then `reps`
/// deep squats of 20 frames each
fn session_frames(reps: u32) -> Vec<LandmarkFrame> {
    let mut frames = Vec::new();
    let mut ts = 0;
    while ts < 10_000 {
        frames.push(body_frame(ts, 0.50));
        ts += STEP_MS;
    }
    for _ in 0..reps {
        for i in 0..20u32 {
            let steps = if i < 10 { i } else { 20 - i };
            let drop = f64::from(steps) * 0.008;
            frames.push(body_frame(ts, 0.50 + drop));
            ts += STEP_MS;
        }
    }
    frames
}

fn feedback_texts(events: &[CoachEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            CoachEvent::FeedbackMessage { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_default_session_reaches_actual_goal() {
    let metrics = Arc::new(Metrics::new());
    let mut coach =
        Coach::new(Config::default(), Box::new(RngSource::seeded(42)), metrics.clone()).unwrap();

    let mut events = Vec::new();
    for frame in session_frames(60) {
        coach.process_frame(&frame, &mut events);
        if coach.phase() == CoachPhase::Finished {
            break;
        }
    }

    let summary = coach.summary();
    assert_eq!(summary.phase, "finished");
    assert_eq!(summary.goal, 20);
    assert!((25..=40).contains(&summary.actual_goal));
    assert_eq!(summary.final_count, summary.actual_goal);
    assert_eq!(summary.depth_counts.deep, summary.final_count);

    // Countdown plays in order before any repetition
    let texts = feedback_texts(&events);
    let countdown: Vec<&str> =
        texts.iter().copied().filter(|t| ["5", "4", "3", "2", "1", "Go!"].contains(t)).collect();
    assert_eq!(&countdown[..6], &["5", "4", "3", "2", "1", "Go!"]);

    let extra_at = events.iter().position(|e| matches!(e, CoachEvent::ExtraTrainingEntered {}));
    let finished_at = events.iter().position(|e| matches!(e, CoachEvent::SessionFinished { .. }));
    assert!(extra_at.unwrap() < finished_at.unwrap());
    assert_eq!(events.iter().filter(|e| e.kind() == "session_finished").count(), 1);

    assert_eq!(metrics.report().reps_deep, u64::from(summary.final_count));
}

#[test]
fn test_same_seed_same_session() {
    let run = |seed| {
        let mut coach =
            Coach::new(Config::default(), Box::new(RngSource::seeded(seed)), Arc::new(Metrics::new()))
                .unwrap();
        let mut events = Vec::new();
        for frame in session_frames(30) {
            coach.process_frame(&frame, &mut events);
        }
        events
    };
    assert_eq!(run(9), run(9));
}

#[test]
fn test_occluded_user_never_calibrates() {
    let mut coach =
        Coach::new(Config::default(), Box::new(RngSource::seeded(1)), Arc::new(Metrics::new()))
            .unwrap();
    let mut events = Vec::new();
    for i in 0..200 {
        let mut frame = body_frame(i * STEP_MS, 0.50);
        frame.set(LandmarkId::LeftAnkle, Landmark::new(0.5, 0.9, 0.1));
        coach.process_frame(&frame, &mut events);
    }

    assert_eq!(coach.phase(), CoachPhase::Calibrating);
    assert!(events.iter().all(|e| match e {
        CoachEvent::FullBodyStatus { is_full_body, missing_parts } =>
            !is_full_body && missing_parts == &vec!["left_ankle".to_string()],
        CoachEvent::CalibrationProgress { progress_percent, .. } => *progress_percent == 0.0,
        _ => false,
    }));
}

#[tokio::test]
async fn test_replay_file_to_jsonl() {
    let mut input = NamedTempFile::new().unwrap();
    for frame in session_frames(50) {
        serde_json::to_writer(&mut input, &FrameRecord::from_frame(&frame)).unwrap();
        writeln!(input).unwrap();
    }
    writeln!(input, "not a frame").unwrap();
    input.flush().unwrap();

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.jsonl");
    let metrics = Arc::new(Metrics::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let (egress, egress_rx) = create_egress_channel(64, metrics.clone());
    let writer = EventWriter::open(output.to_str().unwrap(), egress_rx).await.unwrap();
    let writer_handle = tokio::spawn(writer.run());

    let (frames_tx, frames_rx) = mpsc::channel(16);
    let reader = FrameReader::open(input.path().to_str().unwrap()).await.unwrap();
    let reader_handle = tokio::spawn(reader.run(frames_tx, metrics.clone(), shutdown_rx.clone()));

    let mut coach = Coach::new(Config::default(), Box::new(RngSource::seeded(3)), metrics.clone())
        .unwrap();
    let summary = coach.run(frames_rx, &egress, shutdown_rx).await;
    assert_eq!(summary.phase, "finished");
    assert!(egress.send_summary(summary.clone()).await);

    // The reader stops once the coach hangs up
    reader_handle.await.unwrap().unwrap();
    drop(egress);
    let written = writer_handle.await.unwrap().unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<serde_json::Value> =
        content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len() as u64, written);

    let session_id = coach.session_id().to_string();
    assert!(lines[..lines.len() - 1].iter().all(|l| l["session_id"] == session_id.as_str()));
    assert_eq!(lines[0]["type"], "full_body_status");
    assert!(lines.iter().any(|l| l["type"] == "calibration_complete"));

    let last = &lines[lines.len() - 1];
    assert_eq!(last["type"], "session_summary");
    assert_eq!(last["final_count"], summary.final_count);
    assert_eq!(last["phase"], "finished");

    let finished: Vec<_> = lines.iter().filter(|l| l["type"] == "session_finished").collect();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0]["final_count"], summary.actual_goal);
}
