//! Landmark frame ingestion from JSONL
//!
//! One frame per line:
//! `{"ts_ms": 1200, "landmarks": {"left_hip": {"x": 0.45, "y": 0.52, "visibility": 0.98}, ...}}`
//!
//! Unknown keypoint names are ignored. Lines that fail to parse are logged
//! and skipped. Frames are forwarded with `send().await` so a replay never
//! drops input.

use crate::domain::types::{Landmark, LandmarkFrame, LandmarkId};
use crate::infra::metrics::Metrics;
use anyhow::Context;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Wire form of a frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    pub ts_ms: u64,
    #[serde(default)]
    pub landmarks: FxHashMap<String, Landmark>,
}

impl FrameRecord {
    pub fn from_frame(frame: &LandmarkFrame) -> Self {
        Self {
            ts_ms: frame.ts_ms,
            landmarks: frame.iter().map(|(id, lm)| (id.as_str().to_string(), *lm)).collect(),
        }
    }

    pub fn into_frame(self) -> LandmarkFrame {
        let mut frame = LandmarkFrame::new(self.ts_ms);
        for (name, landmark) in self.landmarks {
            if let Some(id) = LandmarkId::from_name(&name) {
                frame.set(id, landmark);
            }
        }
        frame
    }
}

/// Parse one JSONL line into a frame
pub fn parse_frame_line(line: &str) -> serde_json::Result<LandmarkFrame> {
    serde_json::from_str::<FrameRecord>(line).map(FrameRecord::into_frame)
}

type BoxedInput = Box<dyn AsyncRead + Unpin + Send>;

/// Reads frames from a file or stdin ("-") and forwards them to the coach
pub struct FrameReader {
    source: String,
    lines: Lines<BufReader<BoxedInput>>,
}

impl FrameReader {
    /// Open the frame source; failure here is returned to the caller
    pub async fn open(source: &str) -> anyhow::Result<Self> {
        let input: BoxedInput = if source == "-" {
            Box::new(tokio::io::stdin())
        } else {
            let file = tokio::fs::File::open(source)
                .await
                .with_context(|| format!("Failed to open frame source {}", source))?;
            Box::new(file)
        };

        info!(source = %source, "frame_source_opened");
        Ok(Self::from_reader(source, input))
    }

    pub fn from_reader(source: &str, input: BoxedInput) -> Self {
        Self { source: source.to_string(), lines: BufReader::new(input).lines() }
    }

    /// Forward frames until EOF, shutdown, or the coach hangs up.
    /// Returns the number of frames forwarded.
    pub async fn run(
        mut self,
        frames_tx: mpsc::Sender<LandmarkFrame>,
        metrics: Arc<Metrics>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<u64> {
        let mut line_no = 0u64;
        let mut forwarded = 0u64;

        loop {
            let line = tokio::select! {
                line = self.lines.next_line() => line
                    .with_context(|| format!("Failed to read frame source {}", self.source))?,
                Ok(()) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(source = %self.source, "frame_reader_shutdown");
                        break;
                    }
                    continue;
                }
            };
            let Some(line) = line else {
                break; // EOF
            };
            line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame = match parse_frame_line(trimmed) {
                Ok(frame) => frame,
                Err(e) => {
                    metrics.record_frame_malformed();
                    warn!(source = %self.source, line = %line_no, error = %e, "frame_parse_failed");
                    continue;
                }
            };

            if frames_tx.send(frame).await.is_err() {
                debug!(source = %self.source, "frame_receiver_closed");
                break;
            }
            forwarded += 1;
        }

        info!(source = %self.source, lines = %line_no, frames = %forwarded, "frame_source_done");
        Ok(forwarded)
    }
}
