//! Typed channel for coach egress records
//!
//! The coach hands each frame's events over as one batch. Sends await
//! capacity so a fast replay is throttled instead of losing events.

use crate::domain::events::CoachEvent;
use crate::infra::metrics::Metrics;
use crate::services::coach::SessionSummary;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// One line of egress output
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EgressMessage {
    Event(EventRecord),
    Summary(SummaryRecord),
}

/// A coach event stamped with its session and frame time
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub session_id: String,
    pub ts_ms: u64,
    #[serde(flatten)]
    pub event: CoachEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub summary: SessionSummary,
}

impl SummaryRecord {
    pub fn new(summary: SessionSummary) -> Self {
        Self { kind: "session_summary", summary }
    }
}

impl EgressMessage {
    /// Event kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            EgressMessage::Event(record) => record.event.kind(),
            EgressMessage::Summary(record) => record.kind,
        }
    }
}

/// Sender handle for egress messages
#[derive(Clone)]
pub struct EgressSender {
    tx: mpsc::Sender<EgressMessage>,
    metrics: Arc<Metrics>,
}

impl EgressSender {
    pub fn new(tx: mpsc::Sender<EgressMessage>, metrics: Arc<Metrics>) -> Self {
        Self { tx, metrics }
    }

    /// Forward one frame's events in order.
    /// Events are counted as dropped only once the writer has gone away.
    pub async fn send_events(&self, session_id: &str, ts_ms: u64, events: Vec<CoachEvent>) {
        let mut events = events.into_iter();
        while let Some(event) = events.next() {
            let record = EventRecord { session_id: session_id.to_string(), ts_ms, event };
            if self.tx.send(EgressMessage::Event(record)).await.is_err() {
                let dropped = 1 + events.len() as u64;
                for _ in 0..dropped {
                    self.metrics.record_event_dropped();
                }
                debug!(session_id = %session_id, dropped = %dropped, "egress_closed");
                return;
            }
            self.metrics.record_event_emitted();
        }
    }

    pub async fn send_summary(&self, summary: SessionSummary) -> bool {
        self.tx.send(EgressMessage::Summary(SummaryRecord::new(summary))).await.is_ok()
    }
}

/// Create a new egress channel pair
///
/// Buffer size bounds how many records can be queued ahead of the writer.
pub fn create_egress_channel(
    buffer_size: usize,
    metrics: Arc<Metrics>,
) -> (EgressSender, mpsc::Receiver<EgressMessage>) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (EgressSender::new(tx, metrics), rx)
}
