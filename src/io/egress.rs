//! Event egress - writes coach records as JSONL
//!
//! One JSON object per line, to stdout ("-") or appended to a file.

use crate::io::egress_channel::EgressMessage;
use anyhow::Context;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

type BoxedOutput = Box<dyn AsyncWrite + Unpin + Send>;

/// Drains the egress channel into the output target
pub struct EventWriter {
    target: String,
    out: BufWriter<BoxedOutput>,
    rx: mpsc::Receiver<EgressMessage>,
}

impl EventWriter {
    pub async fn open(target: &str, rx: mpsc::Receiver<EgressMessage>) -> anyhow::Result<Self> {
        let out: BoxedOutput = if target == "-" {
            Box::new(tokio::io::stdout())
        } else {
            let path = Path::new(target);
            // Create parent directories if they don't exist
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create egress dir {}", parent.display()))?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("Failed to open egress file {}", target))?;
            Box::new(file)
        };

        info!(target = %target, "egress_initialized");
        Ok(Self::from_writer(target, out, rx))
    }

    pub fn from_writer(target: &str, out: BoxedOutput, rx: mpsc::Receiver<EgressMessage>) -> Self {
        Self { target: target.to_string(), out: BufWriter::new(out), rx }
    }

    /// Write until every sender is gone. Returns the number of lines written.
    pub async fn run(mut self) -> anyhow::Result<u64> {
        let mut written = 0u64;

        while let Some(msg) = self.rx.recv().await {
            written += self.write_message(&msg).await?;

            // Drain whatever queued up meanwhile before flushing
            while let Ok(msg) = self.rx.try_recv() {
                written += self.write_message(&msg).await?;
            }

            if let Err(e) = self.out.flush().await {
                error!(target = %self.target, error = %e, "egress_flush_failed");
                return Err(e).with_context(|| format!("Failed to flush {}", self.target));
            }
        }

        self.out.flush().await.with_context(|| format!("Failed to flush {}", self.target))?;
        info!(target = %self.target, lines = %written, "egress_closed");
        Ok(written)
    }

    async fn write_message(&mut self, msg: &EgressMessage) -> anyhow::Result<u64> {
        let mut line = match serde_json::to_string(msg) {
            Ok(line) => line,
            Err(e) => {
                error!(kind = %msg.kind(), error = %e, "egress_serialize_failed");
                return Ok(0);
            }
        };
        line.push('\n');
        self.out
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", self.target))?;
        debug!(kind = %msg.kind(), bytes = %line.len(), "egress_written");
        Ok(1)
    }
}
