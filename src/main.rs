//! Squat Coach - frame-loop driver for one coaching session
//!
//! Replays a JSONL landmark-frame stream through calibration, countdown and
//! training, and writes every coach event as JSONL.
//!
//! Module structure:
//! - `domain/` - Core types (landmarks, events, errors)
//! - `io/` - Frame source and event egress
//! - `services/` - Coaching logic (calibration, detector, tempo, session, coach)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::Parser;
use squat_coach::infra::{Config, Metrics};
use squat_coach::io::{create_egress_channel, EventWriter, FrameReader};
use squat_coach::services::{Coach, RandomSource, RngSource};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Frames queued between the reader and the coach
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Squat Coach - calibrates, counts and paces squat repetitions
#[derive(Parser, Debug)]
#[command(name = "squat-coach", version = VERSION, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Landmark frames as JSONL, "-" for stdin
    #[arg(short, long, default_value = "-")]
    frames: String,

    /// Event output as JSONL, "-" for stdout (overrides egress.file)
    #[arg(short, long)]
    output: Option<String>,

    /// Repetition goal (overrides session.goal)
    #[arg(short, long)]
    goal: Option<u32>,

    /// Seed for feedback selection and the extra-rep draw
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean JSONL
    // Default: INFO, use RUST_LOG=debug for per-frame detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let started_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    info!(version = %VERSION, started_at = %started_at, "squat-coach starting");

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let mut config = Config::load_from_path(&config_path);
    if let Some(goal) = args.goal {
        config = config.with_goal(goal);
    }
    if let Some(output) = &args.output {
        config = config.with_egress_file(output.as_str());
    }

    info!(
        config_file = %config.config_file(),
        goal = %config.goal(),
        countdown = %config.countdown_enabled(),
        required_samples = %config.required_samples(),
        beat_interval_ms = %config.beat_interval_ms(),
        tempo_anchor = %config.tempo_anchor().as_str(),
        frames = %args.frames,
        egress_file = %config.egress_file(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let metrics = Arc::new(Metrics::new());

    // Egress writer runs until every sender is dropped
    let (egress, egress_rx) =
        create_egress_channel(config.egress_channel_capacity(), metrics.clone());
    let writer = EventWriter::open(config.egress_file(), egress_rx).await?;
    let writer_handle = tokio::spawn(writer.run());

    // Frame reader (bounded for backpressure)
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let reader = FrameReader::open(&args.frames).await?;
    let reader_handle = tokio::spawn(reader.run(frames_tx, metrics.clone(), shutdown_rx.clone()));

    // Periodic metrics summary
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    let random: Box<dyn RandomSource + Send> = match args.seed {
        Some(seed) => Box::new(RngSource::seeded(seed)),
        None => Box::new(RngSource::from_entropy()),
    };
    let mut coach = Coach::new(config, random, metrics.clone())?;

    let summary = coach.run(frames_rx, &egress, shutdown_rx).await;
    summary.log();
    if !egress.send_summary(summary).await {
        error!("summary_egress_failed");
    }

    // The reader may still be blocked on input once the session is over
    let _ = shutdown_tx.send(true);
    match reader_handle.await.context("Frame reader task failed")? {
        Ok(frames) => info!(frames = %frames, "frame_reader_stopped"),
        Err(e) => error!(error = %format!("{e:#}"), "frame_reader_failed"),
    }

    drop(egress);
    let lines = writer_handle.await.context("Egress writer task failed")??;

    metrics.report().log();
    info!(lines = %lines, "squat-coach shutdown complete");
    Ok(())
}
