//! Squat Simulator - synthetic landmark stream generator
//!
//! Writes JSONL frames the coach can replay:
//! 1. Lead-in with the ankles occluded (not full body)
//! 2. Standing still (calibration, then countdown)
//! 3. N squats on a cosine hip profile, one per cadence period
//! 4. A short standing tail
//!
//! Usage:
//!   cargo run --bin squat-sim -- --reps 25 --depth deep,medium | cargo run --bin squat-coach
//!   cargo run --bin squat-sim -- --reps 10 --depth shallow --output demo/frames.jsonl

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use squat_coach::domain::types::{DepthCategory, Landmark, LandmarkFrame, LandmarkId};
use squat_coach::io::FrameRecord;
use squat_coach::services::visibility::REQUIRED_POINTS;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Skeleton geometry (normalized image coordinates, y grows downward)
// ============================================================================

const SHOULDER_Y: f64 = 0.30;
const STANDING_HIP_Y: f64 = 0.50;
const KNEE_Y: f64 = 0.70;
const ANKLE_Y: f64 = 0.90;
const VISIBLE: f64 = 0.95;
const OCCLUDED: f64 = 0.05;

/// Hip drop at depth 1.0 (0.4 of the 0.20 leg length)
const FULL_DEPTH_DROP: f64 = 0.08;

// ============================================================================
// CLI Args
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "squat-sim")]
#[command(about = "Synthetic landmark stream for squat-coach")]
struct Args {
    /// Frames per second
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Number of squats
    #[arg(short, long, default_value = "25")]
    reps: u32,

    /// Depth pattern, cycled over the reps (shallow, medium, deep)
    #[arg(short, long, value_delimiter = ',', default_value = "deep")]
    depth: Vec<String>,

    /// Milliseconds per squat (down and back up)
    #[arg(long, default_value = "2000")]
    cadence_ms: u64,

    /// Milliseconds with the ankles out of frame before the user steps back
    #[arg(long, default_value = "1000")]
    lead_in_ms: u64,

    /// Milliseconds standing still before the first squat (calibration + countdown)
    #[arg(long, default_value = "10000")]
    standing_ms: u64,

    /// Uniform landmark noise amplitude (keep below 0.001 to preserve shallow reps)
    #[arg(long, default_value = "0.0")]
    jitter: f64,

    /// Seed for the jitter
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Output file, "-" for stdout
    #[arg(short, long, default_value = "-")]
    output: String,
}

/// Peak depth targeted for each category, inside the detector's bands
fn target_depth(category: DepthCategory) -> f64 {
    match category {
        DepthCategory::Shallow => 0.39,
        DepthCategory::Medium => 0.55,
        DepthCategory::Deep => 0.90,
    }
}

fn parse_depth(name: &str) -> anyhow::Result<DepthCategory> {
    match name.trim() {
        "shallow" => Ok(DepthCategory::Shallow),
        "medium" => Ok(DepthCategory::Medium),
        "deep" => Ok(DepthCategory::Deep),
        other => anyhow::bail!("Unknown depth {other:?} (expected shallow, medium or deep)"),
    }
}

struct Generator {
    frame_ms: u64,
    ts_ms: u64,
    jitter: f64,
    rng: StdRng,
    frames: u64,
}

impl Generator {
    fn frame(&mut self, hip_y: f64, ankle_visibility: f64) -> LandmarkFrame {
        let mut frame = LandmarkFrame::new(self.ts_ms);
        for id in REQUIRED_POINTS {
            let (x, y, visibility) = match id {
                LandmarkId::LeftShoulder => (0.42, SHOULDER_Y, VISIBLE),
                LandmarkId::RightShoulder => (0.58, SHOULDER_Y, VISIBLE),
                LandmarkId::LeftHip => (0.45, hip_y, VISIBLE),
                LandmarkId::RightHip => (0.55, hip_y, VISIBLE),
                LandmarkId::LeftKnee => (0.44, KNEE_Y, VISIBLE),
                LandmarkId::RightKnee => (0.56, KNEE_Y, VISIBLE),
                LandmarkId::LeftAnkle => (0.44, ANKLE_Y, ankle_visibility),
                _ => (0.56, ANKLE_Y, ankle_visibility),
            };
            let (dx, dy) = self.noise();
            frame.set(id, Landmark::new(x + dx, y + dy, visibility));
        }
        frame.set(LandmarkId::Nose, Landmark::new(0.50, 0.20, VISIBLE));
        frame
    }

    fn noise(&mut self) -> (f64, f64) {
        if self.jitter <= 0.0 {
            return (0.0, 0.0);
        }
        (
            self.rng.gen_range(-self.jitter..=self.jitter),
            self.rng.gen_range(-self.jitter..=self.jitter),
        )
    }

    fn emit(&mut self, out: &mut dyn Write, frame: &LandmarkFrame) -> anyhow::Result<()> {
        serde_json::to_writer(&mut *out, &FrameRecord::from_frame(frame))?;
        out.write_all(b"\n")?;
        self.ts_ms += self.frame_ms;
        self.frames += 1;
        Ok(())
    }

    /// Hold a pose for `duration_ms`
    fn hold(
        &mut self,
        out: &mut dyn Write,
        duration_ms: u64,
        hip_y: f64,
        ankle_visibility: f64,
    ) -> anyhow::Result<()> {
        let end = self.ts_ms + duration_ms;
        while self.ts_ms < end {
            let frame = self.frame(hip_y, ankle_visibility);
            self.emit(out, &frame)?;
        }
        Ok(())
    }

    /// One squat: hips follow half a cosine down to the peak and back up
    fn squat(&mut self, out: &mut dyn Write, cadence_ms: u64, depth: f64) -> anyhow::Result<()> {
        let start = self.ts_ms;
        let end = start + cadence_ms;
        while self.ts_ms < end {
            let phase = (self.ts_ms - start) as f64 / cadence_ms as f64;
            let drop = depth * FULL_DEPTH_DROP * (1.0 - (phase * std::f64::consts::TAU).cos()) / 2.0;
            let frame = self.frame(STANDING_HIP_Y + drop, VISIBLE);
            self.emit(out, &frame)?;
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.fps > 0, "fps must be positive");
    anyhow::ensure!(args.cadence_ms > 0, "cadence must be positive");

    let pattern =
        args.depth.iter().map(|d| parse_depth(d)).collect::<anyhow::Result<Vec<_>>>()?;
    anyhow::ensure!(!pattern.is_empty(), "depth pattern is empty");

    info!(
        started_at = %Utc::now().to_rfc3339(),
        fps = %args.fps,
        reps = %args.reps,
        cadence_ms = %args.cadence_ms,
        pattern = ?pattern.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        output = %args.output,
        "sim_started"
    );

    let mut out: Box<dyn Write> = if args.output == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("Failed to create output file {}", args.output))?;
        Box::new(BufWriter::new(file))
    };

    let mut generator = Generator {
        frame_ms: (1000 / u64::from(args.fps)).max(1),
        ts_ms: 0,
        jitter: args.jitter,
        rng: StdRng::seed_from_u64(args.seed),
        frames: 0,
    };

    generator.hold(&mut *out, args.lead_in_ms, STANDING_HIP_Y, OCCLUDED)?;
    generator.hold(&mut *out, args.standing_ms, STANDING_HIP_Y, VISIBLE)?;
    for (_, category) in (0..args.reps).zip(pattern.iter().cycle()) {
        generator.squat(&mut *out, args.cadence_ms, target_depth(*category))?;
    }
    generator.hold(&mut *out, 1000, STANDING_HIP_Y, VISIBLE)?;
    out.flush()?;

    info!(frames = %generator.frames, last_ts_ms = %generator.ts_ms, "sim_finished");
    Ok(())
}
