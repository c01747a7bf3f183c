//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section and field is optional; omitted values take the defaults
//! below.

use crate::services::tempo::TempoAnchor;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Visible repetition goal
    #[serde(default = "default_goal")]
    pub goal: u32,
    /// Play the 5-4-3-2-1-Go countdown before training
    #[serde(default = "default_countdown_enabled")]
    pub countdown_enabled: bool,
    #[serde(default = "default_countdown_step_ms")]
    pub countdown_step_ms: u64,
    /// Pause between "Go!" and the first beat
    #[serde(default = "default_countdown_final_delay_ms")]
    pub countdown_final_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            goal: default_goal(),
            countdown_enabled: default_countdown_enabled(),
            countdown_step_ms: default_countdown_step_ms(),
            countdown_final_delay_ms: default_countdown_final_delay_ms(),
        }
    }
}

fn default_goal() -> u32 {
    20
}

fn default_countdown_enabled() -> bool {
    true
}

fn default_countdown_step_ms() -> u64 {
    1000
}

fn default_countdown_final_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_required_samples")]
    pub required_samples: usize,
    /// Continuous full-body time before sampling starts
    #[serde(default = "default_visibility_wait_ms")]
    pub visibility_wait_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            required_samples: default_required_samples(),
            visibility_wait_ms: default_visibility_wait_ms(),
        }
    }
}

fn default_required_samples() -> usize {
    30
}

fn default_visibility_wait_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TempoConfig {
    #[serde(default = "default_beat_interval_ms")]
    pub beat_interval_ms: u64,
    #[serde(default = "default_beats_down")]
    pub beats_down: u32,
    #[serde(default = "default_beats_up")]
    pub beats_up: u32,
    /// "frame" (default) or "ideal"
    #[serde(default)]
    pub anchor: TempoAnchor,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            beat_interval_ms: default_beat_interval_ms(),
            beats_down: default_beats_down(),
            beats_up: default_beats_up(),
            anchor: TempoAnchor::default(),
        }
    }
}

fn default_beat_interval_ms() -> u64 {
    1000
}

fn default_beats_down() -> u32 {
    5
}

fn default_beats_up() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    /// File path for event egress (JSONL format), "-" for stdout
    #[serde(default = "default_egress_file")]
    pub file: String,
    #[serde(default = "default_egress_capacity")]
    pub channel_capacity: usize,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { file: default_egress_file(), channel_capacity: default_egress_capacity() }
    }
}

fn default_egress_file() -> String {
    "-".to_string()
}

fn default_egress_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    goal: u32,
    countdown_enabled: bool,
    countdown_step_ms: u64,
    countdown_final_delay_ms: u64,
    required_samples: usize,
    visibility_wait_ms: u64,
    beat_interval_ms: u64,
    beats_down: u32,
    beats_up: u32,
    tempo_anchor: TempoAnchor,
    egress_file: String,
    egress_channel_capacity: usize,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            goal: toml_config.session.goal,
            countdown_enabled: toml_config.session.countdown_enabled,
            countdown_step_ms: toml_config.session.countdown_step_ms,
            countdown_final_delay_ms: toml_config.session.countdown_final_delay_ms,
            required_samples: toml_config.calibration.required_samples,
            visibility_wait_ms: toml_config.calibration.visibility_wait_ms,
            beat_interval_ms: toml_config.tempo.beat_interval_ms,
            beats_down: toml_config.tempo.beats_down,
            beats_up: toml_config.tempo.beats_up,
            tempo_anchor: toml_config.tempo.anchor,
            egress_file: toml_config.egress.file,
            egress_channel_capacity: toml_config.egress.channel_capacity,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }

    pub fn countdown_enabled(&self) -> bool {
        self.countdown_enabled
    }

    pub fn countdown_step_ms(&self) -> u64 {
        self.countdown_step_ms
    }

    pub fn countdown_final_delay_ms(&self) -> u64 {
        self.countdown_final_delay_ms
    }

    pub fn required_samples(&self) -> usize {
        self.required_samples
    }

    pub fn visibility_wait_ms(&self) -> u64 {
        self.visibility_wait_ms
    }

    pub fn beat_interval_ms(&self) -> u64 {
        self.beat_interval_ms
    }

    pub fn beats_down(&self) -> u32 {
        self.beats_down
    }

    pub fn beats_up(&self) -> u32 {
        self.beats_up
    }

    pub fn tempo_anchor(&self) -> TempoAnchor {
        self.tempo_anchor
    }

    pub fn egress_file(&self) -> &str {
        &self.egress_file
    }

    pub fn egress_channel_capacity(&self) -> usize {
        self.egress_channel_capacity
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Override the goal (e.g. from `--goal`)
    pub fn with_goal(mut self, goal: u32) -> Self {
        self.goal = goal;
        self
    }

    pub fn with_egress_file(mut self, file: impl Into<String>) -> Self {
        self.egress_file = file.into();
        self
    }

    pub fn with_countdown(mut self, enabled: bool) -> Self {
        self.countdown_enabled = enabled;
        self
    }

    pub fn with_calibration(mut self, required_samples: usize, visibility_wait_ms: u64) -> Self {
        self.required_samples = required_samples;
        self.visibility_wait_ms = visibility_wait_ms;
        self
    }

    pub fn with_tempo_anchor(mut self, anchor: TempoAnchor) -> Self {
        self.tempo_anchor = anchor;
        self
    }
}
