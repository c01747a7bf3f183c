//! Integration tests for configuration loading

use squat_coach::infra::Config;
use squat_coach::services::TempoAnchor;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[session]
goal = 12
countdown_enabled = false
countdown_step_ms = 800
countdown_final_delay_ms = 250

[calibration]
required_samples = 20
visibility_wait_ms = 1500

[tempo]
beat_interval_ms = 750
beats_down = 3
beats_up = 3
anchor = "ideal"

[egress]
file = "out/events.jsonl"
channel_capacity = 64

[metrics]
interval_secs = 15
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.goal(), 12);
    assert!(!config.countdown_enabled());
    assert_eq!(config.countdown_step_ms(), 800);
    assert_eq!(config.countdown_final_delay_ms(), 250);
    assert_eq!(config.required_samples(), 20);
    assert_eq!(config.visibility_wait_ms(), 1500);
    assert_eq!(config.beat_interval_ms(), 750);
    assert_eq!(config.beats_down(), 3);
    assert_eq!(config.beats_up(), 3);
    assert_eq!(config.tempo_anchor(), TempoAnchor::Ideal);
    assert_eq!(config.egress_file(), "out/events.jsonl");
    assert_eq!(config.egress_channel_capacity(), 64);
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.config_file(), temp_file.path().to_str().unwrap());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[session]\ngoal = 30\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.goal(), 30);
    assert!(config.countdown_enabled());
    assert_eq!(config.required_samples(), 30);
    assert_eq!(config.beat_interval_ms(), 1000);
    assert_eq!(config.tempo_anchor(), TempoAnchor::Frame);
}

#[test]
fn test_invalid_anchor_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[tempo]\nanchor = \"wall\"\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.goal(), 20);
    assert_eq!(config.visibility_wait_ms(), 2000);
    assert_eq!(config.egress_file(), "-");
    assert_eq!(config.tempo_anchor(), TempoAnchor::Frame);
}
