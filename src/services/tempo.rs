//! Virtual metronome driven by frame time
//!
//! One cycle is `beats_down + beats_up` beats (5 + 4 by default) and paces one
//! squat. The scheduler is polled once per frame and advances at most one beat
//! per poll.

use crate::infra::config::Config;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BEAT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_BEATS_DOWN: u32 = 5;
pub const DEFAULT_BEATS_UP: u32 = 4;

/// Where the next beat interval is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoAnchor {
    /// From the frame that produced the last beat (accumulates frame jitter)
    #[default]
    Frame,
    /// From the ideal beat time (`last + interval`), no accumulated drift
    Ideal,
}

impl TempoAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempoAnchor::Frame => "frame",
            TempoAnchor::Ideal => "ideal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatTick {
    pub beat_index: u64,
    /// 1-based position within the cycle
    pub beat_in_cycle: u32,
    pub is_strong: bool,
}

pub struct TempoScheduler {
    beat_interval_ms: u64,
    beats_down: u32,
    beats_up: u32,
    anchor: TempoAnchor,
    beat_index: u64,
    is_running: bool,
    last_tick_ms: u64,
}

impl TempoScheduler {
    pub fn new(config: &Config) -> Self {
        Self::with_settings(
            config.beat_interval_ms(),
            config.beats_down(),
            config.beats_up(),
            config.tempo_anchor(),
        )
    }

    pub fn with_settings(
        beat_interval_ms: u64,
        beats_down: u32,
        beats_up: u32,
        anchor: TempoAnchor,
    ) -> Self {
        Self {
            beat_interval_ms: beat_interval_ms.max(1),
            beats_down: beats_down.max(1),
            beats_up,
            anchor,
            beat_index: 0,
            is_running: false,
            last_tick_ms: 0,
        }
    }

    /// Arm the clock at beat 0; the first beat lands one interval after `now_ms`
    pub fn start(&mut self, now_ms: u64) {
        self.beat_index = 0;
        self.last_tick_ms = now_ms;
        self.is_running = true;
        debug!(
            ts_ms = %now_ms,
            interval_ms = %self.beat_interval_ms,
            beats_per_cycle = %self.beats_per_cycle(),
            anchor = %self.anchor.as_str(),
            "tempo_started"
        );
    }

    pub fn stop(&mut self) {
        if self.is_running {
            debug!(beat_index = %self.beat_index, "tempo_stopped");
        }
        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn beat_index(&self) -> u64 {
        self.beat_index
    }

    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }

    pub fn beats_per_cycle(&self) -> u32 {
        self.beats_down.saturating_add(self.beats_up)
    }

    /// 1-based position of `beat_index` within its cycle
    pub fn beat_in_cycle(&self, beat_index: u64) -> u32 {
        if beat_index == 0 {
            return 0;
        }
        ((beat_index - 1) % self.beats_per_cycle() as u64) as u32 + 1
    }

    /// First beat of the down half and first beat of the up half
    pub fn is_strong(&self, beat_in_cycle: u32) -> bool {
        beat_in_cycle == 1 || beat_in_cycle == self.beats_down.saturating_add(1)
    }

    /// Completed cycles so far, i.e. how many reps the tempo expects
    pub fn expected_count(&self) -> u64 {
        self.beat_index / self.beats_per_cycle() as u64
    }

    /// Advance by one beat if a full interval has elapsed
    pub fn poll(&mut self, now_ms: u64) -> Option<BeatTick> {
        if !self.is_running {
            return None;
        }
        if now_ms.saturating_sub(self.last_tick_ms) < self.beat_interval_ms {
            return None;
        }

        self.last_tick_ms = match self.anchor {
            TempoAnchor::Frame => now_ms,
            TempoAnchor::Ideal => self.last_tick_ms + self.beat_interval_ms,
        };
        self.beat_index += 1;

        let beat_in_cycle = self.beat_in_cycle(self.beat_index);
        Some(BeatTick {
            beat_index: self.beat_index,
            beat_in_cycle,
            is_strong: self.is_strong(beat_in_cycle),
        })
    }
}
