//! Session controller - goal / extra-goal lifecycle and pacing feedback
//!
//! Owns the tempo scheduler and the message book. The caller feeds it
//! repetition events from the detector and polls it once per frame; it
//! answers with feedback, beat ticks and the final `session_finished`.
//!
//! Lifecycle:
//! 1. `set_goal` draws the hidden extra reps in [5, 20]
//! 2. `start` arms the tempo clock and greets
//! 3. reaching `goal` flips into the extra phase (no finish)
//! 4. reaching `goal + extra` finishes exactly once

use crate::domain::error::CoachError;
use crate::domain::events::{CoachEvent, EventSink};
use crate::domain::types::DepthCategory;
use crate::infra::config::Config;
use crate::services::messages::{MessageBook, MessageCategory, RandomSource};
use crate::services::tempo::{BeatTick, TempoScheduler};
use tracing::{debug, info, warn};

pub const MIN_EXTRA_REPS: u32 = 5;
pub const MAX_EXTRA_REPS: u32 = 20;
/// Largest goal whose `goal + extra` still fits in a `u32`
pub const MAX_GOAL: u32 = u32::MAX - MAX_EXTRA_REPS;

/// Goals in `1..=MAX_GOAL` are accepted
pub fn validate_goal(goal: u32) -> Result<u32, CoachError> {
    if goal == 0 || goal > MAX_GOAL {
        return Err(CoachError::InvalidGoal { goal });
    }
    Ok(goal)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub goal: u32,
    pub extra_reps: u32,
    pub actual_goal: u32,
    pub current_count: u32,
    pub is_extra_phase: bool,
    pub is_finished: bool,
    pub missed_cycles: u32,
    pub last_warned_beat: u64,
}

/// Result of a tempo poll that produced a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatOutcome {
    pub tick: BeatTick,
    /// A behind-tempo warning was issued on this beat
    pub behind_tempo: bool,
}

pub struct SessionController {
    state: SessionState,
    tempo: TempoScheduler,
    messages: MessageBook,
    stopped: bool,
}

impl SessionController {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(TempoScheduler::new(config), MessageBook::new())
    }

    pub fn with_parts(tempo: TempoScheduler, messages: MessageBook) -> Self {
        Self { state: SessionState::default(), tempo, messages, stopped: false }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn tempo(&self) -> &TempoScheduler {
        &self.tempo
    }

    pub fn goal(&self) -> u32 {
        self.state.goal
    }

    pub fn actual_goal(&self) -> u32 {
        self.state.actual_goal
    }

    pub fn current_count(&self) -> u32 {
        self.state.current_count
    }

    pub fn is_extra_phase(&self) -> bool {
        self.state.is_extra_phase
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn missed_cycles(&self) -> u32 {
        self.state.missed_cycles
    }

    /// Reps left before the session ends; 0 outside the extra phase
    pub fn extra_remaining(&self) -> u32 {
        if !self.state.is_extra_phase {
            return 0;
        }
        self.state.actual_goal.saturating_sub(self.state.current_count)
    }

    /// Set the visible goal and draw the hidden extra reps
    pub fn set_goal(&mut self, goal: u32, random: &mut dyn RandomSource) -> Result<(), CoachError> {
        let goal = validate_goal(goal)?;
        let extra_reps = random.range_inclusive(MIN_EXTRA_REPS, MAX_EXTRA_REPS);
        self.state.goal = goal;
        self.state.extra_reps = extra_reps;
        self.state.actual_goal = goal.saturating_add(extra_reps);
        debug!(goal = %goal, extra_reps = %extra_reps, "goal_set");
        Ok(())
    }

    /// Reset counters, arm the tempo clock and emit a start message
    pub fn start(
        &mut self,
        now_ms: u64,
        random: &mut dyn RandomSource,
        sink: &mut dyn EventSink,
    ) -> Result<(), CoachError> {
        if self.state.goal == 0 {
            return Err(CoachError::GoalNotSet);
        }
        self.state = SessionState {
            goal: self.state.goal,
            extra_reps: self.state.extra_reps,
            actual_goal: self.state.actual_goal,
            ..SessionState::default()
        };
        self.stopped = false;
        self.messages.forget_history();
        self.tempo.start(now_ms);

        info!(
            goal = %self.state.goal,
            actual_goal = %self.state.actual_goal,
            ts_ms = %now_ms,
            "session_started"
        );
        let text = self.messages.pick(MessageCategory::Start, None, random);
        sink.emit(CoachEvent::feedback(text));
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.is_finished || self.stopped
    }

    /// Handle a completed repetition; ignored once finished or stopped
    pub fn on_repetition(
        &mut self,
        count: u32,
        category: DepthCategory,
        random: &mut dyn RandomSource,
        sink: &mut dyn EventSink,
    ) {
        if self.is_closed() {
            return;
        }
        self.state.current_count = count;

        if count == self.state.goal {
            self.state.is_extra_phase = true;
            info!(
                count = %count,
                extra_reps = %self.state.extra_reps,
                "extra_training_entered"
            );
            let text = self.messages.pick(MessageCategory::AfterGoal, None, random);
            sink.emit(CoachEvent::feedback(text));
            sink.emit(CoachEvent::ExtraTrainingEntered {});
            return;
        }

        if count >= self.state.actual_goal {
            self.finish(random, sink);
            return;
        }

        let text = match category {
            DepthCategory::Shallow => self.messages.pick(MessageCategory::Shallow, None, random),
            DepthCategory::Medium => self.messages.pick(MessageCategory::Medium, Some(count), random),
            DepthCategory::Deep => self.messages.pick(MessageCategory::Deep, Some(count), random),
        };
        sink.emit(CoachEvent::feedback(text));
    }

    /// Advance the tempo clock; a produced beat is emitted and drift-checked
    pub fn poll_tempo(
        &mut self,
        now_ms: u64,
        random: &mut dyn RandomSource,
        sink: &mut dyn EventSink,
    ) -> Option<BeatOutcome> {
        if self.is_closed() {
            return None;
        }
        let tick = self.tempo.poll(now_ms)?;
        sink.emit(CoachEvent::BeatTick { beat_index: tick.beat_index, is_strong: tick.is_strong });

        let behind_tempo = self.check_drift(tick.beat_index, random, sink);
        Some(BeatOutcome { tick, behind_tempo })
    }

    fn check_drift(
        &mut self,
        beat_index: u64,
        random: &mut dyn RandomSource,
        sink: &mut dyn EventSink,
    ) -> bool {
        let count = self.state.current_count as u64;
        if count == 0 {
            return false;
        }
        let expected = self.tempo.expected_count();
        let since_warned = beat_index.saturating_sub(self.state.last_warned_beat);
        if expected.saturating_sub(count) < 1
            || since_warned < self.tempo.beats_per_cycle() as u64
        {
            return false;
        }

        self.state.missed_cycles += 1;
        self.state.last_warned_beat = beat_index;
        warn!(
            beat_index = %beat_index,
            expected = %expected,
            count = %count,
            missed_cycles = %self.state.missed_cycles,
            "behind_tempo"
        );
        let text = self.messages.pick(MessageCategory::Slow, None, random);
        sink.emit(CoachEvent::feedback(text));
        true
    }

    /// Close the session once: stop the clock and emit the closing message
    pub fn finish(&mut self, random: &mut dyn RandomSource, sink: &mut dyn EventSink) {
        if self.state.is_finished {
            return;
        }
        self.state.is_finished = true;
        self.tempo.stop();

        let closing_message = self.messages.pick(MessageCategory::Finish, None, random);
        info!(
            final_count = %self.state.current_count,
            actual_goal = %self.state.actual_goal,
            missed_cycles = %self.state.missed_cycles,
            "session_finished"
        );
        sink.emit(CoachEvent::SessionFinished {
            final_count: self.state.current_count,
            closing_message,
        });
    }

    /// Cancel without a closing message; later events are discarded
    pub fn stop(&mut self) {
        if !self.stopped && !self.state.is_finished {
            info!(count = %self.state.current_count, "session_stopped");
        }
        self.stopped = true;
        self.tempo.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::messages::test_support::ScriptedRandom;
    use crate::services::messages::RngSource;
    use crate::services::tempo::TempoAnchor;

    fn controller() -> SessionController {
        SessionController::with_parts(
            TempoScheduler::with_settings(1000, 5, 4, TempoAnchor::Frame),
            MessageBook::new(),
        )
    }

    fn started(goal: u32, extra: u32) -> (SessionController, ScriptedRandom, Vec<CoachEvent>) {
        let mut ctl = controller();
        let mut random = ScriptedRandom::new(&[extra]);
        let mut sink = Vec::new();
        ctl.set_goal(goal, &mut random).unwrap();
        ctl.start(0, &mut random, &mut sink).unwrap();
        (ctl, random, sink)
    }

    fn finished_events(events: &[CoachEvent]) -> usize {
        events.iter().filter(|e| matches!(e, CoachEvent::SessionFinished { .. })).count()
    }

    #[test]
    fn test_zero_goal_rejected() {
        let mut ctl = controller();
        let mut random = ScriptedRandom::new(&[]);
        assert_eq!(ctl.set_goal(0, &mut random), Err(CoachError::InvalidGoal { goal: 0 }));
        assert!(random.calls.is_empty());
    }

    #[test]
    fn test_goal_too_large_for_extra_rejected() {
        let mut ctl = controller();
        let mut random = ScriptedRandom::new(&[MAX_EXTRA_REPS]);
        let goal = u32::MAX - 2;
        assert_eq!(ctl.set_goal(goal, &mut random), Err(CoachError::InvalidGoal { goal }));
        assert!(random.calls.is_empty());

        // The largest accepted goal still keeps actual_goal above goal
        ctl.set_goal(MAX_GOAL, &mut random).unwrap();
        assert_eq!(ctl.actual_goal(), u32::MAX);
        assert!(ctl.actual_goal() > ctl.goal());
    }

    #[test]
    fn test_start_requires_goal() {
        let mut ctl = controller();
        let mut random = ScriptedRandom::new(&[]);
        let mut sink = Vec::new();
        assert_eq!(ctl.start(0, &mut random, &mut sink), Err(CoachError::GoalNotSet));
        assert!(sink.is_empty());
        assert!(!ctl.tempo().is_running());
    }

    #[test]
    fn test_extra_reps_drawn_from_range() {
        let mut random = ScriptedRandom::new(&[7]);
        let mut ctl = controller();
        ctl.set_goal(20, &mut random).unwrap();
        assert_eq!(random.calls, vec![(MIN_EXTRA_REPS, MAX_EXTRA_REPS)]);
        assert_eq!(ctl.actual_goal(), 27);

        let mut rng = RngSource::seeded(1234);
        for _ in 0..200 {
            ctl.set_goal(10, &mut rng).unwrap();
            let extra = ctl.actual_goal() - ctl.goal();
            assert!((5..=20).contains(&extra));
        }
    }

    #[test]
    fn test_start_greets_and_arms_tempo() {
        let (ctl, _, sink) = started(20, 7);
        assert!(ctl.tempo().is_running());
        assert_eq!(sink.len(), 1);
        assert!(matches!(&sink[0], CoachEvent::FeedbackMessage { text } if !text.is_empty()));
    }

    #[test]
    fn test_goal_twenty_extra_seven_scenario() {
        let (mut ctl, mut random, _) = started(20, 7);

        let mut events = Vec::new();
        for count in 1..=19 {
            ctl.on_repetition(count, DepthCategory::Deep, &mut random, &mut events);
        }
        assert!(!ctl.is_extra_phase());
        assert_eq!(events.len(), 19);

        events.clear();
        ctl.on_repetition(20, DepthCategory::Deep, &mut random, &mut events);
        assert!(ctl.is_extra_phase());
        assert!(!ctl.is_finished());
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CoachEvent::FeedbackMessage { .. }));
        assert_eq!(events[1], CoachEvent::ExtraTrainingEntered {});
        assert_eq!(ctl.extra_remaining(), 7);

        events.clear();
        for count in 21..=26 {
            ctl.on_repetition(count, DepthCategory::Medium, &mut random, &mut events);
        }
        assert_eq!(finished_events(&events), 0);
        assert_eq!(ctl.extra_remaining(), 1);

        ctl.on_repetition(27, DepthCategory::Shallow, &mut random, &mut events);
        assert!(ctl.is_finished());
        assert_eq!(finished_events(&events), 1);
        assert!(matches!(
            events.last(),
            Some(CoachEvent::SessionFinished { final_count: 27, .. })
        ));
        assert!(!ctl.tempo().is_running());
        assert_eq!(ctl.extra_remaining(), 0);
    }

    #[test]
    fn test_finish_fires_once_and_later_events_ignored() {
        let (mut ctl, mut random, _) = started(1, 5);
        let mut events = Vec::new();
        for count in 1..=8 {
            ctl.on_repetition(count, DepthCategory::Deep, &mut random, &mut events);
        }
        ctl.finish(&mut random, &mut events);

        assert_eq!(finished_events(&events), 1);
        assert_eq!(ctl.current_count(), 6);
        assert!(ctl.poll_tempo(60_000, &mut random, &mut events).is_none());
    }

    #[test]
    fn test_medium_and_deep_carry_count() {
        let mut ctl = controller();
        let mut random = ScriptedRandom::new(&[5, 0, 0, 0]);
        let mut sink = Vec::new();
        ctl.set_goal(10, &mut random).unwrap();
        ctl.start(0, &mut random, &mut sink).unwrap();

        sink.clear();
        ctl.on_repetition(3, DepthCategory::Medium, &mut random, &mut sink);
        ctl.on_repetition(4, DepthCategory::Deep, &mut random, &mut sink);
        assert_eq!(sink, vec![CoachEvent::feedback("3"), CoachEvent::feedback("4")]);
    }

    #[test]
    fn test_beats_emitted_while_running() {
        let (mut ctl, mut random, _) = started(20, 7);
        let mut events = Vec::new();
        let outcome = ctl.poll_tempo(1000, &mut random, &mut events).unwrap();
        assert_eq!(outcome.tick.beat_index, 1);
        assert!(!outcome.behind_tempo);
        assert_eq!(events, vec![CoachEvent::BeatTick { beat_index: 1, is_strong: true }]);
    }

    #[test]
    fn test_no_drift_warning_before_first_rep() {
        let (mut ctl, mut random, _) = started(20, 7);
        let mut events = Vec::new();
        for beat in 1..=40u64 {
            ctl.poll_tempo(beat * 1000, &mut random, &mut events);
        }
        assert_eq!(ctl.missed_cycles(), 0);
        assert!(events.iter().all(|e| matches!(e, CoachEvent::BeatTick { .. })));
    }

    #[test]
    fn test_drift_warning_once_per_cycle() {
        let (mut ctl, mut random, _) = started(20, 7);
        let mut events = Vec::new();
        ctl.on_repetition(1, DepthCategory::Deep, &mut random, &mut events);

        let mut warned_at = Vec::new();
        for beat in 1..=30u64 {
            if let Some(outcome) = ctl.poll_tempo(beat * 1000, &mut random, &mut events) {
                if outcome.behind_tempo {
                    warned_at.push(outcome.tick.beat_index);
                }
            }
        }
        // Expected count reaches 2 at beat 18 and 3 at beat 27
        assert_eq!(warned_at, vec![18, 27]);
        assert_eq!(ctl.missed_cycles(), 2);
        assert_eq!(ctl.state().last_warned_beat, 27);
    }

    #[test]
    fn test_keeping_pace_never_warns() {
        let (mut ctl, mut random, _) = started(20, 7);
        let mut events = Vec::new();
        let mut count = 0;
        for beat in 1..=45u64 {
            ctl.poll_tempo(beat * 1000, &mut random, &mut events);
            if beat % 9 == 8 {
                count += 1;
                ctl.on_repetition(count, DepthCategory::Deep, &mut random, &mut events);
            }
        }
        assert_eq!(ctl.missed_cycles(), 0);
    }

    #[test]
    fn test_stop_discards_later_events() {
        let (mut ctl, mut random, _) = started(20, 7);
        ctl.stop();
        let mut events = Vec::new();
        ctl.on_repetition(1, DepthCategory::Deep, &mut random, &mut events);
        assert!(ctl.poll_tempo(5_000, &mut random, &mut events).is_none());
        assert!(events.is_empty());
        assert!(ctl.is_stopped());
        assert!(!ctl.is_finished());
    }
}
