//! Coaching lines and the selection policy
//!
//! Picks are uniform over a category's pool, excluding the previous pick of
//! the same category so a line never plays twice in a row. Randomness comes
//! from a `RandomSource` so tests can script exact sequences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

/// Uniform integer source
pub trait RandomSource {
    /// Uniform value in `[low, high]`; callers guarantee `low <= high`
    fn range_inclusive(&mut self, low: u32, high: u32) -> u32;
}

/// `RandomSource` backed by any `rand` generator
pub struct RngSource<R>(pub R);

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn range_inclusive(&mut self, low: u32, high: u32) -> u32 {
        self.0.gen_range(low..=high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    Start,
    Shallow,
    Medium,
    Deep,
    Slow,
    AfterGoal,
    Finish,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCategory::Start => "start",
            MessageCategory::Shallow => "shallow",
            MessageCategory::Medium => "medium",
            MessageCategory::Deep => "deep",
            MessageCategory::Slow => "slow",
            MessageCategory::AfterGoal => "after_goal",
            MessageCategory::Finish => "finish",
        }
    }
}

const START: &[&str] = &[
    "Training starts now! Get fired up!",
    "Are you ready? Here we go!",
    "No whining! Let's move!",
];

const SHALLOW: &[&str] = &[
    "Too shallow! Get those hips down!",
    "What kind of half squat was that?",
    "Hips are too high! Do it again!",
    "That won't build anything!",
    "Deeper! Bend those knees!",
    "No slacking allowed!",
    "Show me some real effort!",
    "Quit fooling around! Sink lower!",
];

const MEDIUM: &[&str] = &["{count}", "{count}!", "Right, {count}"];

const DEEP: &[&str] = &["{count}", "{count}!", "{count}! Good!"];

const SLOW: &[&str] = &[
    "Too slow!",
    "Faster!",
    "Keep up with the tempo!",
    "I'm leaving you behind!",
    "Show me some guts!",
];

const AFTER_GOAL: &[&str] = &[
    "Not done yet! I decide when it ends!",
    "Who said you could stop? Keep going!",
    "The goal? That's just a checkpoint!",
    "Don't go soft on me! You can still move!",
    "It's not over! Push harder!",
];

const FINISH: &[&str] = &[
    "Fine, you pass. I'll train you again.",
    "Those twig legs turned into carrots at least.",
    "Not bad. Next time you'll do better.",
    "I don't hate that grit. Come back.",
    "You're a little less hopeless now.",
    "You lasted longer than I thought. I'll give you that.",
    "That's it for today. Be back tomorrow.",
];

/// Pre-start countdown, played in order
pub const COUNTDOWN: &[&str] = &["5", "4", "3", "2", "1", "Go!"];

/// Message pools plus per-category memory of the last pick
pub struct MessageBook {
    pools: FxHashMap<MessageCategory, Vec<String>>,
    last_pick: FxHashMap<MessageCategory, usize>,
}

impl MessageBook {
    pub fn new() -> Self {
        let pools = [
            (MessageCategory::Start, START),
            (MessageCategory::Shallow, SHALLOW),
            (MessageCategory::Medium, MEDIUM),
            (MessageCategory::Deep, DEEP),
            (MessageCategory::Slow, SLOW),
            (MessageCategory::AfterGoal, AFTER_GOAL),
            (MessageCategory::Finish, FINISH),
        ]
        .into_iter()
        .map(|(category, lines)| (category, lines.iter().map(|s| s.to_string()).collect()))
        .collect();

        Self { pools, last_pick: FxHashMap::default() }
    }

    /// Replace a category's pool (e.g. for localization)
    pub fn with_pool(mut self, category: MessageCategory, lines: Vec<String>) -> Self {
        self.pools.insert(category, lines);
        self.last_pick.remove(&category);
        self
    }

    pub fn pool_len(&self, category: MessageCategory) -> usize {
        self.pools.get(&category).map_or(0, Vec::len)
    }

    /// Forget previous picks (new session)
    pub fn forget_history(&mut self) {
        self.last_pick.clear();
    }

    /// Pick a line, substituting `{count}` when given. Empty pools yield "".
    pub fn pick(
        &mut self,
        category: MessageCategory,
        count: Option<u32>,
        random: &mut dyn RandomSource,
    ) -> String {
        let Some(pool) = self.pools.get(&category) else {
            return String::new();
        };
        let index = match (pool.len(), self.last_pick.get(&category)) {
            (0, _) => return String::new(),
            (1, _) => 0,
            (len, Some(&last)) if last < len => {
                // Draw from the other len-1 entries, skipping over `last`
                let drawn = random.range_inclusive(0, len as u32 - 2) as usize;
                if drawn >= last {
                    drawn + 1
                } else {
                    drawn
                }
            }
            (len, _) => random.range_inclusive(0, len as u32 - 1) as usize,
        };
        self.last_pick.insert(category, index);

        let line = &pool[index];
        match count {
            Some(n) => line.replace("{count}", &n.to_string()),
            None => line.clone(),
        }
    }
}

impl Default for MessageBook {
    fn default() -> Self {
        Self::new()
    }
}
