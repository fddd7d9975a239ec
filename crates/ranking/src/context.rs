//! Per-run context handed to every rule.
//!
//! The clock and the random source are injected rather than read from
//! globals so a run is reproducible: tests fix `now` and pick the
//! "feeling lucky" branch explicitly.

use crate::rules::lucky::LuckyChoice;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses which rule the "feeling lucky" rule applies.
pub trait LuckyPicker: Send {
    /// Pick one entry of `menu`. `menu` is never empty.
    fn pick(&mut self, menu: &[LuckyChoice]) -> LuckyChoice;
}

/// Uniform random choice backed by a seedable generator
pub struct RandomPicker {
    rng: StdRng,
}

impl RandomPicker {
    /// Deterministic picker for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Picker seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl LuckyPicker for RandomPicker {
    fn pick(&mut self, menu: &[LuckyChoice]) -> LuckyChoice {
        menu[self.rng.random_range(0..menu.len())]
    }
}

/// Always picks the same rule
#[derive(Debug, Clone, Copy)]
pub struct FixedPicker(pub LuckyChoice);

impl LuckyPicker for FixedPicker {
    fn pick(&mut self, _menu: &[LuckyChoice]) -> LuckyChoice {
        self.0
    }
}

/// Everything a rule may read besides its input records
pub struct RuleContext<'a> {
    pub now: DateTime<Utc>,
    pub picker: &'a mut dyn LuckyPicker,
}

impl<'a> RuleContext<'a> {
    pub fn new(now: DateTime<Utc>, picker: &'a mut dyn LuckyPicker) -> Self {
        Self { now, picker }
    }
}
