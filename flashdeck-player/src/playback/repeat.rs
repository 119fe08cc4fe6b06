//! Repeat Controller
//!
//! One counter per active card. `decide` is called once per completed playback unit
//! of the term, so a configured count of N plays the term exactly N times.

use flashdeck_common::preferences::clamp_repeat_count;

/// Outcome of [`RepeatController::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDecision {
    /// Play the term again
    Repeat,
    /// Term repeats exhausted
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatController {
    remaining: u8,
}

impl RepeatController {
    pub fn new(count: u8) -> Self {
        Self {
            remaining: clamp_repeat_count(i64::from(count)),
        }
    }

    /// Restart the counter for a new card (count clamped to [1, 5])
    pub fn reset(&mut self, count: u8) {
        self.remaining = clamp_repeat_count(i64::from(count));
    }

    /// Consume one completed unit
    pub fn decide(&mut self) -> RepeatDecision {
        if self.remaining > 1 {
            self.remaining -= 1;
            RepeatDecision::Repeat
        } else {
            RepeatDecision::Done
        }
    }

    /// Units still to be played, including the one in flight
    pub fn remaining(&self) -> u8 {
        self.remaining
    }
}

impl Default for RepeatController {
    fn default() -> Self {
        Self::new(1)
    }
}
