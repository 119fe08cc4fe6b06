//! Persisted study preferences
//!
//! Values are clamped whenever they enter the system, whether they come from the
//! settings table, the command line or a transport command.

use serde::{Deserialize, Serialize};

pub const MIN_REPEAT_COUNT: u8 = 1;
pub const MAX_REPEAT_COUNT: u8 = 5;

pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 2.0;
pub const DEFAULT_RATE: f32 = 1.0;

/// Settings table keys
pub mod keys {
    pub const RATE: &str = "speech_rate";
    pub const REPEAT_COUNT: &str = "repeat_count";
    pub const SHUFFLE: &str = "shuffle";
    pub const HIDE_TERM: &str = "hide_term";
    pub const PREFER_AUDIO: &str = "prefer_audio";
    pub const READ_DESCRIPTION: &str = "read_description";
}

/// User preferences that shape playback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Speaking rate for synthesized speech
    pub rate: f32,
    /// Playback units of the term before moving on, always in [1, 5]
    pub repeat_count: u8,
    pub shuffle: bool,
    pub hide_term: bool,
    /// Prefer recorded audio over synthesized speech
    pub prefer_audio: bool,
    /// Narrate the description once the term repeats are exhausted
    pub read_description: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            repeat_count: MIN_REPEAT_COUNT,
            shuffle: false,
            hide_term: false,
            prefer_audio: true,
            read_description: false,
        }
    }
}

impl Preferences {
    /// Copy with every numeric field clamped into its valid range
    pub fn normalized(self) -> Self {
        Self {
            rate: clamp_rate(self.rate),
            repeat_count: clamp_repeat_count(i64::from(self.repeat_count)),
            ..self
        }
    }
}

/// Clamp a repeat count into [1, 5]
pub fn clamp_repeat_count(count: i64) -> u8 {
    count.clamp(i64::from(MIN_REPEAT_COUNT), i64::from(MAX_REPEAT_COUNT)) as u8
}

/// Clamp a speaking rate into [0.5, 2.0]; non-finite input yields the default
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_finite() {
        rate.clamp(MIN_RATE, MAX_RATE)
    } else {
        DEFAULT_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_count_clamped() {
        assert_eq!(clamp_repeat_count(0), 1);
        assert_eq!(clamp_repeat_count(-7), 1);
        assert_eq!(clamp_repeat_count(3), 3);
        assert_eq!(clamp_repeat_count(9), 5);
    }

    #[test]
    fn test_rate_clamped() {
        assert_eq!(clamp_rate(0.1), MIN_RATE);
        assert_eq!(clamp_rate(1.3), 1.3);
        assert_eq!(clamp_rate(4.0), MAX_RATE);
        assert_eq!(clamp_rate(f32::NAN), DEFAULT_RATE);
    }

    #[test]
    fn test_normalized_keeps_flags() {
        let prefs = Preferences {
            rate: 9.0,
            repeat_count: 0,
            shuffle: true,
            hide_term: true,
            prefer_audio: false,
            read_description: true,
        }
        .normalized();

        assert_eq!(prefs.rate, MAX_RATE);
        assert_eq!(prefs.repeat_count, 1);
        assert!(prefs.shuffle && prefs.hide_term && prefs.read_description);
        assert!(!prefs.prefer_audio);
    }
}
