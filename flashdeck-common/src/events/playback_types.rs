//! Playback-related type definitions
//!
//! Supporting types for sequencer state and playback unit lifecycle.

use serde::{Deserialize, Serialize};

/// Sequencer state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No active playback
    #[default]
    Idle,
    /// A backend is producing the term
    PlayingTerm,
    /// Narrating the description after the term repeats
    PlayingDescription,
    /// Transient: computing the next position
    Advancing,
    /// Explicit user pause; position and card are kept for resume
    Paused,
}

impl PlaybackState {
    /// True while a playback unit is expected to be in flight
    pub fn is_producing(self) -> bool {
        matches!(self, PlaybackState::PlayingTerm | PlaybackState::PlayingDescription)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::PlayingTerm => write!(f, "playing_term"),
            PlaybackState::PlayingDescription => write!(f, "playing_description"),
            PlaybackState::Advancing => write!(f, "advancing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// What a playback unit produces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Recorded clip of the term
    TermAudio,
    /// Synthesized utterance of the term
    TermSpeech,
    /// Synthesized narration of the description
    Description,
}

impl UnitKind {
    pub fn is_term(self) -> bool {
        !matches!(self, UnitKind::Description)
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::TermAudio => write!(f, "term_audio"),
            UnitKind::TermSpeech => write!(f, "term_speech"),
            UnitKind::Description => write!(f, "description"),
        }
    }
}

/// How a playback unit ended
///
/// Every outcome counts as a completed unit for repeat/advance purposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Natural end of media or utterance
    Completed,
    /// Load, decode, output or synthesis failure
    Failed,
    /// No completion arrived before the stall deadline
    TimedOut,
}

impl std::fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitOutcome::Completed => write!(f, "completed"),
            UnitOutcome::Failed => write!(f, "failed"),
            UnitOutcome::TimedOut => write!(f, "timed_out"),
        }
    }
}
