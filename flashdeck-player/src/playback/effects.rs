//! Commands the sequencer asks its driver to carry out

use flashdeck_common::events::UnitKind;
use flashdeck_common::models::CardId;
use flashdeck_common::preferences::Preferences;

/// Generation token identifying one playback unit
///
/// Tokens increase monotonically per sequencer. A completion whose token does not
/// match the unit currently pending is stale and ignored.
pub type UnitToken = u64;

/// The single playback unit the sequencer is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUnit {
    pub token: UnitToken,
    pub kind: UnitKind,
    pub card_id: CardId,
}

/// Side effect emitted by a sequencer transition, applied in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Cancel speech and stop every audio clip; drop their completions
    Silence,
    /// Play the recorded clip for a card once
    PlayAudio {
        token: UnitToken,
        card_id: CardId,
        language: String,
    },
    /// Speak the term once
    Speak {
        token: UnitToken,
        text: String,
        language: String,
        rate: f32,
    },
    /// Narrate a description once in the fixed description language
    SpeakDescription {
        token: UnitToken,
        text: String,
        rate: f32,
    },
    /// Warm the clip cache for an upcoming card
    Prefetch { card_id: CardId, language: String },
    /// Write preferences back to the settings store
    PersistPreferences(Preferences),
}

impl Effect {
    /// Token of the unit this effect starts, if it starts one
    pub fn unit_token(&self) -> Option<UnitToken> {
        match self {
            Effect::PlayAudio { token, .. }
            | Effect::Speak { token, .. }
            | Effect::SpeakDescription { token, .. } => Some(*token),
            _ => None,
        }
    }
}
