//! Observable view of the playback session

use super::effects::PendingUnit;
use flashdeck_common::events::PlaybackState;
use flashdeck_common::models::{CardId, FolderId};
use flashdeck_common::preferences::Preferences;
use serde::Serialize;

/// Point-in-time copy of the sequencer's session state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub folder_id: Option<FolderId>,
    /// Logical position in the navigator's order
    pub position: usize,
    pub card_id: Option<CardId>,
    pub term: Option<String>,
    pub deck_len: usize,
    /// Transport is in the playing state
    pub playing: bool,
    pub unlocked: bool,
    pub remaining_repeats: u8,
    pub term_visible: bool,
    pub preferences: Preferences,
    #[serde(skip)]
    pub pending: Option<PendingUnit>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            folder_id: None,
            position: 0,
            card_id: None,
            term: None,
            deck_len: 0,
            playing: false,
            unlocked: false,
            remaining_repeats: 1,
            term_visible: true,
            preferences: Preferences::default(),
            pending: None,
        }
    }
}
