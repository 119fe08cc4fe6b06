//! Event types for the Flashdeck event system
//!
//! Provides shared event definitions and the EventBus used by the player and its
//! front-ends.

mod playback_types;

pub use playback_types::{PlaybackState, UnitKind, UnitOutcome};

use crate::models::{CardId, FolderId};
use crate::preferences::Preferences;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Flashdeck event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so they can be
/// logged or forwarded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlashdeckEvent {
    /// Sequencer state changed
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current card changed, or its term visibility changed
    CurrentCardChanged {
        /// Logical position in the navigator's order
        position: usize,
        card_id: CardId,
        term: String,
        /// False while hide-term is on and the card has not been revealed
        term_visible: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A playback unit was issued to a backend
    UnitStarted {
        card_id: CardId,
        kind: UnitKind,
        /// Generation token of the unit
        token: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A playback unit finished and was accepted by the sequencer
    UnitFinished {
        card_id: CardId,
        kind: UnitKind,
        token: u64,
        outcome: UnitOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A user-driven preference change was applied
    PreferencesChanged {
        preferences: Preferences,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A deck was opened in the player
    DeckLoaded {
        folder_id: FolderId,
        folder_name: String,
        card_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The stall watchdog forced completion of a unit that never finished
    WatchdogIntervention {
        card_id: CardId,
        kind: UnitKind,
        token: u64,
        waited_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FlashdeckEvent {
    /// Event type name, matching the serialized `type` tag
    pub fn event_type(&self) -> &str {
        match self {
            FlashdeckEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            FlashdeckEvent::CurrentCardChanged { .. } => "CurrentCardChanged",
            FlashdeckEvent::UnitStarted { .. } => "UnitStarted",
            FlashdeckEvent::UnitFinished { .. } => "UnitFinished",
            FlashdeckEvent::PreferencesChanged { .. } => "PreferencesChanged",
            FlashdeckEvent::DeckLoaded { .. } => "DeckLoaded",
            FlashdeckEvent::WatchdogIntervention { .. } => "WatchdogIntervention",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`: every subscriber sees every event
/// emitted after it subscribed. Slow subscribers lag and lose the oldest events
/// rather than blocking the player.
pub struct EventBus {
    tx: broadcast::Sender<FlashdeckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FlashdeckEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FlashdeckEvent,
    ) -> Result<usize, broadcast::error::SendError<FlashdeckEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FlashdeckEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
