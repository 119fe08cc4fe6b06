//! Shared session state
//!
//! The engine publishes a fresh [`SessionSnapshot`] after every transition and
//! broadcasts events; front-ends read the snapshot and subscribe to the bus.

use crate::playback::SessionSnapshot;
use flashdeck_common::events::{EventBus, FlashdeckEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

pub use flashdeck_common::events::PlaybackState;

/// Default event buffer per subscriber
pub const EVENT_CAPACITY: usize = 256;

/// Shared state accessible by all components
pub struct SharedState {
    snapshot: RwLock<SessionSnapshot>,

    events: EventBus,

    /// Units the stall watchdog had to force-complete
    watchdog_interventions_total: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshot: RwLock::new(SessionSnapshot::default()),
            events: EventBus::new(capacity),
            watchdog_interventions_total: AtomicU64::new(0),
        }
    }

    /// Broadcast an event (no subscribers is OK)
    pub fn broadcast_event(&self, event: FlashdeckEvent) {
        self.events.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FlashdeckEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn set_snapshot(&self, snapshot: SessionSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    pub async fn get_playback_state(&self) -> PlaybackState {
        self.snapshot.read().await.state
    }

    pub fn increment_watchdog_interventions(&self) {
        self.watchdog_interventions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_watchdog_interventions(&self) -> u64 {
        self.watchdog_interventions_total.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let state = SharedState::new();
        assert_eq!(state.get_playback_state().await, PlaybackState::Idle);

        let snapshot = SessionSnapshot {
            state: PlaybackState::Paused,
            position: 3,
            ..SessionSnapshot::default()
        };
        state.set_snapshot(snapshot.clone()).await;

        assert_eq!(state.snapshot().await, snapshot);
        assert_eq!(state.get_playback_state().await, PlaybackState::Paused);
    }

    #[test]
    fn test_watchdog_counter() {
        let state = SharedState::new();
        state.increment_watchdog_interventions();
        state.increment_watchdog_interventions();
        assert_eq!(state.get_watchdog_interventions(), 2);
    }
}
