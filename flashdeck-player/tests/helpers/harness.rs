//! Running engine wired to fake backends

use super::fakes::{FakeAudio, FakeSpeech};
use flashdeck_common::events::FlashdeckEvent;
use flashdeck_common::preferences::Preferences;
use flashdeck_player::playback::{Engine, EngineConfig, EngineHandle};
use flashdeck_player::speech::SpeechAdapter;
use flashdeck_player::SharedState;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const EVENT_WAIT: Duration = Duration::from_secs(2);

pub struct TestEngine {
    pub handle: EngineHandle,
    pub state: Arc<SharedState>,
    pub audio: Arc<FakeAudio>,
    pub speech: Arc<FakeSpeech>,
    pub events: broadcast::Receiver<FlashdeckEvent>,
    task: JoinHandle<()>,
}

impl TestEngine {
    pub fn start(prefs: Preferences, stall_timeout: Option<Duration>) -> Self {
        Self::start_with_db(prefs, stall_timeout, None)
    }

    pub fn start_with_db(prefs: Preferences, stall_timeout: Option<Duration>, db: Option<SqlitePool>) -> Self {
        let state = Arc::new(SharedState::new());
        let audio = Arc::new(FakeAudio::default());
        let speech = Arc::new(FakeSpeech::default());
        let events = state.subscribe_events();

        let (engine, handle) = Engine::new(
            prefs,
            audio.clone(),
            SpeechAdapter::new(speech.clone(), "en-US"),
            Arc::clone(&state),
            EngineConfig { stall_timeout },
            db,
        );
        let task = tokio::spawn(engine.run());

        Self {
            handle,
            state,
            audio,
            speech,
            events,
            task,
        }
    }

    /// Wait for the next event matching `pred`, skipping others
    pub async fn expect_event<F>(&mut self, pred: F) -> FlashdeckEvent
    where
        F: Fn(&FlashdeckEvent) -> bool,
    {
        wait_for(&mut self.events, pred).await
    }

    /// Stop the engine by dropping its handle and wait for the task to finish
    pub async fn shutdown(self) {
        drop(self.handle);
        tokio::time::timeout(EVENT_WAIT, self.task)
            .await
            .expect("engine did not stop")
            .expect("engine task panicked");
    }
}

pub async fn wait_for<F>(events: &mut broadcast::Receiver<FlashdeckEvent>, pred: F) -> FlashdeckEvent
where
    F: Fn(&FlashdeckEvent) -> bool,
{
    tokio::time::timeout(EVENT_WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
