//! Playback engine
//!
//! Drives the [`Sequencer`] from a single tokio task. Transport commands and unit
//! completions arrive on channels; the sequencer's effects are carried out against the
//! audio and speech backends in order. A stall watchdog bounds how long a unit may stay
//! in flight: the stall timeout, plus the unit's expected length once a backend has
//! reported one.

use super::effects::{Effect, UnitToken};
use super::sequencer::Sequencer;
use super::session::SessionSnapshot;
use super::transport::TransportCommand;
use crate::audio::AudioBackend;
use crate::completion::{Completion, UnitCompletion, UnitLength};
use crate::db::settings;
use crate::error::{Error, Result};
use crate::speech::SpeechAdapter;
use crate::state::SharedState;
use chrono::Utc;
use flashdeck_common::events::{FlashdeckEvent, UnitOutcome};
use flashdeck_common::models::Folder;
use flashdeck_common::preferences::Preferences;
use sqlx::{Pool, Sqlite};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Grace a unit gets beyond its expected length before the watchdog completes it
    /// (None disables). Units with no reported length get just this.
    pub stall_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Deadline for the unit currently in flight
#[derive(Debug, Clone, Copy)]
struct Deadline {
    token: UnitToken,
    started: Instant,
    at: Instant,
}

/// Asynchronous driver of the sequencer
pub struct Engine {
    sequencer: Sequencer,
    audio: Arc<dyn AudioBackend>,
    speech: SpeechAdapter,
    state: Arc<SharedState>,
    config: EngineConfig,
    db: Option<Pool<Sqlite>>,

    commands: mpsc::UnboundedReceiver<TransportCommand>,
    completions_tx: mpsc::UnboundedSender<UnitCompletion>,
    completions: mpsc::UnboundedReceiver<UnitCompletion>,
    lengths_tx: mpsc::UnboundedSender<UnitLength>,
    lengths: mpsc::UnboundedReceiver<UnitLength>,

    deadline: Option<Deadline>,
    published: SessionSnapshot,
}

impl Engine {
    /// Create an engine and the handle that controls it
    ///
    /// Nothing runs until [`Engine::run`] is awaited (usually in a spawned task).
    /// Without a database, preference changes are applied but not persisted.
    pub fn new(
        prefs: Preferences,
        audio: Arc<dyn AudioBackend>,
        speech: SpeechAdapter,
        state: Arc<SharedState>,
        config: EngineConfig,
        db: Option<Pool<Sqlite>>,
    ) -> (Self, EngineHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (lengths_tx, lengths) = mpsc::unbounded_channel();

        let handle = EngineHandle {
            tx: command_tx,
            state: Arc::clone(&state),
        };

        let engine = Self {
            sequencer: Sequencer::new(prefs),
            audio,
            speech,
            state,
            config,
            db,
            commands,
            completions_tx,
            completions,
            lengths_tx,
            lengths,
            deadline: None,
            published: SessionSnapshot::default(),
        };

        (engine, handle)
    }

    /// Process commands and completions until every handle is dropped
    pub async fn run(mut self) {
        info!("Playback engine started");
        self.publish().await;

        loop {
            let deadline = self.deadline.map(|d| d.at);
            let stall = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(done) = self.completions.recv() => {
                    self.handle_completion(done).await;
                }
                Some(length) = self.lengths.recv() => {
                    self.extend_deadline(length);
                }
                _ = stall => {
                    self.watchdog_check().await;
                }
            }
        }

        self.audio.silence();
        self.speech.cancel();
        info!("Playback engine stopped");
    }

    async fn handle_command(&mut self, command: TransportCommand) {
        debug!("Transport command: {:?}", command);

        let opened = match &command {
            TransportCommand::OpenFolder { folder, .. } => {
                Some((folder.id, folder.name.clone(), folder.len()))
            }
            _ => None,
        };

        let effects = command.apply(&mut self.sequencer);

        if let Some((folder_id, folder_name, card_count)) = opened {
            info!(folder_id, card_count, "Deck loaded: {}", folder_name);
            self.state.broadcast_event(FlashdeckEvent::DeckLoaded {
                folder_id,
                folder_name,
                card_count,
                timestamp: Utc::now(),
            });
        }

        self.apply(effects).await;
        self.publish().await;
    }

    async fn handle_completion(&mut self, done: UnitCompletion) {
        let pending = match self.sequencer.pending() {
            Some(pending) if pending.token == done.token => pending,
            _ => {
                debug!(token = done.token, outcome = %done.outcome, "Ignoring stale completion");
                return;
            }
        };

        if self.deadline.is_some_and(|d| d.token == done.token) {
            self.deadline = None;
        }

        debug!(
            card_id = pending.card_id,
            token = done.token,
            kind = ?pending.kind,
            outcome = %done.outcome,
            "Unit finished"
        );
        self.state.broadcast_event(FlashdeckEvent::UnitFinished {
            card_id: pending.card_id,
            kind: pending.kind,
            token: done.token,
            outcome: done.outcome,
            timestamp: Utc::now(),
        });

        let effects = self.sequencer.unit_finished(done.token, done.outcome);
        self.apply(effects).await;
        self.publish().await;
    }

    /// Give a running unit its expected length on top of the stall timeout
    fn extend_deadline(&mut self, length: UnitLength) {
        let Some(deadline) = self.deadline.as_mut().filter(|d| d.token == length.token) else {
            return;
        };
        let Some(grace) = self.config.stall_timeout else {
            return;
        };

        let Some(at) = deadline.started.checked_add(length.expected.saturating_add(grace)) else {
            return;
        };
        if at > deadline.at {
            debug!(
                token = length.token,
                expected_ms = length.expected.as_millis() as u64,
                "Unit deadline extended"
            );
            deadline.at = at;
        }
    }

    /// Force-complete a unit that outlived its deadline
    async fn watchdog_check(&mut self) {
        let Some(deadline) = self.deadline.take() else {
            return;
        };

        let pending = match self.sequencer.pending() {
            Some(pending) if pending.token == deadline.token => pending,
            _ => return,
        };

        let waited_ms = deadline.started.elapsed().as_millis() as u64;
        warn!(
            "[WATCHDOG] Unit {} ({:?}) for card {} produced no completion after {} ms - forcing timeout",
            pending.token, pending.kind, pending.card_id, waited_ms
        );

        self.audio.silence();
        self.speech.cancel();

        self.state.increment_watchdog_interventions();
        self.state.broadcast_event(FlashdeckEvent::WatchdogIntervention {
            card_id: pending.card_id,
            kind: pending.kind,
            token: pending.token,
            waited_ms,
            timestamp: Utc::now(),
        });

        self.handle_completion(UnitCompletion {
            token: pending.token,
            outcome: UnitOutcome::TimedOut,
        })
        .await;
    }

    /// Carry out effects in order
    ///
    /// A synchronous audio start failure is fed back to the sequencer; its fallback
    /// effects run before whatever was still queued.
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Silence => {
                    self.speech.cancel();
                    self.audio.silence();
                    self.deadline = None;
                }
                Effect::PlayAudio {
                    token,
                    card_id,
                    language,
                } => {
                    let done = self.completion(token);
                    match self.audio.play_once(card_id, &language, done) {
                        Ok(()) => self.unit_started(token),
                        Err(e) => {
                            warn!(card_id, token, "Audio could not start, falling back to speech: {}", e);
                            let fallback = self.sequencer.audio_start_failed(token);
                            for effect in fallback.into_iter().rev() {
                                queue.push_front(effect);
                            }
                        }
                    }
                }
                Effect::Speak {
                    token,
                    text,
                    language,
                    rate,
                } => {
                    let done = self.completion(token);
                    self.speech.speak_once(&text, &language, rate, done);
                    self.unit_started(token);
                }
                Effect::SpeakDescription { token, text, rate } => {
                    let done = self.completion(token);
                    self.speech.speak_description(&text, rate, done);
                    self.unit_started(token);
                }
                Effect::Prefetch { card_id, language } => {
                    self.audio.prefetch(card_id, &language);
                }
                Effect::PersistPreferences(prefs) => {
                    self.persist_preferences(prefs).await;
                }
            }
        }
    }

    fn completion(&self, token: UnitToken) -> Completion {
        Completion::new(token, self.completions_tx.clone()).with_lengths(self.lengths_tx.clone())
    }

    fn unit_started(&mut self, token: UnitToken) {
        let Some(pending) = self.sequencer.pending().filter(|p| p.token == token) else {
            return;
        };

        let now = Instant::now();
        self.deadline = self.config.stall_timeout.map(|timeout| Deadline {
            token,
            started: now,
            at: now + timeout,
        });

        self.state.broadcast_event(FlashdeckEvent::UnitStarted {
            card_id: pending.card_id,
            kind: pending.kind,
            token,
            timestamp: Utc::now(),
        });
    }

    async fn persist_preferences(&self, prefs: Preferences) {
        if let Some(db) = &self.db {
            if let Err(e) = settings::save_preferences(db, &prefs).await {
                warn!("Failed to persist preferences: {}", e);
            }
        }

        self.state.broadcast_event(FlashdeckEvent::PreferencesChanged {
            preferences: prefs,
            timestamp: Utc::now(),
        });
    }

    /// Store the new snapshot, then announce what changed
    async fn publish(&mut self) {
        let snapshot = self.sequencer.snapshot();
        let previous = std::mem::replace(&mut self.published, snapshot.clone());
        self.state.set_snapshot(snapshot.clone()).await;

        if previous.state != snapshot.state {
            info!("Playback state: {} -> {}", previous.state, snapshot.state);
            self.state.broadcast_event(FlashdeckEvent::PlaybackStateChanged {
                old_state: previous.state,
                new_state: snapshot.state,
                timestamp: Utc::now(),
            });
        }

        let card_changed = previous.folder_id != snapshot.folder_id
            || previous.position != snapshot.position
            || previous.card_id != snapshot.card_id
            || previous.term_visible != snapshot.term_visible;
        if card_changed {
            if let (Some(card_id), Some(term)) = (snapshot.card_id, snapshot.term.clone()) {
                self.state.broadcast_event(FlashdeckEvent::CurrentCardChanged {
                    position: snapshot.position,
                    card_id,
                    term,
                    term_visible: snapshot.term_visible,
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

/// Cloneable, non-blocking control surface for a running [`Engine`]
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<TransportCommand>,
    state: Arc<SharedState>,
}

impl EngineHandle {
    /// Queue a command; fails only when the engine has stopped
    pub fn send(&self, command: TransportCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::Internal("Playback engine is not running".to_string()))
    }

    pub fn open_folder(&self, folder: Folder, autoplay: bool) -> Result<()> {
        self.send(TransportCommand::OpenFolder { folder, autoplay })
    }

    pub fn leave(&self) -> Result<()> {
        self.send(TransportCommand::Leave)
    }

    pub fn unlock(&self) -> Result<()> {
        self.send(TransportCommand::Unlock)
    }

    pub fn play(&self) -> Result<()> {
        self.send(TransportCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(TransportCommand::Pause)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(TransportCommand::Toggle)
    }

    pub fn next(&self) -> Result<()> {
        self.send(TransportCommand::Next)
    }

    pub fn prev(&self) -> Result<()> {
        self.send(TransportCommand::Prev)
    }

    pub fn jump_to(&self, position: usize) -> Result<()> {
        self.send(TransportCommand::JumpTo(position))
    }

    pub fn replay_current(&self) -> Result<()> {
        self.send(TransportCommand::ReplayCurrent)
    }

    pub fn reveal_term(&self) -> Result<()> {
        self.send(TransportCommand::RevealTerm)
    }

    pub fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.send(TransportCommand::SetShuffle(shuffle))
    }

    pub fn set_hide_term(&self, hide: bool) -> Result<()> {
        self.send(TransportCommand::SetHideTerm(hide))
    }

    pub fn set_prefer_audio(&self, prefer: bool) -> Result<()> {
        self.send(TransportCommand::SetPreferAudio(prefer))
    }

    pub fn set_read_description(&self, read: bool) -> Result<()> {
        self.send(TransportCommand::SetReadDescription(read))
    }

    pub fn set_rate(&self, rate: f32) -> Result<()> {
        self.send(TransportCommand::SetRate(rate))
    }

    pub fn set_repeat_count(&self, count: i64) -> Result<()> {
        self.send(TransportCommand::SetRepeatCount(count))
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot().await
    }
}
