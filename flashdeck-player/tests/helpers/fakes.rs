//! Deterministic backends
//!
//! Each fake keeps at most one completion, mirroring the one-unit-in-flight rule:
//! starting a unit or silencing drops the previous completion unreported.

use flashdeck_common::events::UnitOutcome;
use flashdeck_common::models::CardId;
use flashdeck_player::audio::AudioBackend;
use flashdeck_player::completion::Completion;
use flashdeck_player::speech::{SpeechDevice, Utterance, Voice};
use flashdeck_player::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeAudio {
    pub played: Mutex<Vec<(CardId, String)>>,
    pub prefetched: Mutex<Vec<CardId>>,
    pub silenced: AtomicUsize,
    /// Every `play_once` fails synchronously while set
    pub fail_start: AtomicBool,
    current: Mutex<Option<Completion>>,
}

impl FakeAudio {
    /// Finish the clip in flight; false when nothing is playing
    pub fn finish(&self, outcome: UnitOutcome) -> bool {
        match self.current.lock().unwrap().take() {
            Some(done) => {
                done.finish(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    pub fn played_cards(&self) -> Vec<CardId> {
        self.played.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

impl AudioBackend for FakeAudio {
    fn play_once(&self, card_id: CardId, language: &str, done: Completion) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("fake output disabled".to_string()));
        }
        self.played.lock().unwrap().push((card_id, language.to_string()));
        *self.current.lock().unwrap() = Some(done);
        Ok(())
    }

    fn prefetch(&self, card_id: CardId, _language: &str) {
        self.prefetched.lock().unwrap().push(card_id);
    }

    fn silence(&self) {
        self.silenced.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().take();
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub spoken: Mutex<Vec<Utterance>>,
    pub cancelled: AtomicUsize,
    pub voices: Vec<Voice>,
    current: Mutex<Option<Completion>>,
}

impl FakeSpeech {
    pub fn finish(&self, outcome: UnitOutcome) -> bool {
        match self.current.lock().unwrap().take() {
            Some(done) => {
                done.finish(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    pub fn texts(&self) -> Vec<String> {
        self.spoken.lock().unwrap().iter().map(|u| u.text.clone()).collect()
    }
}

impl SpeechDevice for FakeSpeech {
    fn speak(&self, utterance: Utterance, done: Completion) {
        self.spoken.lock().unwrap().push(utterance);
        *self.current.lock().unwrap() = Some(done);
    }

    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().take();
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }
}
