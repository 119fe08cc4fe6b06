//! Speech Backend Adapter
//!
//! Wraps the shared speech device with the sequencer's "speak once, report once"
//! contract. Every request cancels whatever the device was saying first. Blank
//! text completes immediately without producing audio.

use super::device::{SpeechDevice, Utterance, Voice};
use crate::completion::Completion;
use flashdeck_common::events::UnitOutcome;
use std::sync::Arc;
use tracing::debug;

/// Language descriptions are narrated in when none is configured
pub const DEFAULT_DESCRIPTION_LANGUAGE: &str = "en-US";

pub struct SpeechAdapter {
    device: Arc<dyn SpeechDevice>,
    description_language: String,
}

impl SpeechAdapter {
    pub fn new(device: Arc<dyn SpeechDevice>, description_language: impl Into<String>) -> Self {
        Self {
            device,
            description_language: description_language.into(),
        }
    }

    pub fn description_language(&self) -> &str {
        &self.description_language
    }

    /// Speak `text` once in `language`
    pub fn speak_once(&self, text: &str, language: &str, rate: f32, done: Completion) {
        self.device.cancel();
        if text.trim().is_empty() {
            debug!(token = done.token(), "Blank utterance completes immediately");
            done.finish(UnitOutcome::Completed);
            return;
        }

        self.speak(
            Utterance {
                text: text.to_string(),
                language: language.to_string(),
                rate,
                voice: None,
            },
            done,
        );
    }

    /// Narrate a description in the fixed description language
    ///
    /// A voice matching that language is used when the device offers one.
    pub fn speak_description(&self, text: &str, rate: f32, done: Completion) {
        self.device.cancel();
        if text.trim().is_empty() {
            done.finish(UnitOutcome::Completed);
            return;
        }

        let voice = matching_voice(&self.device.voices(), &self.description_language)
            .map(|voice| voice.name.clone());

        self.speak(
            Utterance {
                text: text.to_string(),
                language: self.description_language.clone(),
                rate,
                voice,
            },
            done,
        );
    }

    fn speak(&self, utterance: Utterance, done: Completion) {
        done.report_length(self.device.estimated_length(&utterance));
        self.device.speak(utterance, done);
    }

    pub fn cancel(&self) {
        self.device.cancel();
    }
}

/// Exact language tag match first, then the same primary language
pub fn matching_voice<'a>(voices: &'a [Voice], language: &str) -> Option<&'a Voice> {
    let primary = |tag: &str| tag.split(['-', '_']).next().unwrap_or("").to_ascii_lowercase();
    let wanted = primary(language);

    voices
        .iter()
        .find(|voice| voice.language.eq_ignore_ascii_case(language))
        .or_else(|| voices.iter().find(|voice| primary(&voice.language) == wanted))
}
