//! Speech output device capability and its process-backed implementation
//!
//! Only one utterance may be in flight on a device. `speak` replaces whatever is
//! speaking; `cancel` stops it. Either way the replaced utterance never reports.

use crate::completion::Completion;
use crate::error::{Error, Result};
use flashdeck_common::events::UnitOutcome;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// One synthesized utterance request
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// BCP 47 language tag
    pub language: String,
    /// Multiplier on the device's normal speaking rate
    pub rate: f32,
    /// Specific voice name, when one was selected
    pub voice: Option<String>,
}

/// A voice the device can speak with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub language: String,
}

/// Shared speech output device
pub trait SpeechDevice: Send + Sync {
    /// Speak once; the completion reports natural end or failure
    fn speak(&self, utterance: Utterance, done: Completion);

    /// Stop the current utterance and drop its completion
    fn cancel(&self);

    fn voices(&self) -> Vec<Voice>;

    /// Rough time the device needs for `utterance`
    fn estimated_length(&self, utterance: &Utterance) -> Duration {
        speaking_time(&utterance.text, scaled_wpm(NOMINAL_WPM, utterance.rate))
    }
}

/// Speaking rate assumed for devices that do not know their own
pub const NOMINAL_WPM: u32 = 175;

/// Characters counted as one word for text written without spaces
const CHARS_PER_WORD: usize = 5;

/// Speaking-rate bounds for the speech program, in words per minute
const MIN_WPM: u32 = 80;
const MAX_WPM: u32 = 450;

/// Speech through an external synthesizer process (espeak-ng compatible CLI)
///
/// Each utterance runs `<program> -v <voice|lang> -s <wpm> -- <text>`.
pub struct CommandSpeechDevice {
    program: String,
    words_per_minute: u32,
    voices: Vec<Voice>,
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandSpeechDevice {
    pub fn new(program: impl Into<String>, words_per_minute: u32) -> Self {
        Self {
            program: program.into(),
            words_per_minute,
            voices: Vec::new(),
            current: Mutex::new(None),
        }
    }

    pub fn with_voices(mut self, voices: Vec<Voice>) -> Self {
        self.voices = voices;
        self
    }

    /// Ask the program for its voice list (`<program> --voices`)
    pub async fn discover_voices(&self) -> Result<Vec<Voice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Speech(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(Error::Speech(format!(
                "{} --voices exited with {}",
                self.program, output.status
            )));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Program arguments for an utterance
    pub fn arguments(&self, utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .clone()
            .unwrap_or_else(|| utterance.language.to_lowercase());
        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            scaled_wpm(self.words_per_minute, utterance.rate).to_string(),
            "--".to_string(),
            utterance.text.clone(),
        ]
    }
}

impl SpeechDevice for CommandSpeechDevice {
    fn speak(&self, utterance: Utterance, done: Completion) {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        // Replacing the sender cancels the previous utterance
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel_tx);

        let mut child = match Command::new(&self.program)
            .args(self.arguments(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, "Failed to start speech: {}", e);
                done.finish(UnitOutcome::Failed);
                return;
            }
        };

        let token = done.token();
        debug!(token, language = %utterance.language, "Speaking");

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => done.finish(UnitOutcome::Completed),
                    Ok(status) => {
                        warn!(token, "Speech exited with {}", status);
                        done.finish(UnitOutcome::Failed);
                    }
                    Err(e) => {
                        warn!(token, "Speech failed: {}", e);
                        done.finish(UnitOutcome::Failed);
                    }
                },
                _ = cancel_rx => {
                    let _ = child.kill().await;
                    debug!(token, "Speech cancelled");
                }
            }
        });
    }

    fn cancel(&self) {
        // Dropping the sender wakes the utterance task
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn estimated_length(&self, utterance: &Utterance) -> Duration {
        speaking_time(&utterance.text, scaled_wpm(self.words_per_minute, utterance.rate))
    }
}

/// Base words-per-minute scaled by a rate multiplier
pub fn scaled_wpm(base: u32, rate: f32) -> u32 {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    ((base as f32 * rate).round() as u32).clamp(MIN_WPM, MAX_WPM)
}

/// Time to say `text` at `wpm` words per minute
pub fn speaking_time(text: &str, wpm: u32) -> Duration {
    let spaced = text.split_whitespace().count();
    let dense = text.chars().filter(|c| !c.is_whitespace()).count() / CHARS_PER_WORD;
    let words = spaced.max(dense) as f64;
    Duration::from_secs_f64(words * 60.0 / f64::from(wpm.max(1)))
}

/// Parse `espeak-ng --voices` output
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File          Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US     (en 8)
/// ```
pub fn parse_voice_list(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [_, language, _, name, ..] => Some(Voice {
                    name: (*name).to_string(),
                    language: (*language).to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}
