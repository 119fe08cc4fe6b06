//! # Flashdeck Player Library (flashdeck-player)
//!
//! Flashcard playback: for each card, play its recorded clip or fall back to
//! synthesized speech, repeat it, optionally narrate its description, then advance.
//!
//! **Architecture:** a pure [`playback::Sequencer`] state machine driven by the
//! asynchronous [`playback::Engine`], which talks to the audio backend
//! (symphonia + rubato + cpal) and the speech backend (a speech synthesis process).

pub mod audio;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod speech;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
