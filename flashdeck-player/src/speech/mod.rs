//! Synthesized speech: device capability and the backend adapter

pub mod adapter;
pub mod device;

pub use adapter::{SpeechAdapter, DEFAULT_DESCRIPTION_LANGUAGE};
pub use device::{CommandSpeechDevice, SpeechDevice, Utterance, Voice};
