//! Test helper modules for flashdeck-player integration tests
//!
//! - Fake audio and speech backends that record requests and hold completions
//!   until the test fires them
//! - Engine harness wiring the fakes to a running engine

#![allow(dead_code)]

pub mod fakes;
pub mod harness;

pub use fakes::{FakeAudio, FakeSpeech};
pub use harness::{wait_for, TestEngine};
