//! Recorded-audio playback: decode, resample, output, and the backend adapter

pub mod adapter;
pub mod clip;
pub mod decoder;
pub mod locator;
pub mod output;
pub mod resampler;

pub use adapter::{AudioAdapter, AudioBackend, ClipLoader, FileClipLoader};
pub use clip::DecodedClip;
pub use locator::ResourceLocator;
pub use output::{ClipSink, CpalOutput, Rejected, UnavailableSink};
