//! Decoded audio clip, the cached playable handle

use std::time::Duration;

/// Output channel layout of every decoded clip
pub const CLIP_CHANNELS: usize = 2;

/// Interleaved stereo f32 PCM
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / CLIP_CHANNELS
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Fold interleaved samples with `channels` channels down or up to stereo
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
