//! Clip resampling using rubato
//!
//! Clips are converted once, at decode time, to the sample rate of the output
//! device so the output callback only copies samples.

use super::clip::{DecodedClip, CLIP_CHANNELS};
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

pub struct Resampler;

impl Resampler {
    /// Resample `clip` to `output_rate`; a clip already at that rate is returned as is
    pub fn resample(clip: DecodedClip, output_rate: u32) -> Result<DecodedClip> {
        if clip.sample_rate == output_rate {
            return Ok(clip);
        }
        if clip.is_empty() {
            return Ok(DecodedClip::new(Vec::new(), output_rate));
        }
        if clip.sample_rate == 0 || output_rate == 0 {
            return Err(Error::Decode("Cannot resample with a zero sample rate".to_string()));
        }

        debug!("Resampling clip from {}Hz to {}Hz", clip.sample_rate, output_rate);

        let planar_input = Self::deinterleave(&clip.samples, CLIP_CHANNELS);
        let input_frames = planar_input[0].len();

        let mut resampler = FastFixedIn::<f32>::new(
            f64::from(output_rate) / f64::from(clip.sample_rate),
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            CLIP_CHANNELS,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        Ok(DecodedClip::new(Self::interleave(planar_output), output_rate))
    }

    /// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }
        planar
    }

    /// [[L, L, ...], [R, R, ...]] -> [L, R, L, R, ...]
    fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
        let Some(frames) = planar.first().map(Vec::len) else {
            return Vec::new();
        };
        let mut interleaved = Vec::with_capacity(frames * planar.len());
        for frame_idx in 0..frames {
            for channel in &planar {
                interleaved.push(channel[frame_idx]);
            }
        }
        interleaved
    }
}
