//! Audio decoder using symphonia
//!
//! Decodes a whole pronunciation clip (MP3, FLAC, AAC, Vorbis) to interleaved
//! stereo f32 PCM at the file's own sample rate.

use super::clip::{to_stereo, DecodedClip};
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

pub struct ClipDecoder;

impl ClipDecoder {
    /// Decode an entire file
    ///
    /// # Errors
    /// - File cannot be opened
    /// - Unsupported format or codec
    pub fn decode_file(path: &Path) -> Result<DecodedClip> {
        debug!("Decoding clip: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                    });
                    if buf.capacity() < decoded.capacity() * spec.channels.count() {
                        *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    }
                    buf.copy_interleaved_ref(decoded);
                    samples.extend(to_stereo(buf.samples(), spec.channels.count()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frame: skip it and keep going
                    warn!("Decode error: {}", e);
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decoder failed: {}", e)));
                }
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode(format!("No audio decoded from {}", path.display())));
        }

        let clip = DecodedClip::new(samples, sample_rate);
        debug!(
            "Decoded {} frames at {}Hz ({:.2}s)",
            clip.frames(),
            sample_rate,
            clip.duration().as_secs_f64()
        );
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = ClipDecoder::decode_file(Path::new("/nonexistent/0001_ko-KR.mp3")).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001_ko-KR.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        assert!(ClipDecoder::decode_file(&path).is_err());
    }
}
