//! Audio output using cpal
//!
//! A cpal `Stream` is not `Send`, so each [`CpalOutput`] owns a dedicated thread that
//! builds the stream and keeps it alive. The output callback and the player share a
//! small cursor: the clip being played, the frame position, and the completion to
//! report when the clip runs out.

use super::clip::DecodedClip;
use crate::completion::Completion;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use flashdeck_common::events::UnitOutcome;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// A clip the sink refused, with its completion handed back unreported
#[derive(Debug)]
pub struct Rejected {
    pub error: Error,
    pub done: Completion,
}

/// Destination for decoded clips
pub trait ClipSink: Send + Sync {
    /// Rate clips must be resampled to before `start`
    fn sample_rate(&self) -> u32;

    /// Play `clip` from its first frame, replacing whatever was playing
    ///
    /// The replaced clip's completion is dropped without reporting. On refusal the
    /// caller gets `done` back and decides how the unit ends.
    fn start(&self, clip: Arc<DecodedClip>, done: Completion) -> std::result::Result<(), Rejected>;

    /// Stop output and drop the pending completion
    fn stop(&self);

    /// False when no clip can ever be played
    fn is_available(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct Cursor {
    clip: Option<Arc<DecodedClip>>,
    frame: usize,
    done: Option<Completion>,
}

impl Cursor {
    fn clear(&mut self) {
        self.clip = None;
        self.frame = 0;
        self.done = None;
    }
}

/// Audio output on the default (or a named) cpal device
pub struct CpalOutput {
    cursor: Arc<Mutex<Cursor>>,
    sample_rate: u32,
    channels: u16,
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the output device and start a silent stream
    ///
    /// Falls back to the default device when `device_name` is not found.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let cursor = Arc::new(Mutex::new(Cursor::default()));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(u32, u16)>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread_cursor = Arc::clone(&cursor);
        let device_name = device_name.map(str::to_string);

        let thread = std::thread::Builder::new()
            .name("flashdeck-output".to_string())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), thread_cursor) {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Returns when a shutdown is sent or the sender is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output thread exiting");
            })?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Output thread exited during startup".to_string()))??;

        Ok(Self {
            cursor,
            sample_rate,
            channels,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl ClipSink for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&self, clip: Arc<DecodedClip>, done: Completion) -> std::result::Result<(), Rejected> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        cursor.clip = Some(clip);
        cursor.frame = 0;
        cursor.done = Some(done);
        Ok(())
    }

    fn stop(&self) {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Sink used when no output device could be opened
///
/// Every `start` fails synchronously, which makes the sequencer fall back to speech.
#[derive(Debug, Default)]
pub struct UnavailableSink;

impl ClipSink for UnavailableSink {
    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn start(&self, _clip: Arc<DecodedClip>, done: Completion) -> std::result::Result<(), Rejected> {
        Err(Rejected {
            error: Error::AudioOutput("No audio output device available".to_string()),
            done,
        })
    }

    fn stop(&self) {}

    fn is_available(&self) -> bool {
        false
    }
}

fn select_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Using requested audio device: {}", name);
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
    info!(
        "Using default audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

fn open_stream(device_name: Option<&str>, cursor: Arc<Mutex<Cursor>>) -> Result<(Stream, u32, u16)> {
    let device = select_device(device_name)?;

    let supported = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, cursor)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, cursor)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, cursor)?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    Ok((stream, config.sample_rate.0, config.channels))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, cursor: Arc<Mutex<Cursor>>) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);
    let error_cursor = Arc::clone(&cursor);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_buffer(data, channels, &cursor);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                if let Ok(mut cursor) = error_cursor.lock() {
                    cursor.clip = None;
                    if let Some(done) = cursor.done.take() {
                        done.finish(UnitOutcome::Failed);
                    }
                }
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Output callback body: copy the next frames of the current clip, pad with silence
fn fill_buffer<T>(data: &mut [T], channels: usize, cursor: &Mutex<Cursor>)
where
    T: SizedSample + FromSample<f32>,
{
    let silence = T::from_sample(0.0f32);

    // Never block the audio thread
    let Ok(mut guard) = cursor.try_lock() else {
        data.fill(silence);
        return;
    };
    let cursor = &mut *guard;

    for frame in data.chunks_mut(channels) {
        let (left, right) = match &cursor.clip {
            Some(clip) if cursor.frame < clip.frames() => {
                let i = cursor.frame * 2;
                cursor.frame += 1;
                (clip.samples[i], clip.samples[i + 1])
            }
            _ => (0.0, 0.0),
        };

        if channels == 1 {
            frame[0] = T::from_sample(((left + right) * 0.5).clamp(-1.0, 1.0));
            continue;
        }
        for (ch, out) in frame.iter_mut().enumerate() {
            let sample = match ch {
                0 => left,
                1 => right,
                _ => 0.0,
            };
            *out = T::from_sample(sample.clamp(-1.0, 1.0));
        }
    }

    let finished = cursor
        .clip
        .as_ref()
        .is_some_and(|clip| cursor.frame >= clip.frames());
    if finished {
        cursor.clip = None;
        cursor.frame = 0;
        if let Some(done) = cursor.done.take() {
            done.finish(UnitOutcome::Completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fill_buffer_reports_completion_at_end() {
        let cursor = Mutex::new(Cursor::default());
        let (done, mut rx) = Completion::channel(4);
        {
            let mut c = cursor.lock().unwrap();
            c.clip = Some(Arc::new(DecodedClip::new(vec![0.5, -0.5, 0.25, -0.25], 44_100)));
            c.done = Some(done);
        }

        let mut out = [0.0f32; 8];
        fill_buffer(&mut out, 2, &cursor);

        assert_eq!(out, [0.5, -0.5, 0.25, -0.25, 0.0, 0.0, 0.0, 0.0]);
        let report = rx.recv().await.unwrap();
        assert_eq!(report.token, 4);
        assert_eq!(report.outcome, UnitOutcome::Completed);
    }

    #[test]
    fn test_fill_buffer_mono_downmix() {
        let cursor = Mutex::new(Cursor {
            clip: Some(Arc::new(DecodedClip::new(vec![0.4, 0.2], 44_100))),
            ..Cursor::default()
        });

        let mut out = [0i16; 2];
        fill_buffer(&mut out, 1, &cursor);
        assert!(out[0] > 0);
        assert_eq!(out[1], 0);
    }

    #[tokio::test]
    async fn test_unavailable_sink_fails_synchronously() {
        let (done, mut rx) = Completion::channel(1);
        let clip = Arc::new(DecodedClip::new(vec![0.0, 0.0], 44_100));

        let rejected = UnavailableSink.start(clip, done).unwrap_err();
        assert!(matches!(rejected.error, Error::AudioOutput(_)));
        assert_eq!(rejected.done.token(), 1);

        // Nothing reported until the caller decides
        assert!(rx.try_recv().is_err());
        rejected.done.finish(UnitOutcome::Failed);
        assert_eq!(rx.recv().await.unwrap().outcome, UnitOutcome::Failed);
    }
}
