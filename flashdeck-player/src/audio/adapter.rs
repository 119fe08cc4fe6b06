//! Audio Backend Adapter
//!
//! Plays a card's recorded clip once and reports exactly one completion. Decoded
//! clips are cached by resource locator, so repeats of the same card and cards
//! warmed by `prefetch` start without decoding again. A play request for a clip that
//! is still being prefetched waits for that load instead of decoding twice.
//!
//! A missing or undecodable file is not an error for the caller: the unit finishes
//! with `UnitOutcome::Failed` and the sequencer moves on. So does a clip the sink
//! refuses after loading. Only an unusable output device fails `play_once`
//! synchronously.

use super::clip::DecodedClip;
use super::decoder::ClipDecoder;
use super::locator::ResourceLocator;
use super::output::ClipSink;
use super::resampler::Resampler;
use crate::completion::Completion;
use crate::error::{Error, Result};
use flashdeck_common::events::UnitOutcome;
use flashdeck_common::models::CardId;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Decoded clips kept before unused entries are evicted
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// The audio side of the sequencer's backend contract
pub trait AudioBackend: Send + Sync {
    /// Start playing the clip for `card_id` in `language` from the beginning
    ///
    /// Returns `Err` only when playback cannot start at all.
    fn play_once(&self, card_id: CardId, language: &str, done: Completion) -> Result<()>;

    /// Decode and cache a clip without playing it
    fn prefetch(&self, card_id: CardId, language: &str);

    /// Stop output and drop every pending completion
    fn silence(&self);
}

/// Loads a clip ready for a sink running at `output_rate` (blocking)
pub trait ClipLoader: Send + Sync + 'static {
    fn load(&self, path: &Path, output_rate: u32) -> Result<DecodedClip>;
}

/// Decodes with symphonia and resamples with rubato
#[derive(Debug, Default, Clone, Copy)]
pub struct FileClipLoader;

impl ClipLoader for FileClipLoader {
    fn load(&self, path: &Path, output_rate: u32) -> Result<DecodedClip> {
        let clip = ClipDecoder::decode_file(path)?;
        Resampler::resample(clip, output_rate)
    }
}

struct CachedClip {
    clip: Arc<DecodedClip>,
    last_used: u64,
}

/// Play request parked until the load of its clip finishes
struct Waiting {
    card_id: CardId,
    path: PathBuf,
    generation: u64,
    done: Completion,
}

struct ClipCache {
    clips: HashMap<PathBuf, CachedClip>,
    loading: HashSet<PathBuf>,
    waiting: Option<Waiting>,
    capacity: usize,
    tick: u64,
}

impl ClipCache {
    fn new(capacity: usize) -> Self {
        Self {
            clips: HashMap::new(),
            loading: HashSet::new(),
            waiting: None,
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Cached handle, marked as just used
    fn get(&mut self, path: &Path) -> Option<Arc<DecodedClip>> {
        let tick = self.next_tick();
        self.clips.get_mut(path).map(|entry| {
            entry.last_used = tick;
            Arc::clone(&entry.clip)
        })
    }

    /// Insert unless present; existing handles are never replaced
    fn insert_if_absent(&mut self, path: PathBuf, clip: DecodedClip) -> Arc<DecodedClip> {
        if let Some(existing) = self.get(&path) {
            return existing;
        }
        if self.clips.len() >= self.capacity {
            self.evict_one();
        }
        let clip = Arc::new(clip);
        let last_used = self.next_tick();
        self.clips.insert(
            path,
            CachedClip {
                clip: Arc::clone(&clip),
                last_used,
            },
        );
        clip
    }

    /// Drop the least recently used handle nobody else holds (not playing)
    fn evict_one(&mut self) {
        let victim = self
            .clips
            .iter()
            .filter(|(_, entry)| Arc::strong_count(&entry.clip) == 1)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(path, _)| path.clone());
        if let Some(path) = victim {
            self.clips.remove(&path);
        }
    }

    /// The parked request for `path`, if any
    fn take_waiting(&mut self, path: &Path) -> Option<Waiting> {
        if self.waiting.as_ref().is_some_and(|w| w.path == path) {
            self.waiting.take()
        } else {
            None
        }
    }
}

/// Audio Backend Adapter over a clip loader and an output sink
pub struct AudioAdapter<L: ClipLoader = FileClipLoader> {
    locator: ResourceLocator,
    shared: Arc<Shared<L>>,
}

struct Shared<L> {
    loader: L,
    sink: Arc<dyn ClipSink>,
    cache: Mutex<ClipCache>,
    /// Bumped by every play/silence; requests parked under older values are dropped.
    /// Held while handing a loaded clip to the sink so a silence cannot interleave.
    /// Always locked before `cache`.
    generation: Mutex<u64>,
}

impl<L> Shared<L> {
    fn lock_cache(&self) -> MutexGuard<'_, ClipCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a loaded clip; a refusal finishes the unit as failed
    fn deliver(&self, card_id: CardId, clip: Arc<DecodedClip>, done: Completion) {
        done.report_length(clip.duration());
        if let Err(rejected) = self.sink.start(clip, done) {
            warn!(card_id, "Clip output failed: {}", rejected.error);
            rejected.done.finish(UnitOutcome::Failed);
        }
    }
}

impl<L: ClipLoader> Shared<L> {
    /// Blocking load into the cache, then hand the clip to a parked request
    fn load(&self, card_id: CardId, path: PathBuf) {
        let loaded = self.loader.load(&path, self.sink.sample_rate());

        let generation = self.lock_generation();
        let (clip, waiting) = {
            let mut cache = self.lock_cache();
            cache.loading.remove(&path);
            let clip = loaded.map(|clip| cache.insert_if_absent(path.clone(), clip));
            (clip, cache.take_waiting(&path))
        };

        let Some(waiting) = waiting.filter(|w| w.generation == *generation) else {
            if let Err(e) = clip {
                debug!(card_id, "Clip load skipped: {}", e);
            }
            return;
        };

        match clip {
            Ok(clip) => self.deliver(waiting.card_id, clip, waiting.done),
            Err(e) => {
                warn!(card_id, path = %path.display(), "Clip unavailable: {}", e);
                waiting.done.finish(UnitOutcome::Failed);
            }
        }
    }
}

impl AudioAdapter<FileClipLoader> {
    pub fn new(locator: ResourceLocator, sink: Arc<dyn ClipSink>) -> Self {
        Self::with_loader(locator, FileClipLoader, sink, DEFAULT_CACHE_CAPACITY)
    }
}

impl<L: ClipLoader> AudioAdapter<L> {
    pub fn with_loader(
        locator: ResourceLocator,
        loader: L,
        sink: Arc<dyn ClipSink>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            locator,
            shared: Arc::new(Shared {
                loader,
                sink,
                cache: Mutex::new(ClipCache::new(cache_capacity)),
                generation: Mutex::new(0),
            }),
        }
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Whether a decoded clip is cached for the card
    pub fn is_cached(&self, card_id: CardId, language: &str) -> bool {
        let path = self.locator.resolve(card_id, language);
        self.shared.lock_cache().clips.contains_key(&path)
    }

    pub fn cached_len(&self) -> usize {
        self.shared.lock_cache().clips.len()
    }

    fn spawn_load(&self, card_id: CardId, path: PathBuf) {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.load(card_id, path));
    }
}

impl<L: ClipLoader> AudioBackend for AudioAdapter<L> {
    fn play_once(&self, card_id: CardId, language: &str, done: Completion) -> Result<()> {
        let shared = &self.shared;
        if !shared.sink.is_available() {
            return Err(Error::AudioOutput("No audio output device available".to_string()));
        }

        let path = self.locator.resolve(card_id, language);
        let mut generation = shared.lock_generation();
        *generation += 1;
        // One clip at a time: whatever played before loses its completion
        shared.sink.stop();

        let mut cache = shared.lock_cache();
        cache.waiting = None;

        if let Some(clip) = cache.get(&path) {
            drop(cache);
            debug!(card_id, path = %path.display(), token = done.token(), "Playing cached clip");
            done.report_length(clip.duration());
            return shared.sink.start(clip, done).map_err(|rejected| rejected.error);
        }

        let in_flight = !cache.loading.insert(path.clone());
        cache.waiting = Some(Waiting {
            card_id,
            path: path.clone(),
            generation: *generation,
            done,
        });
        drop(cache);
        drop(generation);

        if in_flight {
            debug!(card_id, path = %path.display(), "Waiting for clip already loading");
        } else {
            debug!(card_id, path = %path.display(), "Loading clip for playback");
            self.spawn_load(card_id, path);
        }
        Ok(())
    }

    fn prefetch(&self, card_id: CardId, language: &str) {
        let path = self.locator.resolve(card_id, language);
        {
            let mut cache = self.shared.lock_cache();
            if cache.clips.contains_key(&path) || !cache.loading.insert(path.clone()) {
                return;
            }
        }
        self.spawn_load(card_id, path);
    }

    fn silence(&self) {
        let mut generation = self.shared.lock_generation();
        *generation += 1;
        self.shared.sink.stop();
        self.shared.lock_cache().waiting = None;
    }
}
