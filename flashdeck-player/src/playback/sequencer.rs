//! Playback Sequencer
//!
//! Deterministic state machine that decides, for the current card, which backend
//! plays the term, how often it repeats, whether the description is narrated and
//! when the deck advances.
//!
//! The sequencer never performs I/O. Every transition returns the [`Effect`]s the
//! driver must apply, in order. Backends report back through
//! [`Sequencer::unit_finished`] with the token of the unit they were given; at most
//! one unit is pending at a time, and a completion for any other token is stale.
//!
//! # States
//!
//! - `Idle`: nothing playing (fresh deck, or left)
//! - `PlayingTerm` / `PlayingDescription`: a unit is in flight
//! - `Advancing`: transient while moving to the next position
//! - `Paused`: explicit user pause, position kept for resume

use super::effects::{Effect, PendingUnit, UnitToken};
use super::navigator::Navigator;
use super::repeat::{RepeatController, RepeatDecision};
use super::session::SessionSnapshot;
use flashdeck_common::events::{PlaybackState, UnitKind, UnitOutcome};
use flashdeck_common::models::{Card, Folder};
use flashdeck_common::preferences::{clamp_rate, clamp_repeat_count, Preferences};
use rand::Rng;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct Sequencer {
    deck: Option<Folder>,
    navigator: Navigator,
    position: usize,
    repeat: RepeatController,
    prefs: Preferences,
    state: PlaybackState,
    playing: bool,
    unlocked: bool,
    revealed: bool,
    pending: Option<PendingUnit>,
    last_token: UnitToken,
}

impl Sequencer {
    pub fn new(prefs: Preferences) -> Self {
        let prefs = prefs.normalized();
        Self {
            deck: None,
            navigator: Navigator::default(),
            position: 0,
            repeat: RepeatController::new(prefs.repeat_count),
            prefs,
            state: PlaybackState::Idle,
            playing: false,
            unlocked: false,
            revealed: false,
            pending: None,
            last_token: 0,
        }
    }

    // ---------------------------------------------------------------------
    // Session lifecycle
    // ---------------------------------------------------------------------

    /// Make `folder` the active deck at logical position 0
    ///
    /// Anything in flight for the previous deck is silenced. With `autoplay`, playback
    /// starts immediately once audio has been unlocked.
    pub fn open_folder(&mut self, folder: Folder, autoplay: bool) -> Vec<Effect> {
        self.open_folder_with(folder, autoplay, &mut rand::thread_rng())
    }

    pub fn open_folder_with<R: Rng + ?Sized>(
        &mut self,
        folder: Folder,
        autoplay: bool,
        rng: &mut R,
    ) -> Vec<Effect> {
        debug!(folder_id = folder.id, cards = folder.len(), autoplay, "Opening folder");

        self.navigator.rebuild_with(folder.len(), self.prefs.shuffle, rng);
        self.deck = Some(folder);
        self.position = 0;
        self.revealed = false;
        self.pending = None;
        self.playing = false;
        self.state = PlaybackState::Idle;
        self.repeat.reset(self.prefs.repeat_count);

        if autoplay && self.can_start() {
            self.playing = true;
            return self.enter_current();
        }

        let mut effects = vec![Effect::Silence];
        effects.extend(self.prefetch_current());
        effects
    }

    /// Tear down the session: silence everything and drop the deck
    pub fn leave(&mut self) -> Vec<Effect> {
        self.deck = None;
        self.navigator.rebuild(0, self.prefs.shuffle);
        self.position = 0;
        self.revealed = false;
        self.pending = None;
        self.playing = false;
        self.state = PlaybackState::Idle;
        vec![Effect::Silence]
    }

    /// Record the one-time user gesture that permits audio output
    pub fn unlock(&mut self) -> Vec<Effect> {
        if !self.unlocked {
            debug!("Audio output unlocked");
        }
        self.unlocked = true;
        Vec::new()
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    /// Start or resume playback of the current card from its first repeat
    pub fn play(&mut self) -> Vec<Effect> {
        if self.playing || !self.can_start() {
            return Vec::new();
        }
        self.playing = true;
        self.enter_current()
    }

    /// Stop output and keep the position for resume
    pub fn pause(&mut self) -> Vec<Effect> {
        if self.state == PlaybackState::Paused || self.current_card().is_none() {
            return Vec::new();
        }
        self.playing = false;
        self.pending = None;
        self.state = PlaybackState::Paused;
        vec![Effect::Silence]
    }

    pub fn toggle(&mut self) -> Vec<Effect> {
        if self.playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Restart the current card from its first repeat without moving
    pub fn replay_current(&mut self) -> Vec<Effect> {
        if !self.can_start() {
            return Vec::new();
        }
        self.playing = true;
        self.enter_current()
    }

    pub fn next(&mut self) -> Vec<Effect> {
        match self.navigator.next(self.position) {
            Some(position) => self.move_to(position),
            None => Vec::new(),
        }
    }

    pub fn prev(&mut self) -> Vec<Effect> {
        match self.navigator.prev(self.position) {
            Some(position) => self.move_to(position),
            None => Vec::new(),
        }
    }

    /// Select a logical position directly; out-of-range input is clamped to the last
    pub fn jump_to(&mut self, position: usize) -> Vec<Effect> {
        if self.navigator.is_empty() {
            return Vec::new();
        }
        let position = position.min(self.navigator.len() - 1);
        self.move_to(position)
    }

    /// Toggle the temporary reveal of a hidden term
    pub fn reveal_term(&mut self) -> Vec<Effect> {
        if self.current_card().is_some() {
            self.revealed = !self.revealed;
        }
        Vec::new()
    }

    // ---------------------------------------------------------------------
    // Preferences (take effect on the next unit)
    // ---------------------------------------------------------------------

    pub fn set_shuffle(&mut self, shuffle: bool) -> Vec<Effect> {
        self.set_shuffle_with(shuffle, &mut rand::thread_rng())
    }

    /// Reorder the deck and return to logical position 0
    pub fn set_shuffle_with<R: Rng + ?Sized>(&mut self, shuffle: bool, rng: &mut R) -> Vec<Effect> {
        let changed = self.prefs.shuffle != shuffle;
        self.prefs.shuffle = shuffle;
        let mut effects = vec![Effect::PersistPreferences(self.prefs)];

        if changed {
            self.navigator.reorder_with(shuffle, rng);
            if !self.navigator.is_empty() {
                effects.extend(self.move_to(0));
            }
        }
        effects
    }

    pub fn set_hide_term(&mut self, hide: bool) -> Vec<Effect> {
        self.prefs.hide_term = hide;
        self.revealed = false;
        vec![Effect::PersistPreferences(self.prefs)]
    }

    pub fn set_prefer_audio(&mut self, prefer: bool) -> Vec<Effect> {
        self.prefs.prefer_audio = prefer;
        vec![Effect::PersistPreferences(self.prefs)]
    }

    pub fn set_read_description(&mut self, read: bool) -> Vec<Effect> {
        self.prefs.read_description = read;
        vec![Effect::PersistPreferences(self.prefs)]
    }

    pub fn set_rate(&mut self, rate: f32) -> Vec<Effect> {
        self.prefs.rate = clamp_rate(rate);
        vec![Effect::PersistPreferences(self.prefs)]
    }

    /// New count applies from the next card or resume; the running counter is kept
    pub fn set_repeat_count(&mut self, count: i64) -> Vec<Effect> {
        self.prefs.repeat_count = clamp_repeat_count(count);
        vec![Effect::PersistPreferences(self.prefs)]
    }

    // ---------------------------------------------------------------------
    // Backend completions
    // ---------------------------------------------------------------------

    /// A backend finished the unit identified by `token`
    ///
    /// Every outcome counts as a completed unit; failures degrade to silent repeats.
    pub fn unit_finished(&mut self, token: UnitToken, outcome: UnitOutcome) -> Vec<Effect> {
        let pending = match self.pending {
            Some(pending) if pending.token == token => pending,
            _ => {
                trace!(token, %outcome, "Ignoring stale completion");
                return Vec::new();
            }
        };
        self.pending = None;

        if !self.playing {
            return Vec::new();
        }

        if pending.kind.is_term() {
            match self.repeat.decide() {
                RepeatDecision::Repeat => self.start_term_unit(),
                RepeatDecision::Done => self.after_term(),
            }
        } else {
            self.advance()
        }
    }

    /// The audio backend could not start the clip for `token`
    ///
    /// The same unit is retried through speech; the repeat counter is untouched.
    pub fn audio_start_failed(&mut self, token: UnitToken) -> Vec<Effect> {
        match self.pending {
            Some(pending) if pending.token == token && pending.kind == UnitKind::TermAudio => {
                self.pending = None;
                self.speak_term()
            }
            _ => Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Observation
    // ---------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn pending(&self) -> Option<PendingUnit> {
        self.pending
    }

    pub fn preferences(&self) -> Preferences {
        self.prefs
    }

    pub fn deck(&self) -> Option<&Folder> {
        self.deck.as_ref()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn remaining_repeats(&self) -> u8 {
        self.repeat.remaining()
    }

    /// False while hide-term is on and the current card has not been revealed
    pub fn term_visible(&self) -> bool {
        !self.prefs.hide_term || self.revealed
    }

    pub fn current_card(&self) -> Option<&Card> {
        let deck = self.deck.as_ref()?;
        deck.cards.get(self.navigator.logical_to_real(self.position))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let card = self.current_card();
        SessionSnapshot {
            state: self.state,
            folder_id: self.deck.as_ref().map(|deck| deck.id),
            position: self.position,
            card_id: card.map(|card| card.id),
            term: card.map(|card| card.term.clone()),
            deck_len: self.navigator.len(),
            playing: self.playing,
            unlocked: self.unlocked,
            remaining_repeats: self.repeat.remaining(),
            term_visible: self.term_visible(),
            preferences: self.prefs,
            pending: self.pending,
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn can_start(&self) -> bool {
        self.unlocked && self.current_card().is_some()
    }

    fn next_token(&mut self) -> UnitToken {
        self.last_token += 1;
        self.last_token
    }

    fn folder_language(&self) -> &str {
        self.deck
            .as_ref()
            .map(|deck| deck.language.as_str())
            .unwrap_or(flashdeck_common::models::DEFAULT_LANGUAGE)
    }

    /// Change position; playback follows only while playing
    fn move_to(&mut self, position: usize) -> Vec<Effect> {
        self.position = position;
        self.revealed = false;
        self.repeat.reset(self.prefs.repeat_count);

        if self.playing {
            self.enter_current()
        } else {
            self.prefetch_current()
        }
    }

    /// Silence the previous target and start the first unit for the current card
    fn enter_current(&mut self) -> Vec<Effect> {
        self.pending = None;
        self.repeat.reset(self.prefs.repeat_count);

        let mut effects = vec![Effect::Silence];
        effects.extend(self.start_term_unit());
        effects.extend(self.prefetch_upcoming());
        effects
    }

    fn start_term_unit(&mut self) -> Vec<Effect> {
        let Some(card) = self.current_card() else {
            self.state = PlaybackState::Idle;
            return Vec::new();
        };

        if !self.prefs.prefer_audio {
            return self.speak_term();
        }

        let card_id = card.id;
        let language = card.language(self.folder_language()).to_string();
        let token = self.next_token();

        self.pending = Some(PendingUnit {
            token,
            kind: UnitKind::TermAudio,
            card_id,
        });
        self.state = PlaybackState::PlayingTerm;

        vec![Effect::PlayAudio {
            token,
            card_id,
            language,
        }]
    }

    fn speak_term(&mut self) -> Vec<Effect> {
        let Some(card) = self.current_card() else {
            self.state = PlaybackState::Idle;
            return Vec::new();
        };

        let card_id = card.id;
        let text = card.term.clone();
        let language = card.language(self.folder_language()).to_string();
        let rate = self.prefs.rate * card.rate_multiplier();
        let token = self.next_token();

        self.pending = Some(PendingUnit {
            token,
            kind: UnitKind::TermSpeech,
            card_id,
        });
        self.state = PlaybackState::PlayingTerm;

        vec![Effect::Speak {
            token,
            text,
            language,
            rate,
        }]
    }

    /// Term repeats exhausted: narrate the description or move on
    fn after_term(&mut self) -> Vec<Effect> {
        let description = if self.prefs.read_description {
            self.current_card()
                .and_then(|card| card.narratable_description().map(|text| (card.id, text.to_string())))
        } else {
            None
        };

        let Some((card_id, text)) = description else {
            return self.advance();
        };

        let token = self.next_token();
        self.pending = Some(PendingUnit {
            token,
            kind: UnitKind::Description,
            card_id,
        });
        self.state = PlaybackState::PlayingDescription;

        vec![Effect::SpeakDescription {
            token,
            text,
            rate: self.prefs.rate,
        }]
    }

    fn advance(&mut self) -> Vec<Effect> {
        if !self.playing {
            return Vec::new();
        }
        self.state = PlaybackState::Advancing;

        match self.navigator.next(self.position) {
            Some(position) => {
                self.position = position;
                self.revealed = false;
                self.enter_current()
            }
            None => {
                self.state = PlaybackState::Idle;
                Vec::new()
            }
        }
    }

    fn prefetch_current(&self) -> Vec<Effect> {
        if !self.prefs.prefer_audio {
            return Vec::new();
        }
        self.prefetch_at(self.position).into_iter().collect()
    }

    fn prefetch_upcoming(&self) -> Vec<Effect> {
        if !self.prefs.prefer_audio || self.navigator.len() < 2 {
            return Vec::new();
        }
        self.navigator
            .next(self.position)
            .and_then(|next| self.prefetch_at(next))
            .into_iter()
            .collect()
    }

    fn prefetch_at(&self, position: usize) -> Option<Effect> {
        let deck = self.deck.as_ref()?;
        let card = deck.cards.get(self.navigator.logical_to_real(position))?;
        Some(Effect::Prefetch {
            card_id: card.id,
            language: card.language(&deck.language).to_string(),
        })
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashdeck_common::models::FolderOrigin;

    fn folder(cards: Vec<Card>) -> Folder {
        Folder {
            id: 10_000,
            name: "Test".to_string(),
            language: "ko-KR".to_string(),
            origin: FolderOrigin::Personal,
            cards,
        }
    }

    #[test]
    fn test_play_before_unlock_is_noop() {
        let mut seq = Sequencer::default();
        seq.open_folder(folder(vec![Card::new(1, "사과")]), true);

        assert!(seq.play().is_empty());
        assert!(!seq.is_playing());
        assert_eq!(seq.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_enter_silences_before_first_unit() {
        let mut seq = Sequencer::default();
        seq.unlock();
        let effects = seq.open_folder(folder(vec![Card::new(1, "사과")]), true);

        assert_eq!(effects[0], Effect::Silence);
        assert!(matches!(effects[1], Effect::PlayAudio { card_id: 1, .. }));
        assert_eq!(effects.len(), 2);
        assert_eq!(seq.state(), PlaybackState::PlayingTerm);
    }

    #[test]
    fn test_audio_start_failure_falls_back_to_speech() {
        let mut seq = Sequencer::default();
        seq.unlock();
        seq.open_folder(folder(vec![Card::new(1, "사과")]), true);
        let token = seq.pending().unwrap().token;

        let effects = seq.audio_start_failed(token);
        assert!(matches!(
            &effects[..],
            [Effect::Speak { text, language, .. }] if text == "사과" && language == "ko-KR"
        ));
        assert_eq!(seq.pending().unwrap().kind, UnitKind::TermSpeech);

        // Old token is now stale
        assert!(seq.unit_finished(token, UnitOutcome::Failed).is_empty());
    }

    #[test]
    fn test_speech_rate_combines_session_rate_and_card_hint() {
        let mut seq = Sequencer::new(Preferences {
            prefer_audio: false,
            rate: 1.5,
            ..Preferences::default()
        });
        seq.unlock();
        let effects = seq.open_folder(folder(vec![Card::new(1, "hello").with_speech("en-US", 0.8)]), true);

        let speak = effects.iter().find(|e| matches!(e, Effect::Speak { .. })).unwrap();
        match speak {
            Effect::Speak { rate, language, .. } => {
                assert!((rate - 1.2).abs() < 1e-5);
                assert_eq!(language, "en-US");
            }
            _ => unreachable!(),
        }
    }
}
