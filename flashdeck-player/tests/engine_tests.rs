//! Engine integration tests against fake audio and speech backends

mod helpers;

use flashdeck_common::db::init_schema;
use flashdeck_common::events::{FlashdeckEvent, PlaybackState, UnitKind, UnitOutcome};
use flashdeck_common::models::{Card, Folder, FolderOrigin};
use flashdeck_common::preferences::Preferences;
use flashdeck_player::db::settings::load_preferences;
use helpers::TestEngine;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn fruit() -> Folder {
    Folder {
        id: 10_000,
        name: "Fruit".to_string(),
        language: "ko-KR".to_string(),
        origin: FolderOrigin::Catalog {
            source: "test".to_string(),
        },
        cards: vec![
            Card::new(1, "사과").with_description("apple"),
            Card::new(2, "바나나").with_description("banana"),
        ],
    }
}

fn prefs(repeat_count: u8) -> Preferences {
    Preferences {
        repeat_count,
        ..Preferences::default()
    }
}

fn is_unit_started(event: &FlashdeckEvent, card: u32, unit: UnitKind) -> bool {
    matches!(event, FlashdeckEvent::UnitStarted { card_id, kind, .. } if *card_id == card && *kind == unit)
}

#[tokio::test]
async fn test_autoplay_plays_audio_and_advances() {
    let mut t = TestEngine::start(prefs(1), None);
    t.handle.unlock().unwrap();
    t.handle.open_folder(fruit(), true).unwrap();

    let loaded = t
        .expect_event(|e| matches!(e, FlashdeckEvent::DeckLoaded { .. }))
        .await;
    assert!(matches!(loaded, FlashdeckEvent::DeckLoaded { card_count: 2, .. }));

    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermAudio)).await;
    assert!(t.audio.finish(UnitOutcome::Completed));

    t.expect_event(|e| matches!(e, FlashdeckEvent::UnitFinished { card_id: 1, outcome: UnitOutcome::Completed, .. }))
        .await;
    t.expect_event(|e| is_unit_started(e, 2, UnitKind::TermAudio)).await;
    t.expect_event(|e| matches!(e, FlashdeckEvent::CurrentCardChanged { card_id: 2, .. }))
        .await;

    assert_eq!(t.audio.played_cards(), vec![1, 2]);
    let snapshot = t.handle.snapshot().await;
    assert_eq!(snapshot.position, 1);
    assert_eq!(snapshot.state, PlaybackState::PlayingTerm);

    t.shutdown().await;
}

#[tokio::test]
async fn test_open_without_unlock_does_not_play() {
    let mut t = TestEngine::start(prefs(1), None);
    t.handle.open_folder(fruit(), true).unwrap();

    t.expect_event(|e| matches!(e, FlashdeckEvent::CurrentCardChanged { card_id: 1, .. }))
        .await;
    let snapshot = t.handle.snapshot().await;
    assert!(!snapshot.playing);
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(t.audio.played_cards().is_empty());
    assert!(t.speech.texts().is_empty());

    t.shutdown().await;
}

#[tokio::test]
async fn test_audio_start_failure_falls_back_to_speech() {
    let mut t = TestEngine::start(prefs(1), None);
    t.audio.fail_start.store(true, Ordering::SeqCst);
    t.handle.unlock().unwrap();
    t.handle.open_folder(fruit(), true).unwrap();

    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermSpeech)).await;
    {
        let spoken = t.speech.spoken.lock().unwrap();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].text, "사과");
        assert_eq!(spoken[0].language, "ko-KR");
    }

    assert!(t.speech.finish(UnitOutcome::Completed));
    t.expect_event(|e| is_unit_started(e, 2, UnitKind::TermSpeech)).await;
    assert_eq!(t.speech.texts(), vec!["사과", "바나나"]);

    t.shutdown().await;
}

#[tokio::test]
async fn test_failed_units_still_count_as_repeats() {
    let mut t = TestEngine::start(prefs(2), None);
    t.handle.unlock().unwrap();
    t.handle.open_folder(fruit(), true).unwrap();

    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermAudio)).await;
    assert!(t.audio.finish(UnitOutcome::Failed));
    t.expect_event(|e| matches!(e, FlashdeckEvent::UnitFinished { outcome: UnitOutcome::Failed, .. }))
        .await;
    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermAudio)).await;
    assert!(t.audio.finish(UnitOutcome::Failed));
    t.expect_event(|e| is_unit_started(e, 2, UnitKind::TermAudio)).await;

    assert_eq!(t.audio.played_cards(), vec![1, 1, 2]);
    t.shutdown().await;
}

#[tokio::test]
async fn test_watchdog_forces_timeout_and_advances() {
    let mut t = TestEngine::start(prefs(1), Some(Duration::from_millis(50)));
    t.handle.unlock().unwrap();
    t.handle.open_folder(fruit(), true).unwrap();

    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermAudio)).await;
    // The fake never finishes on its own

    let intervention = t
        .expect_event(|e| matches!(e, FlashdeckEvent::WatchdogIntervention { .. }))
        .await;
    match intervention {
        FlashdeckEvent::WatchdogIntervention { card_id, waited_ms, .. } => {
            assert_eq!(card_id, 1);
            assert!(waited_ms >= 50);
        }
        other => panic!("unexpected event {:?}", other),
    }

    t.expect_event(|e| matches!(e, FlashdeckEvent::UnitFinished { card_id: 1, outcome: UnitOutcome::TimedOut, .. }))
        .await;
    t.expect_event(|e| is_unit_started(e, 2, UnitKind::TermAudio)).await;
    assert_eq!(t.state.get_watchdog_interventions(), 1);

    t.shutdown().await;
}

#[tokio::test]
async fn test_long_utterance_outlives_stall_timeout() {
    let long_description = vec!["word"; 50].join(" ");
    let deck = Folder {
        cards: vec![
            Card::new(1, "사과").with_description(long_description.as_str()),
            Card::new(2, "바나나"),
        ],
        ..fruit()
    };
    let mut t = TestEngine::start(
        Preferences {
            prefer_audio: false,
            read_description: true,
            rate: 0.5,
            ..prefs(1)
        },
        Some(Duration::from_millis(50)),
    );
    t.handle.unlock().unwrap();
    t.handle.open_folder(deck, true).unwrap();

    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermSpeech)).await;
    assert!(t.speech.finish(UnitOutcome::Completed));
    t.expect_event(|e| is_unit_started(e, 1, UnitKind::Description)).await;

    // Far past the stall timeout, well within the time 50 slow words take
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(t.state.get_watchdog_interventions(), 0);
    assert!(t.speech.is_speaking(), "narration must not be cut off");

    assert!(t.speech.finish(UnitOutcome::Completed));
    t.expect_event(|e| matches!(e, FlashdeckEvent::UnitFinished { card_id: 1, outcome: UnitOutcome::Completed, .. }))
        .await;
    t.expect_event(|e| is_unit_started(e, 2, UnitKind::TermSpeech)).await;

    t.shutdown().await;
}

#[tokio::test]
async fn test_pause_silences_and_resume_restarts_card() {
    let mut t = TestEngine::start(prefs(3), None);
    t.handle.unlock().unwrap();
    t.handle.open_folder(fruit(), true).unwrap();
    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermAudio)).await;

    assert!(t.audio.finish(UnitOutcome::Completed));
    t.expect_event(|e| matches!(e, FlashdeckEvent::UnitFinished { .. })).await;

    t.handle.pause().unwrap();
    t.expect_event(|e| {
        matches!(e, FlashdeckEvent::PlaybackStateChanged { new_state: PlaybackState::Paused, .. })
    })
    .await;
    assert!(!t.audio.is_playing());
    let snapshot = t.handle.snapshot().await;
    assert!(snapshot.pending.is_none());
    assert_eq!(snapshot.remaining_repeats, 2);

    t.handle.play().unwrap();
    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermAudio)).await;
    t.expect_event(|e| {
        matches!(e, FlashdeckEvent::PlaybackStateChanged { new_state: PlaybackState::PlayingTerm, .. })
    })
    .await;
    assert_eq!(t.handle.snapshot().await.remaining_repeats, 3);

    t.shutdown().await;
}

#[tokio::test]
async fn test_description_narrated_in_description_language() {
    let mut t = TestEngine::start(
        Preferences {
            prefer_audio: false,
            read_description: true,
            ..prefs(1)
        },
        None,
    );
    t.handle.unlock().unwrap();
    t.handle.open_folder(fruit(), true).unwrap();

    t.expect_event(|e| is_unit_started(e, 1, UnitKind::TermSpeech)).await;
    assert!(t.speech.finish(UnitOutcome::Completed));
    t.expect_event(|e| is_unit_started(e, 1, UnitKind::Description)).await;

    {
        let spoken = t.speech.spoken.lock().unwrap();
        let last = spoken.last().unwrap();
        assert_eq!(last.text, "apple");
        assert_eq!(last.language, "en-US");
    }

    assert!(t.speech.finish(UnitOutcome::Completed));
    t.expect_event(|e| is_unit_started(e, 2, UnitKind::TermSpeech)).await;

    t.shutdown().await;
}

#[tokio::test]
async fn test_hidden_term_revealed_on_request() {
    let mut t = TestEngine::start(
        Preferences {
            hide_term: true,
            ..prefs(1)
        },
        None,
    );
    t.handle.open_folder(fruit(), false).unwrap();

    t.expect_event(|e| matches!(e, FlashdeckEvent::CurrentCardChanged { term_visible: false, .. }))
        .await;

    t.handle.reveal_term().unwrap();
    t.expect_event(|e| matches!(e, FlashdeckEvent::CurrentCardChanged { term_visible: true, .. }))
        .await;

    t.shutdown().await;
}

#[tokio::test]
async fn test_preference_changes_are_persisted() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();

    let mut t = TestEngine::start_with_db(Preferences::default(), None, Some(pool.clone()));

    t.handle.set_rate(1.5).unwrap();
    t.expect_event(|e| matches!(e, FlashdeckEvent::PreferencesChanged { .. }))
        .await;
    t.handle.set_repeat_count(9).unwrap();
    let changed = t
        .expect_event(|e| matches!(e, FlashdeckEvent::PreferencesChanged { .. }))
        .await;
    assert!(matches!(
        changed,
        FlashdeckEvent::PreferencesChanged { preferences, .. } if preferences.repeat_count == 5
    ));

    let stored = load_preferences(&pool).await.unwrap();
    assert_eq!(stored.rate, 1.5);
    assert_eq!(stored.repeat_count, 5);

    t.shutdown().await;
}

#[tokio::test]
async fn test_next_while_idle_moves_without_playing() {
    let mut t = TestEngine::start(prefs(1), None);
    t.handle.open_folder(fruit(), false).unwrap();
    t.expect_event(|e| matches!(e, FlashdeckEvent::CurrentCardChanged { card_id: 1, .. }))
        .await;

    t.handle.next().unwrap();
    t.expect_event(|e| matches!(e, FlashdeckEvent::CurrentCardChanged { card_id: 2, position: 1, .. }))
        .await;

    assert!(t.audio.played_cards().is_empty());
    assert!(t.audio.prefetched.lock().unwrap().contains(&2));

    t.shutdown().await;
}
