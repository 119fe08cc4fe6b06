//! Personal folder persistence tests (file-backed database in a temp dir)

use flashdeck_common::catalog::{CardDraft, PERSONAL_FOLDER_ID_BASE};
use flashdeck_common::db::init_database;
use flashdeck_common::models::{FolderOrigin, SpeechHint};
use flashdeck_player::db::folders;
use flashdeck_player::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("flashdeck.db")).await.unwrap();
    (pool, dir)
}

fn draft(term: &str) -> CardDraft {
    CardDraft {
        term: term.to_string(),
        description: None,
        image: None,
        speech: None,
    }
}

#[tokio::test]
async fn test_create_folder_and_add_cards() {
    let (db, _dir) = setup().await;

    let folder_id = folders::create_folder(&db, "  My words ", "ko-KR").await.unwrap();
    assert!(folder_id >= PERSONAL_FOLDER_ID_BASE);

    let first = folders::add_card(&db, folder_id, &draft("사과")).await.unwrap();
    let second = folders::add_card(
        &db,
        folder_id,
        &CardDraft {
            description: Some("banana".to_string()),
            speech: Some(SpeechHint {
                language: "ko-KR".to_string(),
                rate: 0.8,
            }),
            ..draft("바나나")
        },
    )
    .await
    .unwrap();
    assert!(second > first);

    let listed = folders::list_personal_folders(&db).await.unwrap();
    assert_eq!(listed.len(), 1);
    let folder = &listed[0];
    assert_eq!(folder.name, "My words");
    assert_eq!(folder.origin, FolderOrigin::Personal);
    assert_eq!(folder.cards.len(), 2);
    assert_eq!(folder.cards[0].term, "사과");
    assert_eq!(folder.cards[1].description.as_deref(), Some("banana"));
    assert!((folder.cards[1].rate_multiplier() - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn test_rename_update_and_delete() {
    let (db, _dir) = setup().await;
    let folder_id = folders::create_folder(&db, "Old", "ko-KR").await.unwrap();
    let card_id = folders::add_card(&db, folder_id, &draft("사과")).await.unwrap();

    folders::rename_folder(&db, folder_id, "New").await.unwrap();
    folders::update_card(&db, card_id, &draft("포도")).await.unwrap();

    let listed = folders::list_personal_folders(&db).await.unwrap();
    assert_eq!(listed[0].name, "New");
    assert_eq!(listed[0].cards[0].term, "포도");
    assert_eq!(listed[0].cards[0].id, card_id);

    folders::delete_card(&db, card_id).await.unwrap();
    assert!(folders::list_personal_folders(&db).await.unwrap()[0].cards.is_empty());

    folders::delete_folder(&db, folder_id).await.unwrap();
    assert!(folders::list_personal_folders(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_rejected() {
    let (db, _dir) = setup().await;

    assert!(matches!(
        folders::create_folder(&db, "   ", "ko-KR").await,
        Err(Error::InvalidInput(_))
    ));

    let folder_id = folders::create_folder(&db, "Words", "ko-KR").await.unwrap();
    assert!(matches!(
        folders::add_card(&db, folder_id, &draft(" ")).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        folders::add_card(&db, folder_id + 1, &draft("사과")).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        folders::rename_folder(&db, folder_id + 1, "x").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(folders::delete_card(&db, 42).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_export_then_import_copies_folders() {
    let (db, _dir) = setup().await;
    let folder_id = folders::create_folder(&db, "Fruit", "ko-KR").await.unwrap();
    folders::add_card(&db, folder_id, &draft("사과")).await.unwrap();
    folders::add_card(&db, folder_id, &draft("바나나")).await.unwrap();

    let json = folders::export_personal_json(&db).await.unwrap();
    assert!(json.contains("\"version\": 1"));

    let (other, _other_dir) = setup().await;
    let ids = folders::import_personal_json(&other, &json).await.unwrap();
    assert_eq!(ids.len(), 1);

    let imported = folders::list_personal_folders(&other).await.unwrap();
    assert_eq!(imported[0].name, "Fruit");
    let terms: Vec<&str> = imported[0].cards.iter().map(|c| c.term.as_str()).collect();
    assert_eq!(terms, vec!["사과", "바나나"]);
}

#[tokio::test]
async fn test_malformed_import_leaves_existing_folders_untouched() {
    let (db, _dir) = setup().await;
    let folder_id = folders::create_folder(&db, "Keep", "ko-KR").await.unwrap();
    folders::add_card(&db, folder_id, &draft("사과")).await.unwrap();
    let before = folders::list_personal_folders(&db).await.unwrap();

    let bad = r#"{
        "version": 1,
        "folders": [
            {"name": "Good", "cards": [{"term": "포도"}]},
            {"name": "Bad", "cards": [{"term": "  "}]}
        ]
    }"#;
    let err = folders::import_personal_json(&db, bad).await.unwrap_err();
    assert!(err.to_string().contains("Bad"), "message should name the folder: {}", err);

    assert!(folders::import_personal_json(&db, "not json").await.is_err());
    assert!(folders::import_personal_json(&db, r#"{"version": 99, "folders": []}"#).await.is_err());

    assert_eq!(folders::list_personal_folders(&db).await.unwrap(), before);
}
