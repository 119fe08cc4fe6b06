//! Catalog loading: per-source isolation, cache fallback, sample fallback

use flashdeck_common::catalog::{
    source_folder_id_base, MAX_CATALOG_SOURCES, PERSONAL_FOLDER_ID_BASE, SAMPLE_FOLDER_ID,
};
use flashdeck_common::db::init_database;
use flashdeck_common::models::FolderOrigin;
use flashdeck_player::catalog::{CatalogLoader, CatalogSource, SourceLocation};
use flashdeck_player::db::{catalog_cache, folders};
use sqlx::SqlitePool;
use std::path::Path;
use tempfile::TempDir;

const ROWS: &str = r#"[
    {"folder": "Fruit", "id": 1, "term": "사과", "description": "apple"},
    {"folder": "Fruit", "id": "2", "term": "바나나"},
    {"folder": "Colors", "id": 3, "term": "red", "lang": "en-US", "rate": "0.9"},
    {"folder": "Fruit", "term": "no id"},
    {"folder": "", "id": 5, "term": "no folder"}
]"#;

async fn setup() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("flashdeck.db")).await.unwrap();
    (pool, dir)
}

fn file_source(name: &str, path: &Path) -> CatalogSource {
    CatalogSource {
        name: name.to_string(),
        location: SourceLocation::File(path.to_path_buf()),
    }
}

#[tokio::test]
async fn test_file_source_grouped_into_folders() {
    let (db, dir) = setup().await;
    let path = dir.path().join("basic.json");
    std::fs::write(&path, ROWS).unwrap();

    let loader = CatalogLoader::new(db.clone(), "ko-KR").unwrap();
    let catalog = loader.load(&[file_source("basic", &path)]).await.unwrap();

    let folders = catalog.folders();
    assert_eq!(folders.len(), 2);
    assert_eq!(folders[0].name, "Fruit");
    assert_eq!(folders[0].id, source_folder_id_base(0).unwrap());
    assert_eq!(folders[0].cards.len(), 2);
    assert_eq!(folders[1].name, "Colors");
    assert_eq!(folders[1].language, "en-US");
    assert_eq!(
        folders[0].origin,
        FolderOrigin::Catalog {
            source: "basic".to_string()
        }
    );

    // Successful fetch refreshed the cache
    let cached = catalog_cache::get_cached_payload(&db, "basic").await.unwrap();
    assert_eq!(cached.unwrap().payload, ROWS);
}

#[tokio::test]
async fn test_failing_source_does_not_block_others() {
    let (db, dir) = setup().await;
    let good = dir.path().join("good.json");
    std::fs::write(&good, ROWS).unwrap();

    let sources = [
        file_source("missing", &dir.path().join("missing.json")),
        file_source("good", &good),
    ];
    let catalog = CatalogLoader::new(db, "ko-KR").unwrap().load(&sources).await.unwrap();

    assert_eq!(catalog.folders().len(), 2);
    // Second source keeps its own identity range
    assert_eq!(catalog.folders()[0].id, source_folder_id_base(1).unwrap());
}

#[tokio::test]
async fn test_failed_fetch_falls_back_to_cache() {
    let (db, dir) = setup().await;
    catalog_cache::put_cached_payload(&db, "basic", ROWS).await.unwrap();

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let catalog = CatalogLoader::new(db.clone(), "ko-KR")
        .unwrap()
        .load(&[file_source("basic", &path)])
        .await
        .unwrap();

    assert_eq!(catalog.folders().len(), 2);
    assert_eq!(catalog.folders()[0].name, "Fruit");

    // A broken payload never replaces a good cache entry
    let cached = catalog_cache::get_cached_payload(&db, "basic").await.unwrap().unwrap();
    assert_eq!(cached.payload, ROWS);
}

#[tokio::test]
async fn test_nothing_loaded_uses_sample_folder() {
    let (db, dir) = setup().await;
    let catalog = CatalogLoader::new(db, "ko-KR")
        .unwrap()
        .load(&[file_source("missing", &dir.path().join("missing.json"))])
        .await
        .unwrap();

    assert_eq!(catalog.folders().len(), 1);
    assert_eq!(catalog.folders()[0].id, SAMPLE_FOLDER_ID);
    assert!(catalog.first_playable().is_some());
}

#[tokio::test]
async fn test_personal_folders_follow_catalog_folders() {
    let (db, _dir) = setup().await;
    let folder_id = folders::create_folder(&db, "Mine", "ko-KR").await.unwrap();

    let catalog = CatalogLoader::new(db, "ko-KR").unwrap().load(&[]).await.unwrap();

    let ids: Vec<u32> = catalog.folders().iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![SAMPLE_FOLDER_ID, folder_id]);
    assert!(!catalog.find(folder_id).unwrap().is_read_only());
    // The personal folder is empty, so the sample stays the first playable one
    assert_eq!(catalog.first_playable().unwrap().id, SAMPLE_FOLDER_ID);
}

#[tokio::test]
async fn test_sources_past_the_identity_limit_are_skipped() {
    let (db, dir) = setup().await;
    let good = dir.path().join("good.json");
    std::fs::write(&good, ROWS).unwrap();

    // Every source within the limit is missing; only the one past it has rows
    let mut sources: Vec<CatalogSource> = (0..MAX_CATALOG_SOURCES)
        .map(|i| file_source(&format!("missing{}", i), &dir.path().join("missing.json")))
        .collect();
    sources.push(file_source("overflow", &good));

    let catalog = CatalogLoader::new(db.clone(), "ko-KR").unwrap().load(&sources).await.unwrap();

    assert_eq!(catalog.folders().len(), 1);
    assert_eq!(catalog.folders()[0].id, SAMPLE_FOLDER_ID);
    assert!(catalog.folders().iter().all(|f| f.id < PERSONAL_FOLDER_ID_BASE));
    // Never fetched, so nothing was cached for it
    assert!(catalog_cache::get_cached_payload(&db, "overflow").await.unwrap().is_none());
}
