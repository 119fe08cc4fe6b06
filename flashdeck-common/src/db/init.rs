//! Database initialization
//!
//! Opens (creating when missing) the SQLite database and creates every table
//! idempotently, then seeds default preference values.

use crate::preferences::{keys, Preferences};
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    Ok(pool)
}

/// Create all tables and default settings on an already-open pool
///
/// Safe to call repeatedly. Tests use this on `sqlite::memory:` pools.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_settings_table(pool).await?;
    create_personal_folders_table(pool).await?;
    create_personal_cards_table(pool).await?;
    create_catalog_cache_table(pool).await?;

    init_default_settings(pool).await?;
    Ok(())
}

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_personal_folders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS personal_folders (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            language TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_personal_cards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS personal_cards (
            id INTEGER PRIMARY KEY,
            folder_id INTEGER NOT NULL REFERENCES personal_folders(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            term TEXT NOT NULL CHECK (length(trim(term)) > 0),
            description TEXT,
            image TEXT,
            speech_language TEXT,
            speech_rate REAL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_personal_cards_folder ON personal_cards(folder_id, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_catalog_cache_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_cache (
            source TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            fetched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure every preference key exists with a non-NULL value
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults = Preferences::default();

    ensure_setting(pool, keys::RATE, &defaults.rate.to_string()).await?;
    ensure_setting(pool, keys::REPEAT_COUNT, &defaults.repeat_count.to_string()).await?;
    ensure_setting(pool, keys::SHUFFLE, &defaults.shuffle.to_string()).await?;
    ensure_setting(pool, keys::HIDE_TERM, &defaults.hide_term.to_string()).await?;
    ensure_setting(pool, keys::PREFER_AUDIO, &defaults.prefer_audio.to_string()).await?;
    ensure_setting(pool, keys::READ_DESCRIPTION, &defaults.read_description.to_string()).await?;

    Ok(())
}

/// Insert `key` with `default_value` when missing; reset it when NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
