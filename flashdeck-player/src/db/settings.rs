//! Settings database access
//!
//! Read/write preferences in the settings table (key-value store).

use crate::error::{Error, Result};
use flashdeck_common::preferences::{clamp_rate, clamp_repeat_count, keys, Preferences};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::{debug, warn};

/// Load preferences, substituting defaults for missing or unparsable values
///
/// Out-of-range numbers are clamped and the clamped value is written back, so the
/// settings table never keeps a value the player would not use.
pub async fn load_preferences(db: &Pool<Sqlite>) -> Result<Preferences> {
    let defaults = Preferences::default();

    let rate = match read_or_default::<f32>(db, keys::RATE).await? {
        Some(raw) => {
            let clamped = clamp_rate(raw);
            if clamped != raw {
                warn!("Stored speech rate {} out of range, using {}", raw, clamped);
                set_setting(db, keys::RATE, clamped).await?;
            }
            clamped
        }
        None => defaults.rate,
    };

    let repeat_count = match read_or_default::<i64>(db, keys::REPEAT_COUNT).await? {
        Some(raw) => {
            let clamped = clamp_repeat_count(raw);
            if i64::from(clamped) != raw {
                warn!("Stored repeat count {} out of range, using {}", raw, clamped);
                set_setting(db, keys::REPEAT_COUNT, clamped).await?;
            }
            clamped
        }
        None => defaults.repeat_count,
    };

    let prefs = Preferences {
        rate,
        repeat_count,
        shuffle: read_or_default(db, keys::SHUFFLE)
            .await?
            .unwrap_or(defaults.shuffle),
        hide_term: read_or_default(db, keys::HIDE_TERM)
            .await?
            .unwrap_or(defaults.hide_term),
        prefer_audio: read_or_default(db, keys::PREFER_AUDIO)
            .await?
            .unwrap_or(defaults.prefer_audio),
        read_description: read_or_default(db, keys::READ_DESCRIPTION)
            .await?
            .unwrap_or(defaults.read_description),
    };

    debug!("Loaded preferences: {:?}", prefs);
    Ok(prefs)
}

/// Persist every preference field
pub async fn save_preferences(db: &Pool<Sqlite>, prefs: &Preferences) -> Result<()> {
    let prefs = prefs.normalized();

    let mut tx = db.begin().await?;
    for (key, value) in [
        (keys::RATE, prefs.rate.to_string()),
        (keys::REPEAT_COUNT, prefs.repeat_count.to_string()),
        (keys::SHUFFLE, prefs.shuffle.to_string()),
        (keys::HIDE_TERM, prefs.hide_term.to_string()),
        (keys::PREFER_AUDIO, prefs.prefer_audio.to_string()),
        (keys::READ_DESCRIPTION, prefs.read_description.to_string()),
    ] {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Like [`get_setting`], but an unparsable value is logged and treated as absent
async fn read_or_default<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    match get_setting::<T>(db, key).await {
        Ok(value) => Ok(value),
        Err(Error::Config(msg)) => {
            warn!("{}; using default", msg);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Generic setting getter
///
/// Returns None if the key doesn't exist or its value is NULL.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}
