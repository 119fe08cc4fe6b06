//! Last successfully fetched payload per catalog source

use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

/// A cached catalog payload
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
}

pub async fn get_cached_payload(db: &Pool<Sqlite>, source: &str) -> Result<Option<CachedPayload>> {
    let row = sqlx::query("SELECT payload, fetched_at FROM catalog_cache WHERE source = ?")
        .bind(source)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|row| CachedPayload {
        payload: row.get("payload"),
        fetched_at: row.get("fetched_at"),
    }))
}

/// Replace the cached payload for `source`
pub async fn put_cached_payload(db: &Pool<Sqlite>, source: &str, payload: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO catalog_cache (source, payload, fetched_at)
        VALUES (?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET payload = excluded.payload, fetched_at = excluded.fetched_at
        "#,
    )
    .bind(source)
    .bind(payload)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(())
}
