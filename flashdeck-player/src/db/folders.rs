//! Personal folder persistence
//!
//! User-owned folders and their cards. Folder and card identities are allocated from
//! [`PERSONAL_FOLDER_ID_BASE`] upward so they never collide with catalog identities.

use crate::error::{Error, Result};
use flashdeck_common::catalog::{
    parse_personal_import, CardDraft, FolderDraft, PersonalExport, PERSONAL_FOLDER_ID_BASE,
};
use flashdeck_common::models::{Card, CardId, Folder, FolderId, FolderOrigin, SpeechHint};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use tracing::{debug, info};

/// Create an empty personal folder
pub async fn create_folder(db: &Pool<Sqlite>, name: &str, language: &str) -> Result<FolderId> {
    let name = validate_name(name)?;
    let mut conn = db.acquire().await?;
    let id = insert_folder(&mut *conn, name, language).await?;
    info!(folder_id = id, "Created personal folder '{}'", name);
    Ok(id)
}

pub async fn rename_folder(db: &Pool<Sqlite>, folder_id: FolderId, name: &str) -> Result<()> {
    let name = validate_name(name)?;
    let result = sqlx::query(
        "UPDATE personal_folders SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(name)
    .bind(i64::from(folder_id))
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Personal folder {}", folder_id)));
    }
    Ok(())
}

/// Delete a folder and every card in it
pub async fn delete_folder(db: &Pool<Sqlite>, folder_id: FolderId) -> Result<()> {
    let mut tx = db.begin().await?;

    // Cards first: the cascade needs foreign_keys on this connection
    sqlx::query("DELETE FROM personal_cards WHERE folder_id = ?")
        .bind(i64::from(folder_id))
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM personal_folders WHERE id = ?")
        .bind(i64::from(folder_id))
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Personal folder {}", folder_id)));
    }
    tx.commit().await?;

    info!(folder_id, "Deleted personal folder");
    Ok(())
}

/// Append a card to the end of a personal folder
pub async fn add_card(db: &Pool<Sqlite>, folder_id: FolderId, draft: &CardDraft) -> Result<CardId> {
    validate_card(draft)?;
    let mut tx = db.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM personal_folders WHERE id = ?")
        .bind(i64::from(folder_id))
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Personal folder {}", folder_id)));
    }

    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM personal_cards WHERE folder_id = ?",
    )
    .bind(i64::from(folder_id))
    .fetch_one(&mut *tx)
    .await?;

    let id = insert_card(&mut *tx, folder_id, position, draft).await?;
    tx.commit().await?;

    debug!(folder_id, card_id = id, "Added personal card");
    Ok(id)
}

/// Replace a personal card's content, keeping its identity and position
pub async fn update_card(db: &Pool<Sqlite>, card_id: CardId, draft: &CardDraft) -> Result<()> {
    validate_card(draft)?;
    let (language, rate) = split_hint(draft.speech.as_ref());

    let result = sqlx::query(
        r#"
        UPDATE personal_cards
        SET term = ?, description = ?, image = ?, speech_language = ?, speech_rate = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(draft.term.trim())
    .bind(draft.description.as_deref())
    .bind(draft.image.as_deref())
    .bind(language)
    .bind(rate)
    .bind(i64::from(card_id))
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Personal card {}", card_id)));
    }
    Ok(())
}

pub async fn delete_card(db: &Pool<Sqlite>, card_id: CardId) -> Result<()> {
    let result = sqlx::query("DELETE FROM personal_cards WHERE id = ?")
        .bind(i64::from(card_id))
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Personal card {}", card_id)));
    }
    Ok(())
}

/// Load every personal folder with its cards, in creation order
pub async fn list_personal_folders(db: &Pool<Sqlite>) -> Result<Vec<Folder>> {
    let folder_rows = sqlx::query("SELECT id, name, language FROM personal_folders ORDER BY id")
        .fetch_all(db)
        .await?;

    let mut folders = Vec::with_capacity(folder_rows.len());
    for row in folder_rows {
        let id = to_id(row.get::<i64, _>("id"))?;

        let card_rows = sqlx::query(
            r#"
            SELECT id, term, description, image, speech_language, speech_rate
            FROM personal_cards
            WHERE folder_id = ?
            ORDER BY position, id
            "#,
        )
        .bind(i64::from(id))
        .fetch_all(db)
        .await?;

        let mut cards = Vec::with_capacity(card_rows.len());
        for card in card_rows {
            let language: Option<String> = card.get("speech_language");
            let rate: Option<f64> = card.get("speech_rate");
            let speech = match (language, rate) {
                (None, None) => None,
                (language, rate) => Some(SpeechHint {
                    language: language.unwrap_or_else(|| row.get::<String, _>("language")),
                    rate: rate.map(|r| r as f32).unwrap_or(1.0),
                }),
            };

            cards.push(Card {
                id: to_id(card.get::<i64, _>("id"))?,
                term: card.get("term"),
                description: card.get("description"),
                image: card.get("image"),
                speech,
            });
        }

        folders.push(Folder {
            id,
            name: row.get("name"),
            language: row.get("language"),
            origin: FolderOrigin::Personal,
            cards,
        });
    }

    Ok(folders)
}

/// Import personal folders from a JSON export document
///
/// The document is validated in full before anything is written; a rejected
/// import leaves existing personal folders untouched. Imported folders are
/// added alongside the existing ones.
pub async fn import_personal_json(db: &Pool<Sqlite>, json: &str) -> Result<Vec<FolderId>> {
    let drafts = parse_personal_import(json)?;

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        ids.push(insert_folder_draft(&mut *tx, draft).await?);
    }
    tx.commit().await?;

    info!("Imported {} personal folder(s)", ids.len());
    Ok(ids)
}

/// Export every personal folder as a pretty-printed JSON document
pub async fn export_personal_json(db: &Pool<Sqlite>) -> Result<String> {
    let folders = list_personal_folders(db).await?;
    let export = PersonalExport::from_folders(&folders);
    Ok(serde_json::to_string_pretty(&export)?)
}

async fn insert_folder_draft(conn: &mut SqliteConnection, draft: &FolderDraft) -> Result<FolderId> {
    let folder_id = insert_folder(conn, draft.name.trim(), &draft.language).await?;
    for (position, card) in draft.cards.iter().enumerate() {
        insert_card(conn, folder_id, position as i64, card).await?;
    }
    Ok(folder_id)
}

async fn insert_folder(conn: &mut SqliteConnection, name: &str, language: &str) -> Result<FolderId> {
    let id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), ?) + 1 FROM personal_folders")
        .bind(i64::from(PERSONAL_FOLDER_ID_BASE) - 1)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO personal_folders (id, name, language) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(language)
        .execute(&mut *conn)
        .await?;

    to_id(id)
}

async fn insert_card(
    conn: &mut SqliteConnection,
    folder_id: FolderId,
    position: i64,
    draft: &CardDraft,
) -> Result<CardId> {
    let id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), ?) + 1 FROM personal_cards")
        .bind(i64::from(PERSONAL_FOLDER_ID_BASE) - 1)
        .fetch_one(&mut *conn)
        .await?;
    let (language, rate) = split_hint(draft.speech.as_ref());

    sqlx::query(
        r#"
        INSERT INTO personal_cards
            (id, folder_id, position, term, description, image, speech_language, speech_rate)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(i64::from(folder_id))
    .bind(position)
    .bind(draft.term.trim())
    .bind(draft.description.as_deref())
    .bind(draft.image.as_deref())
    .bind(language)
    .bind(rate)
    .execute(&mut *conn)
    .await?;

    to_id(id)
}

fn split_hint(hint: Option<&SpeechHint>) -> (Option<&str>, Option<f64>) {
    match hint {
        Some(hint) => (Some(hint.language.as_str()), Some(f64::from(hint.rate))),
        None => (None, None),
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Folder name must not be empty".to_string()));
    }
    Ok(name)
}

fn validate_card(draft: &CardDraft) -> Result<()> {
    if draft.term.trim().is_empty() {
        return Err(Error::InvalidInput("Card term must not be empty".to_string()));
    }
    if let Some(hint) = &draft.speech {
        if !(hint.rate.is_finite() && hint.rate > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Card '{}' has invalid speech rate {}",
                draft.term, hint.rate
            )));
        }
    }
    Ok(())
}

fn to_id(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|_| Error::Internal(format!("Identity {} out of range", raw)))
}
