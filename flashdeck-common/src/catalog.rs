//! Catalog row schema, validation and folder identity ranges
//!
//! External catalogs deliver loosely-typed rows. Every row is validated against an
//! explicit schema before it becomes a [`Card`]:
//!
//! | field         | required | accepted shapes                |
//! |---------------|----------|--------------------------------|
//! | `folder`      | yes      | non-blank string               |
//! | `id`          | yes      | non-negative integer or string |
//! | `term`        | yes      | non-blank string               |
//! | `description` | no       | string                         |
//! | `image`       | no       | string                         |
//! | `lang`        | no       | string                         |
//! | `rate`        | no       | number or numeric string       |
//!
//! Blank strings count as absent. Rows failing validation are rejected one by one
//! and never reach the player.

use crate::models::{Card, CardId, Folder, FolderId, FolderOrigin, SpeechHint, DEFAULT_LANGUAGE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Width of the folder identity range reserved for each catalog source
pub const FOLDER_ID_STRIDE: FolderId = 10_000;

/// First identity of the user-owned folder range
pub const PERSONAL_FOLDER_ID_BASE: FolderId = 1_000_000;

/// Identity of the built-in sample folder (below every source range)
pub const SAMPLE_FOLDER_ID: FolderId = 1;

/// Number of catalog sources whose ranges fit below the personal range
pub const MAX_CATALOG_SOURCES: usize =
    (PERSONAL_FOLDER_ID_BASE / FOLDER_ID_STRIDE) as usize - 1;

/// First folder identity for the source at `source_index`
///
/// Ranges are `[(i + 1) * STRIDE, (i + 2) * STRIDE)`, so sources never overlap each
/// other, the sample folder, or the personal range. `None` once a range would reach
/// into the personal range.
pub fn source_folder_id_base(source_index: usize) -> Option<FolderId> {
    let slot = FolderId::try_from(source_index).ok()?.checked_add(1)?;
    let base = slot.checked_mul(FOLDER_ID_STRIDE)?;
    let end = base.checked_add(FOLDER_ID_STRIDE)?;
    (end <= PERSONAL_FOLDER_ID_BASE).then_some(base)
}

/// A row that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Zero-based position of the row in its source
    pub index: usize,
    pub reason: String,
}

/// Folders produced from one source, plus the rows that were dropped
#[derive(Debug, Clone, Default)]
pub struct CatalogBuild {
    pub folders: Vec<Folder>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq)]
struct ValidRow {
    folder: String,
    id: CardId,
    term: String,
    description: Option<String>,
    image: Option<String>,
    lang: Option<String>,
    rate: Option<f32>,
}

fn optional_string(row: &Map<String, Value>, field: &str) -> std::result::Result<Option<String>, String> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(other) => Err(format!("field '{}' must be a string, got {}", field, other)),
    }
}

fn required_string(row: &Map<String, Value>, field: &str) -> std::result::Result<String, String> {
    optional_string(row, field)?.ok_or_else(|| format!("missing required field '{}'", field))
}

fn required_id(row: &Map<String, Value>) -> std::result::Result<CardId, String> {
    match row.get("id") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| CardId::try_from(v).ok())
            .ok_or_else(|| format!("field 'id' out of range: {}", n)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<CardId>()
            .map_err(|_| format!("field 'id' is not an integer: {:?}", s)),
        None | Some(Value::Null) => Err("missing required field 'id'".to_string()),
        Some(other) => Err(format!("field 'id' must be an integer, got {}", other)),
    }
}

fn optional_rate(row: &Map<String, Value>) -> std::result::Result<Option<f32>, String> {
    let rate = match row.get("rate") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(|v| v as f32),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        Some(other) => return Err(format!("field 'rate' must be a number, got {}", other)),
    };

    match rate {
        Some(r) if r.is_finite() && r > 0.0 => Ok(Some(r)),
        _ => Err("field 'rate' must be a positive number".to_string()),
    }
}

fn validate_row(value: &Value) -> std::result::Result<ValidRow, String> {
    let row = value
        .as_object()
        .ok_or_else(|| format!("row must be an object, got {}", value))?;

    Ok(ValidRow {
        folder: required_string(row, "folder")?,
        id: required_id(row)?,
        term: required_string(row, "term")?,
        description: optional_string(row, "description")?,
        image: optional_string(row, "image")?,
        lang: optional_string(row, "lang")?,
        rate: optional_rate(row)?,
    })
}

/// Validate raw rows from one source and group them into folders.
///
/// Folders keep the order in which their names first appear; cards keep row order.
/// A folder's default language is the first `lang` seen among its rows, falling back
/// to `default_language`. Card identities must be unique within the source; later
/// duplicates are rejected.
pub fn build_folders(
    source: &str,
    source_index: usize,
    rows: &[Value],
    default_language: &str,
) -> CatalogBuild {
    let mut build = CatalogBuild::default();
    let Some(base) = source_folder_id_base(source_index) else {
        warn!(
            source,
            source_index,
            "No folder identity range left for this source (limit {}); skipped",
            MAX_CATALOG_SOURCES
        );
        return build;
    };
    let mut seen_ids: HashSet<CardId> = HashSet::new();
    let mut grouped: Vec<(String, Vec<ValidRow>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, raw) in rows.iter().enumerate() {
        let row = match validate_row(raw) {
            Ok(row) => row,
            Err(reason) => {
                warn!(source, index, %reason, "Rejected catalog row");
                build.rejected.push(RejectedRow { index, reason });
                continue;
            }
        };

        if !seen_ids.insert(row.id) {
            let reason = format!("duplicate card id {}", row.id);
            warn!(source, index, %reason, "Rejected catalog row");
            build.rejected.push(RejectedRow { index, reason });
            continue;
        }

        let slot = *positions.entry(row.folder.clone()).or_insert_with(|| {
            grouped.push((row.folder.clone(), Vec::new()));
            grouped.len() - 1
        });
        grouped[slot].1.push(row);
    }

    for (offset, (name, rows)) in grouped.into_iter().enumerate() {
        if offset as FolderId >= FOLDER_ID_STRIDE {
            warn!(source, "Source exceeds its folder identity range; remaining folders dropped");
            break;
        }

        let language = rows
            .iter()
            .find_map(|row| row.lang.clone())
            .unwrap_or_else(|| default_language.to_string());

        let cards = rows
            .into_iter()
            .map(|row| {
                let speech = (row.lang.is_some() || row.rate.is_some()).then(|| SpeechHint {
                    language: row.lang.unwrap_or_else(|| language.clone()),
                    rate: row.rate.unwrap_or(1.0),
                });
                Card {
                    id: row.id,
                    term: row.term,
                    description: row.description,
                    image: row.image,
                    speech,
                }
            })
            .collect();

        build.folders.push(Folder {
            id: base + offset as FolderId,
            name,
            language,
            origin: FolderOrigin::Catalog {
                source: source.to_string(),
            },
            cards,
        });
    }

    build
}

/// Parse a JSON document holding an array of rows
pub fn parse_rows(json: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(Error::InvalidInput(
                "catalog document must be an array of rows or an object with a 'rows' array"
                    .to_string(),
            )),
        },
        _ => Err(Error::InvalidInput(
            "catalog document must be an array of rows".to_string(),
        )),
    }
}

/// Minimal built-in folder used when no catalog source can be loaded
pub fn sample_folder() -> Folder {
    Folder {
        id: SAMPLE_FOLDER_ID,
        name: "Sample".to_string(),
        language: DEFAULT_LANGUAGE.to_string(),
        origin: FolderOrigin::Catalog {
            source: "built-in".to_string(),
        },
        cards: vec![
            Card::new(1, "사과").with_description("apple"),
            Card::new(2, "바나나").with_description("banana"),
            Card::new(3, "포도").with_description("grape"),
            Card::new(4, "딸기").with_description("strawberry"),
        ],
    }
}

/// Version written into personal folder exports
pub const PERSONAL_EXPORT_VERSION: u32 = 1;

/// A card in a personal import/export document (identity assigned on import)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub term: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub speech: Option<SpeechHint>,
}

/// A folder in a personal import/export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderDraft {
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub cards: Vec<CardDraft>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Personal folders as exchanged through import/export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalExport {
    pub version: u32,
    pub folders: Vec<FolderDraft>,
}

impl PersonalExport {
    pub fn from_folders(folders: &[Folder]) -> Self {
        Self {
            version: PERSONAL_EXPORT_VERSION,
            folders: folders
                .iter()
                .map(|folder| FolderDraft {
                    name: folder.name.clone(),
                    language: folder.language.clone(),
                    cards: folder
                        .cards
                        .iter()
                        .map(|card| CardDraft {
                            term: card.term.clone(),
                            description: card.description.clone(),
                            image: card.image.clone(),
                            speech: card.speech.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Parse and validate a personal folder import.
///
/// The whole document is checked before anything is returned, so callers can apply
/// it atomically or not at all. Error messages name the offending folder/card.
pub fn parse_personal_import(json: &str) -> Result<Vec<FolderDraft>> {
    let export: PersonalExport = serde_json::from_str(json)
        .map_err(|e| Error::InvalidInput(format!("Import is not a valid folder export: {}", e)))?;

    if export.version != PERSONAL_EXPORT_VERSION {
        return Err(Error::InvalidInput(format!(
            "Unsupported export version {} (expected {})",
            export.version, PERSONAL_EXPORT_VERSION
        )));
    }

    for (folder_index, folder) in export.folders.iter().enumerate() {
        if folder.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "Folder #{} has an empty name",
                folder_index + 1
            )));
        }
        for (card_index, card) in folder.cards.iter().enumerate() {
            if card.term.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Card #{} in folder '{}' has an empty term",
                    card_index + 1,
                    folder.name
                )));
            }
            if let Some(hint) = &card.speech {
                if !(hint.rate.is_finite() && hint.rate > 0.0) {
                    return Err(Error::InvalidInput(format!(
                        "Card '{}' in folder '{}' has an invalid speech rate",
                        card.term, folder.name
                    )));
                }
            }
        }
    }

    Ok(export.folders)
}
