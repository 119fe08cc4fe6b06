//! Card and folder models

use serde::{Deserialize, Serialize};

/// Card identity, stable across sessions
pub type CardId = u32;

/// Folder identity, unique across every catalog source and the personal range
pub type FolderId = u32;

/// Language used when neither the card nor the folder names one
pub const DEFAULT_LANGUAGE: &str = "ko-KR";

/// Per-card speech synthesis hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechHint {
    /// BCP 47 language tag (e.g. "ko-KR")
    pub language: String,
    /// Rate multiplier applied on top of the session speaking rate
    pub rate: f32,
}

/// A single study item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Image URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechHint>,
}

impl Card {
    pub fn new(id: CardId, term: impl Into<String>) -> Self {
        Self {
            id,
            term: term.into(),
            description: None,
            image: None,
            speech: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_speech(mut self, language: impl Into<String>, rate: f32) -> Self {
        self.speech = Some(SpeechHint {
            language: language.into(),
            rate,
        });
        self
    }

    /// Language for this card: its own hint, otherwise the folder default
    pub fn language<'a>(&'a self, folder_default: &'a str) -> &'a str {
        self.speech
            .as_ref()
            .map(|hint| hint.language.as_str())
            .unwrap_or(folder_default)
    }

    /// Rate multiplier from the speech hint (1.0 when absent)
    pub fn rate_multiplier(&self) -> f32 {
        self.speech.as_ref().map(|hint| hint.rate).unwrap_or(1.0)
    }

    /// Description text worth narrating (trimmed, None when blank)
    pub fn narratable_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Where a folder came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FolderOrigin {
    /// Read-only, rebuilt wholesale on every catalog load
    Catalog { source: String },
    /// User-owned, persisted indefinitely
    Personal,
}

/// A named, ordered collection of cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    /// Default language for cards without a speech hint
    pub language: String,
    pub origin: FolderOrigin,
    pub cards: Vec<Card>,
}

impl Folder {
    pub fn is_read_only(&self) -> bool {
        matches!(self.origin, FolderOrigin::Catalog { .. })
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
