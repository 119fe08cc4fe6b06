//! Recorded-audio resource locator
//!
//! A card's clip lives at `<audio_root>/<id:04>_<lang>.mp3`. Only the file name is
//! percent-encoded; the root is used as configured.

use flashdeck_common::models::CardId;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};

/// Characters left as-is in file names (unreserved set of RFC 3986)
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Unencoded file name for a card's clip
pub fn clip_file_name(card_id: CardId, language: &str) -> String {
    format!("{:04}_{}.mp3", card_id, language)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    root: PathBuf,
}

impl ResourceLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic clip path for a card identity and language
    pub fn resolve(&self, card_id: CardId, language: &str) -> PathBuf {
        let name = clip_file_name(card_id, language);
        self.root
            .join(utf8_percent_encode(&name, FILE_NAME).to_string())
    }
}
