//! Error types for flashdeck-player
//!
//! Playback failures never surface through these types at runtime: backends turn them
//! into a failed unit completion. These errors cover startup, persistence, catalog
//! loading and the synchronous "could not start" path of a backend.

use thiserror::Error;

/// Main error type for flashdeck-player
#[derive(Error, Debug)]
pub enum Error {
    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] flashdeck_common::Error),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Speech synthesis errors
    #[error("Speech error: {0}")]
    Speech(String),

    /// Catalog source errors
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Remote catalog fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
