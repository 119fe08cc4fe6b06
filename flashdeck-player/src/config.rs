//! Bootstrap configuration for flashdeck-player
//!
//! Two tiers:
//! 1. **TOML bootstrap**: paths, speech program, catalog sources, logging. Read once at startup.
//! 2. **Database runtime**: study preferences in the `settings` table (see `db::settings`).
//!
//! Relative paths in the TOML file are resolved against the root folder.

use crate::error::Result;
use flashdeck_common::config::load_toml_or_default;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder (read separately by root folder resolution)
    pub root_folder: Option<PathBuf>,

    /// SQLite database file; default `<root>/flashdeck.db`
    pub database_path: Option<PathBuf>,

    /// Directory holding recorded clips; default `<root>/audio`
    pub audio_root: Option<PathBuf>,

    /// Language descriptions are always narrated in
    pub description_language: String,

    /// Grace a playback unit gets past its expected length before the watchdog
    /// completes it (0 disables the watchdog)
    pub stall_timeout_ms: u64,

    /// Output device name; the default device when absent
    pub output_device: Option<String>,

    pub speech: SpeechConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            audio_root: None,
            description_language: crate::speech::DEFAULT_DESCRIPTION_LANGUAGE.to_string(),
            stall_timeout_ms: default_stall_timeout_ms(),
            output_device: None,
            speech: SpeechConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load from `path`, or the platform config file, or built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Ok(load_toml_or_default(path)?)
    }

    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        resolve_under(root_folder, self.database_path.as_deref(), "flashdeck.db")
    }

    pub fn audio_root(&self, root_folder: &Path) -> PathBuf {
        resolve_under(root_folder, self.audio_root.as_deref(), "audio")
    }

    /// None when the watchdog is disabled
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_ms > 0).then(|| Duration::from_millis(self.stall_timeout_ms))
    }
}

/// Speech synthesis process
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub program: String,
    /// Words per minute at rate 1.0
    pub words_per_minute: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            words_per_minute: 175,
        }
    }
}

/// Catalog sources, loaded in order
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub sources: Vec<CatalogSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSourceConfig {
    pub name: String,
    /// File path (relative to the root folder) or http(s) URL
    pub location: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn default_stall_timeout_ms() -> u64 {
    30_000
}

fn resolve_under(root_folder: &Path, configured: Option<&Path>, default_name: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => root_folder.join(path),
        None => root_folder.join(default_name),
    }
}
