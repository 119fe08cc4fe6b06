//! Catalog source fetching
//!
//! Each source is fetched on its own; a failure in one never blocks the others.
//! A successful fetch refreshes that source's cached payload, a failed fetch falls
//! back to it. When no source yields a folder the built-in sample folder is used.
//! Personal folders from the database are appended after the catalog folders.

use crate::config::CatalogSourceConfig;
use crate::db::{catalog_cache, folders};
use crate::error::{Error, Result};
use flashdeck_common::catalog::{build_folders, parse_rows, sample_folder, MAX_CATALOG_SOURCES};
use flashdeck_common::models::{Folder, FolderId};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("flashdeck-player/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Where a source's rows come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Http(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSource {
    /// Cache key and folder origin label
    pub name: String,
    pub location: SourceLocation,
}

impl CatalogSource {
    /// Interpret a configured location; relative file paths resolve under `root_folder`
    pub fn from_config(config: &CatalogSourceConfig, root_folder: &Path) -> Self {
        let location = if config.location.starts_with("http://")
            || config.location.starts_with("https://")
        {
            SourceLocation::Http(config.location.clone())
        } else {
            let path = PathBuf::from(&config.location);
            SourceLocation::File(if path.is_absolute() {
                path
            } else {
                root_folder.join(path)
            })
        };

        Self {
            name: config.name.clone(),
            location,
        }
    }
}

/// Every folder available for study
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    folders: Vec<Folder>,
}

impl Catalog {
    pub fn new(folders: Vec<Folder>) -> Self {
        Self { folders }
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn find(&self, folder_id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.id == folder_id)
    }

    /// First non-empty folder
    pub fn first_playable(&self) -> Option<&Folder> {
        self.folders.iter().find(|folder| !folder.is_empty())
    }

    pub fn into_folders(self) -> Vec<Folder> {
        self.folders
    }
}

/// Fetches catalog sources and assembles the [`Catalog`]
pub struct CatalogLoader {
    db: Pool<Sqlite>,
    http_client: reqwest::Client,
    default_language: String,
}

impl CatalogLoader {
    pub fn new(db: Pool<Sqlite>, default_language: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            db,
            http_client,
            default_language: default_language.into(),
        })
    }

    /// Load every source, then the personal folders
    pub async fn load(&self, sources: &[CatalogSource]) -> Result<Catalog> {
        let mut catalog_folders = Vec::new();

        if sources.len() > MAX_CATALOG_SOURCES {
            warn!(
                "{} catalog sources configured, only the first {} are loaded",
                sources.len(),
                MAX_CATALOG_SOURCES
            );
        }

        for (index, source) in sources.iter().take(MAX_CATALOG_SOURCES).enumerate() {
            match self.load_source(index, source).await {
                Some(mut loaded) => catalog_folders.append(&mut loaded),
                None => warn!(source = %source.name, "Catalog source unavailable"),
            }
        }

        if catalog_folders.is_empty() {
            info!("No catalog folders loaded, using the built-in sample folder");
            catalog_folders.push(sample_folder());
        }

        let mut personal = folders::list_personal_folders(&self.db).await?;
        debug!("Loaded {} personal folder(s)", personal.len());
        catalog_folders.append(&mut personal);

        Ok(Catalog::new(catalog_folders))
    }

    /// Folders from one source, or None when neither a fetch nor the cache produced rows
    async fn load_source(&self, index: usize, source: &CatalogSource) -> Option<Vec<Folder>> {
        let fetched = self.fetch(source).await.and_then(|payload| {
            let rows = parse_rows(&payload)?;
            Ok((payload, rows))
        });

        let rows = match fetched {
            Ok((payload, rows)) => {
                if let Err(e) = catalog_cache::put_cached_payload(&self.db, &source.name, &payload).await {
                    warn!(source = %source.name, "Failed to refresh catalog cache: {}", e);
                }
                rows
            }
            Err(e) => {
                warn!(source = %source.name, "Catalog fetch failed: {}", e);
                self.cached_rows(source).await?
            }
        };

        let build = build_folders(&source.name, index, &rows, &self.default_language);
        info!(
            source = %source.name,
            folders = build.folders.len(),
            rejected = build.rejected.len(),
            "Catalog source loaded"
        );
        Some(build.folders)
    }

    async fn cached_rows(&self, source: &CatalogSource) -> Option<Vec<serde_json::Value>> {
        let cached = match catalog_cache::get_cached_payload(&self.db, &source.name).await {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                warn!(source = %source.name, "Failed to read catalog cache: {}", e);
                return None;
            }
        };

        match parse_rows(&cached.payload) {
            Ok(rows) => {
                info!(
                    source = %source.name,
                    fetched_at = %cached.fetched_at,
                    "Using cached catalog payload"
                );
                Some(rows)
            }
            Err(e) => {
                warn!(source = %source.name, "Cached catalog payload unusable: {}", e);
                None
            }
        }
    }

    async fn fetch(&self, source: &CatalogSource) -> Result<String> {
        match &source.location {
            SourceLocation::File(path) => {
                debug!(source = %source.name, path = %path.display(), "Reading catalog file");
                Ok(tokio::fs::read_to_string(path).await?)
            }
            SourceLocation::Http(url) => {
                debug!(source = %source.name, url = %url, "Fetching catalog");
                let response = self.http_client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::Catalog(format!("{} returned {}", url, status)));
                }
                Ok(response.text().await?)
            }
        }
    }
}
