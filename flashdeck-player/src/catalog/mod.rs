//! Catalog loading: configured sources, cache fallback, personal folders

pub mod loader;

pub use loader::{Catalog, CatalogLoader, CatalogSource, SourceLocation};
