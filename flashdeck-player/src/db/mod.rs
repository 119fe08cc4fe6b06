//! Database access layer
//!
//! Preferences, personal folders and the catalog cache. Table creation lives in
//! `flashdeck_common::db`.

pub mod catalog_cache;
pub mod folders;
pub mod settings;
