//! # Flashdeck Common Library
//!
//! Shared code for the Flashdeck crates:
//! - Card and folder models
//! - Catalog row schema, validation and identity ranges
//! - Study preferences with clamping
//! - Event types and EventBus
//! - Configuration loading and root folder resolution
//! - Database bootstrap

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod preferences;

pub use error::{Error, Result};
