//! # Jockey Common Library
//!
//! Shared code for the Jockey playback session crates including:
//! - Track and playlist identity
//! - The read-only catalog and its refresh notifications
//! - Event types (SessionEvent enum) and the EventBus
//! - Configuration file and data folder resolution
//! - Database initialization

pub mod catalog;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod track;

pub use catalog::{Catalog, CatalogHandle};
pub use error::{Error, Result};
pub use track::{Playlist, PlaylistId, Track, TrackId, TrackRef};
