//! # Jockey Playback Session Engine (jockey-session)
//!
//! Owns the play queue and transport state of a music player and publishes
//! it as immutable snapshots to any number of UI surfaces.
//!
//! **Architecture:** one owner task per session serializes every command;
//! snapshots and projections go out over `watch` channels; diagnostics over
//! the `EventBus`. Audio output sits behind [`playback::PlaybackBackend`].
//!
//! Also hosts the automatic-playlist rule engine and playlist duplicate
//! resolution used by the same surfaces.

pub mod autoplaylist;
pub mod cli;
pub mod collision;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod playlist_store;
pub mod rules;
pub mod session;

pub use error::{Error, Result};
pub use session::{Binding, BindingId, SessionEngine, SessionHandle, Snapshot};
