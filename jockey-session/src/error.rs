//! Error types for jockey-session
//!
//! Command failures are local and recoverable: a failed command leaves the
//! session state exactly as it was.

use crate::session::binding::BindingId;
use thiserror::Error;

/// Main error type for the session engine
#[derive(Error, Debug)]
pub enum Error {
    /// Command requires a non-empty queue
    #[error("Queue is empty")]
    EmptyQueue,

    /// Index out of bounds for a queue or playlist operation
    #[error("Invalid index {index} (length {len})")]
    InvalidIndex { index: usize, len: usize },

    /// Operation attempted through a binding that was already released
    #[error("Binding {0} is no longer bound")]
    StaleBinding(BindingId),

    /// Undo requested after the playlist was mutated again (or undo already used)
    #[error("Undo is no longer valid for playlist {0}")]
    StaleUndo(jockey_common::PlaylistId),

    /// Playlist not known to the playlist store
    #[error("Playlist not found: {0}")]
    PlaylistNotFound(jockey_common::PlaylistId),

    /// Argument outside the representable range (durations, positions)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine owner task has shut down
    #[error("Session engine stopped")]
    EngineStopped,

    /// Playback backend failure
    #[error("Playback backend error: {0}")]
    Backend(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session persistence errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Persisted session could not be decoded
    #[error("Corrupt persisted session: {0}")]
    CorruptSession(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from jockey-common
    #[error(transparent)]
    Common(#[from] jockey_common::Error),
}

/// Convenience Result type using jockey-session Error
pub type Result<T> = std::result::Result<T, Error>;
