//! Playback model
//!
//! Pure queue and transport state plus the seams to the audio backend and
//! artwork lookup. Nothing here is async; the session engine owns these
//! values on its task.

pub mod artwork;
pub mod backend;
pub mod queue;
pub mod state;

pub use artwork::{Artwork, ArtworkImage, ArtworkSource, FolderArtworkSource, NoArtwork};
pub use backend::{NullBackend, PlaybackBackend};
pub use queue::{Advance, Direction, Queue, QueueEntry, Removal};
pub use state::{Changes, Player};
