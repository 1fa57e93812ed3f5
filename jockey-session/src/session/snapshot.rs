//! Immutable session snapshot

use crate::playback::{Artwork, Player, QueueEntry};
use chrono::{DateTime, Utc};
use jockey_common::events::{PlaybackState, RepeatMode};
use std::sync::Arc;

/// Complete observable session state at one instant
///
/// Published whole after every command; consumers never see a partially
/// applied change. `sequence` increases by one per publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sequence: u64,
    /// Queue in active (shuffled when shuffle is on) order
    pub queue: Arc<[QueueEntry]>,
    pub queue_position: Option<usize>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub multi_repeat: u32,
    pub state: PlaybackState,
    pub elapsed_ms: u64,
    pub artwork: Artwork,
    pub sleep_timer_end: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            sequence: 0,
            queue: Arc::from(Vec::new()),
            queue_position: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            multi_repeat: 0,
            state: PlaybackState::Idle,
            elapsed_ms: 0,
            artwork: Artwork::Placeholder,
            sleep_timer_end: None,
        }
    }
}

impl Snapshot {
    pub(crate) fn capture(sequence: u64, player: &Player, artwork: &Artwork) -> Self {
        let queue = player.queue();
        Self {
            sequence,
            queue: queue.entries().into(),
            queue_position: queue.cursor(),
            shuffle: queue.is_shuffled(),
            repeat: queue.repeat_mode(),
            multi_repeat: player.multi_repeat(),
            state: player.state(),
            elapsed_ms: player.elapsed_ms(),
            artwork: artwork.clone(),
            sleep_timer_end: player.sleep_deadline(),
        }
    }

    /// Entry under the cursor
    pub fn now_playing(&self) -> Option<&QueueEntry> {
        self.queue_position.and_then(|i| self.queue.get(i))
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }
}
