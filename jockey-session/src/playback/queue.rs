//! Play queue
//!
//! Ordered entries with a cursor, a repeat mode and an optional shuffled
//! view. The original order is always retained; while shuffle is on the
//! active order is a permutation of it.
//!
//! Every fallible operation validates before mutating, so an `Err` leaves
//! the queue exactly as it was.

use crate::error::{Error, Result};
use jockey_common::events::RepeatMode;
use jockey_common::TrackRef;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

/// One slot in the queue
///
/// The same track may be queued several times; each occurrence gets its
/// own `entry_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub entry_id: Uuid,
    pub track: TrackRef,
}

impl QueueEntry {
    pub fn new(track: TrackRef) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            track,
        }
    }
}

/// Direction of a cursor step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Result of [`Queue::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved to a neighbouring index
    Moved(usize),
    /// Cursor wrapped around (repeat All)
    Wrapped(usize),
    /// Same entry plays again (repeat One at the end of the queue)
    Replay(usize),
    /// Backward step at index 0 without wrap: restart the current track
    RestartCurrent,
    /// Forward step past the last entry with repeat Off; cursor unchanged
    EndOfQueue,
}

impl Advance {
    /// True when the cursor now points at a different entry
    pub fn changes_track(self) -> bool {
        matches!(self, Advance::Moved(_) | Advance::Wrapped(_))
    }
}

/// What happened to the cursor when an entry was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// A non-current entry was removed; the current entry is unchanged
    Other,
    /// The current entry was removed and the entry at `index` took its place
    CurrentReplaced { index: usize },
    /// The last entry was current (no wrap); cursor is on the new last entry
    EndOfQueue { index: usize },
    /// The queue is now empty
    Emptied,
}

#[derive(Debug)]
pub struct Queue {
    original: Vec<QueueEntry>,
    /// Active order while shuffle is on
    shuffled: Option<Vec<QueueEntry>>,
    cursor: Option<usize>,
    repeat: RepeatMode,
    rng: StdRng,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Queue with a deterministic shuffle order
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            original: Vec::new(),
            shuffled: None,
            cursor: None,
            repeat: RepeatMode::Off,
            rng,
        }
    }

    /// Rebuild a queue from previously captured parts
    ///
    /// `shuffled`, when present, must hold the same entries as `original`;
    /// entries missing from either side are dropped from both. The cursor
    /// is clamped into range.
    pub fn from_parts(
        original: Vec<QueueEntry>,
        shuffled: Option<Vec<QueueEntry>>,
        cursor: Option<usize>,
        repeat: RepeatMode,
        seed: Option<u64>,
    ) -> Self {
        let mut queue = match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        };
        queue.repeat = repeat;

        match shuffled {
            Some(shuffled) => {
                let in_original = |e: &QueueEntry| original.iter().any(|o| o.entry_id == e.entry_id);
                let shuffled: Vec<QueueEntry> =
                    shuffled.into_iter().filter(|e| in_original(e)).collect();
                let original = original
                    .into_iter()
                    .filter(|o| shuffled.iter().any(|e| e.entry_id == o.entry_id))
                    .collect();
                queue.original = original;
                queue.shuffled = Some(shuffled);
            }
            None => queue.original = original,
        }

        let len = queue.len();
        queue.cursor = if len == 0 {
            None
        } else {
            Some(cursor.unwrap_or(0).min(len - 1))
        };
        queue
    }

    /// Entries in active (possibly shuffled) order
    pub fn entries(&self) -> &[QueueEntry] {
        self.shuffled.as_deref().unwrap_or(&self.original)
    }

    /// Entries in original (unshuffled) order
    pub fn original_entries(&self) -> &[QueueEntry] {
        &self.original
    }

    /// The shuffled order, when shuffle is on
    pub fn shuffled_entries(&self) -> Option<&[QueueEntry]> {
        self.shuffled.as_deref()
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.cursor.and_then(|i| self.entries().get(i))
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled.is_some()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Replace the contents and put the cursor on `start_index`
    ///
    /// An empty track list clears the queue; `start_index` must then be 0.
    pub fn set_queue(&mut self, tracks: Vec<TrackRef>, start_index: usize) -> Result<()> {
        let len = tracks.len();
        if (len == 0 && start_index != 0) || (len > 0 && start_index >= len) {
            return Err(Error::InvalidIndex {
                index: start_index,
                len,
            });
        }

        self.original = tracks.into_iter().map(QueueEntry::new).collect();
        if len == 0 {
            self.cursor = None;
            if self.shuffled.is_some() {
                self.shuffled = Some(Vec::new());
            }
            return Ok(());
        }

        self.cursor = Some(start_index);
        if self.shuffled.is_some() {
            self.shuffled = Some(self.shuffle_around(start_index));
        }
        Ok(())
    }

    /// Queue `track` right after the current entry; returns its active index
    pub fn insert_next(&mut self, track: TrackRef) -> usize {
        let entry = QueueEntry::new(track);
        let Some(cursor) = self.cursor else {
            return self.push_first(entry);
        };

        if let Some(shuffled) = self.shuffled.as_mut() {
            let current_id = shuffled[cursor].entry_id;
            let original_pos = self
                .original
                .iter()
                .position(|e| e.entry_id == current_id)
                .map_or(self.original.len(), |p| p + 1);
            self.original.insert(original_pos, entry.clone());
            shuffled.insert(cursor + 1, entry);
        } else {
            self.original.insert(cursor + 1, entry);
        }
        cursor + 1
    }

    /// Append `track` to the end; returns its active index
    pub fn insert_last(&mut self, track: TrackRef) -> usize {
        let entry = QueueEntry::new(track);
        if self.cursor.is_none() {
            return self.push_first(entry);
        }

        if let Some(shuffled) = self.shuffled.as_mut() {
            shuffled.push(entry.clone());
        }
        self.original.push(entry);
        self.len() - 1
    }

    fn push_first(&mut self, entry: QueueEntry) -> usize {
        if let Some(shuffled) = self.shuffled.as_mut() {
            shuffled.push(entry.clone());
        }
        self.original.push(entry);
        self.cursor = Some(0);
        0
    }

    /// Remove the entry at active `index`
    pub fn remove(&mut self, index: usize) -> Result<(QueueEntry, Removal)> {
        let len = self.len();
        let cursor = match self.cursor {
            Some(cursor) if index < len => cursor,
            _ => return Err(Error::InvalidIndex { index, len }),
        };

        let removed = match self.shuffled.as_mut() {
            Some(shuffled) => {
                let removed = shuffled.remove(index);
                self.original.retain(|e| e.entry_id != removed.entry_id);
                removed
            }
            None => self.original.remove(index),
        };

        let new_len = self.len();
        let removal = if new_len == 0 {
            self.cursor = None;
            Removal::Emptied
        } else if index < cursor {
            self.cursor = Some(cursor - 1);
            Removal::Other
        } else if index > cursor {
            Removal::Other
        } else if cursor < new_len {
            Removal::CurrentReplaced { index: cursor }
        } else if self.repeat == RepeatMode::All {
            self.cursor = Some(0);
            Removal::CurrentReplaced { index: 0 }
        } else {
            self.cursor = Some(new_len - 1);
            Removal::EndOfQueue { index: new_len - 1 }
        };

        Ok((removed, removal))
    }

    /// Move the entry at active index `from` to active index `to`
    ///
    /// The current entry keeps its identity; the cursor is re-pointed so it
    /// still refers to it.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.len();
        for index in [from, to] {
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        let active = match self.shuffled.as_mut() {
            Some(shuffled) => shuffled,
            None => &mut self.original,
        };
        let entry = active.remove(from);
        active.insert(to, entry);

        if let Some(cursor) = self.cursor {
            self.cursor = Some(if cursor == from {
                to
            } else if from < cursor && cursor <= to {
                cursor - 1
            } else if to <= cursor && cursor < from {
                cursor + 1
            } else {
                cursor
            });
        }
        Ok(())
    }

    /// Step the cursor one entry in `direction`, honouring the repeat mode
    pub fn advance(&mut self, direction: Direction) -> Result<Advance> {
        let Some(cursor) = self.cursor else {
            return Err(Error::EmptyQueue);
        };
        let last = self.len() - 1;

        let outcome = match direction {
            Direction::Forward if cursor < last => Advance::Moved(cursor + 1),
            Direction::Forward => match self.repeat {
                RepeatMode::All => Advance::Wrapped(0),
                RepeatMode::One => Advance::Replay(cursor),
                RepeatMode::Off => Advance::EndOfQueue,
            },
            Direction::Backward if cursor > 0 => Advance::Moved(cursor - 1),
            Direction::Backward => match self.repeat {
                RepeatMode::All => Advance::Wrapped(last),
                RepeatMode::One | RepeatMode::Off => Advance::RestartCurrent,
            },
        };

        if let Advance::Moved(index) | Advance::Wrapped(index) = outcome {
            self.cursor = Some(index);
        }
        Ok(outcome)
    }

    /// Put the cursor on active `index`
    pub fn jump(&mut self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(Error::InvalidIndex { index, len });
        }
        self.cursor = Some(index);
        Ok(())
    }

    /// Turn the shuffled view on or off; returns false if nothing changed
    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        if enabled == self.is_shuffled() {
            return false;
        }

        if enabled {
            let shuffled = match self.cursor {
                Some(cursor) => self.shuffle_around(cursor),
                None => Vec::new(),
            };
            self.shuffled = Some(shuffled);
        } else {
            let current_id = self.current().map(|e| e.entry_id);
            self.shuffled = None;
            self.cursor = current_id
                .and_then(|id| self.original.iter().position(|e| e.entry_id == id));
        }
        true
    }

    /// Random permutation of the original order with the entry at original
    /// index `keep` fixed at that same index
    fn shuffle_around(&mut self, keep: usize) -> Vec<QueueEntry> {
        let mut others: Vec<QueueEntry> = self
            .original
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != keep)
            .map(|(_, e)| e.clone())
            .collect();
        others.shuffle(&mut self.rng);
        others.insert(keep, self.original[keep].clone());
        others
    }
}
