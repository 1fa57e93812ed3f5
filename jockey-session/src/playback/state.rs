//! Transport state machine
//!
//! [`Player`] composes the [`Queue`] with the playback state, elapsed
//! position, multi-repeat counter and sleep deadline. It is a plain value
//! owned by the engine task; every operation either fails without touching
//! anything or returns a [`Changes`] record describing what moved, which the
//! engine turns into backend calls, events and a new snapshot.

use crate::error::{Error, Result};
use crate::playback::queue::{Advance, Direction, Queue, QueueEntry, Removal};
use chrono::{DateTime, Utc};
use jockey_common::events::{PlaybackState, QueueChangeTrigger, RepeatMode};
use jockey_common::TrackRef;

/// Side effects of one transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    /// `(old, new)` when the playback state changed
    pub state: Option<(PlaybackState, PlaybackState)>,
    /// The entry under the cursor is a different one (or there is none now)
    pub track_changed: bool,
    /// Position jumped within the current track (seek, replay, restart)
    pub seeked: bool,
    pub queue: Option<QueueChangeTrigger>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self == &Changes::default()
    }

    /// True when the backend has to be told about this transition
    pub fn touches_backend(&self) -> bool {
        self.state.is_some() || self.track_changed || self.seeked
    }
}

#[derive(Debug)]
pub struct Player {
    queue: Queue,
    state: PlaybackState,
    elapsed_ms: u64,
    multi_repeat: u32,
    sleep_deadline: Option<DateTime<Utc>>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(Queue::new())
    }
}

impl Player {
    pub fn new(queue: Queue) -> Self {
        Self {
            queue,
            state: PlaybackState::Idle,
            elapsed_ms: 0,
            multi_repeat: 0,
            sleep_deadline: None,
        }
    }

    /// Player restored from a persisted session
    ///
    /// Never resumes into Playing: a restored session waits for an explicit
    /// `play()`.
    pub fn restored(queue: Queue, state: PlaybackState, elapsed_ms: u64) -> Self {
        let state = match (queue.is_empty(), state) {
            (true, _) => PlaybackState::Idle,
            (false, PlaybackState::Playing) => PlaybackState::Paused,
            (false, other) => other,
        };
        let elapsed_ms = queue
            .current()
            .map_or(0, |entry| elapsed_ms.min(entry.track.duration_ms));
        Self {
            queue,
            state,
            elapsed_ms,
            multi_repeat: 0,
            sleep_deadline: None,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn multi_repeat(&self) -> u32 {
        self.multi_repeat
    }

    pub fn sleep_deadline(&self) -> Option<DateTime<Utc>> {
        self.sleep_deadline
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.queue.current()
    }

    fn transition(&mut self, new: PlaybackState, changes: &mut Changes) {
        if self.state == new {
            return;
        }
        let old = changes.state.map_or(self.state, |(old, _)| old);
        self.state = new;
        changes.state = if old == new { None } else { Some((old, new)) };
    }

    /// Reset position and multi-repeat for a newly current entry
    fn enter_track(&mut self, changes: &mut Changes) {
        self.elapsed_ms = 0;
        self.multi_repeat = 0;
        changes.track_changed = true;
    }

    fn rewind(&mut self, changes: &mut Changes) {
        self.elapsed_ms = 0;
        changes.seeked = true;
    }

    /// Stopped with an emptied queue returns to Idle once entries arrive
    fn refilled(&mut self, was_empty: bool, changes: &mut Changes) {
        if was_empty && !self.queue.is_empty() {
            self.enter_track(changes);
            if self.state == PlaybackState::Stopped {
                self.transition(PlaybackState::Idle, changes);
            }
        }
    }

    pub fn set_queue(&mut self, tracks: Vec<TrackRef>, start_index: usize) -> Result<Changes> {
        let was_empty = self.queue.is_empty();
        self.queue.set_queue(tracks, start_index)?;

        let mut changes = Changes {
            queue: Some(QueueChangeTrigger::SetQueue),
            ..Changes::default()
        };
        self.enter_track(&mut changes);
        if self.queue.is_empty() {
            self.transition(PlaybackState::Idle, &mut changes);
        } else if was_empty && self.state == PlaybackState::Stopped {
            self.transition(PlaybackState::Idle, &mut changes);
        }
        Ok(changes)
    }

    pub fn insert_next(&mut self, track: TrackRef) -> Changes {
        let was_empty = self.queue.is_empty();
        self.queue.insert_next(track);
        let mut changes = Changes {
            queue: Some(QueueChangeTrigger::InsertNext),
            ..Changes::default()
        };
        self.refilled(was_empty, &mut changes);
        changes
    }

    pub fn insert_last(&mut self, track: TrackRef) -> Changes {
        let was_empty = self.queue.is_empty();
        self.queue.insert_last(track);
        let mut changes = Changes {
            queue: Some(QueueChangeTrigger::InsertLast),
            ..Changes::default()
        };
        self.refilled(was_empty, &mut changes);
        changes
    }

    pub fn remove(&mut self, index: usize) -> Result<Changes> {
        let (_, removal) = self.queue.remove(index)?;
        let mut changes = Changes {
            queue: Some(QueueChangeTrigger::Remove),
            ..Changes::default()
        };

        match removal {
            Removal::Other => {}
            Removal::CurrentReplaced { .. } => self.enter_track(&mut changes),
            Removal::EndOfQueue { .. } => {
                self.enter_track(&mut changes);
                if self.state != PlaybackState::Idle {
                    self.transition(PlaybackState::Stopped, &mut changes);
                }
            }
            Removal::Emptied => {
                self.enter_track(&mut changes);
                self.transition(PlaybackState::Idle, &mut changes);
            }
        }
        Ok(changes)
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<Changes> {
        self.queue.move_entry(from, to)?;
        Ok(Changes {
            queue: Some(QueueChangeTrigger::Move),
            ..Changes::default()
        })
    }

    pub fn set_shuffle(&mut self, enabled: bool) -> Changes {
        let queue = self
            .queue
            .set_shuffle(enabled)
            .then_some(QueueChangeTrigger::Shuffle);
        Changes {
            queue,
            ..Changes::default()
        }
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) -> Changes {
        self.queue.set_repeat_mode(mode);
        Changes::default()
    }

    pub fn set_multi_repeat(&mut self, count: u32) -> Changes {
        self.multi_repeat = count;
        Changes::default()
    }

    pub fn set_sleep_deadline(&mut self, deadline: Option<DateTime<Utc>>) -> Changes {
        self.sleep_deadline = deadline;
        Changes::default()
    }

    pub fn play(&mut self) -> Result<Changes> {
        if self.queue.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let mut changes = Changes::default();
        self.transition(PlaybackState::Playing, &mut changes);
        Ok(changes)
    }

    pub fn pause(&mut self) -> Changes {
        let mut changes = Changes::default();
        if self.state == PlaybackState::Playing {
            self.transition(PlaybackState::Paused, &mut changes);
        }
        changes
    }

    pub fn toggle_play(&mut self) -> Result<Changes> {
        if self.state.is_playing() {
            Ok(self.pause())
        } else {
            self.play()
        }
    }

    pub fn stop(&mut self) -> Changes {
        let mut changes = Changes::default();
        if self.elapsed_ms != 0 {
            self.rewind(&mut changes);
        }
        self.transition(PlaybackState::Stopped, &mut changes);
        changes
    }

    /// Jump within the current track; negative or overlong positions clamp
    pub fn seek(&mut self, position_ms: i64) -> Result<Changes> {
        let duration = self
            .queue
            .current()
            .map(|entry| entry.track.duration_ms)
            .ok_or(Error::EmptyQueue)?;
        self.elapsed_ms = u64::try_from(position_ms).unwrap_or(0).min(duration);
        Ok(Changes {
            seeked: true,
            ..Changes::default()
        })
    }

    pub fn skip(&mut self) -> Result<Changes> {
        self.step(Direction::Forward)
    }

    pub fn previous(&mut self) -> Result<Changes> {
        self.step(Direction::Backward)
    }

    fn step(&mut self, direction: Direction) -> Result<Changes> {
        let was_playing = self.state.is_playing();
        let outcome = self.queue.advance(direction)?;
        let mut changes = Changes::default();

        let resume = if was_playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };

        match outcome {
            Advance::Moved(_) | Advance::Wrapped(_) => {
                self.enter_track(&mut changes);
                self.transition(resume, &mut changes);
            }
            Advance::Replay(_) => {
                self.multi_repeat = 0;
                self.rewind(&mut changes);
                self.transition(resume, &mut changes);
            }
            Advance::RestartCurrent => self.rewind(&mut changes),
            Advance::EndOfQueue => {
                self.elapsed_ms = 0;
                self.transition(PlaybackState::Stopped, &mut changes);
            }
        }
        Ok(changes)
    }

    pub fn change_song(&mut self, index: usize) -> Result<Changes> {
        self.queue.jump(index)?;
        let mut changes = Changes::default();
        self.enter_track(&mut changes);
        self.transition(PlaybackState::Playing, &mut changes);
        Ok(changes)
    }

    /// The backend finished the current track on its own
    pub fn track_completed(&mut self) -> Result<Changes> {
        if self.queue.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let mut changes = Changes::default();

        if self.queue.repeat_mode() == RepeatMode::One {
            self.rewind(&mut changes);
            self.transition(PlaybackState::Playing, &mut changes);
            return Ok(changes);
        }
        if self.multi_repeat > 0 {
            self.multi_repeat -= 1;
            self.rewind(&mut changes);
            self.transition(PlaybackState::Playing, &mut changes);
            return Ok(changes);
        }

        match self.queue.advance(Direction::Forward)? {
            outcome if outcome.changes_track() => {
                self.enter_track(&mut changes);
                self.transition(PlaybackState::Playing, &mut changes);
            }
            _ => {
                self.elapsed_ms = 0;
                self.transition(PlaybackState::Stopped, &mut changes);
            }
        }
        Ok(changes)
    }

    /// Position report from the backend; never changes state
    pub fn report_position(&mut self, position_ms: u64) -> Changes {
        if let Some(entry) = self.queue.current() {
            self.elapsed_ms = position_ms.min(entry.track.duration_ms);
        }
        Changes::default()
    }

    /// Sleep deadline reached: pause if playing and clear the deadline
    pub fn sleep_expired(&mut self) -> Changes {
        self.sleep_deadline = None;
        self.pause()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jockey_common::Track;
    use std::sync::Arc;

    fn tracks(n: usize) -> Vec<TrackRef> {
        (0..n)
            .map(|i| Arc::new(Track::new(format!("{i}.ogg"), format!("T{i}"), 200_000)))
            .collect()
    }

    fn player(n: usize, start: usize) -> Player {
        let mut player = Player::new(Queue::with_seed(1));
        player.set_queue(tracks(n), start).unwrap();
        player
    }

    #[test]
    fn test_play_on_empty_queue_fails() {
        let mut player = Player::default();
        assert!(matches!(player.play(), Err(Error::EmptyQueue)));
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_play_pause_transitions() {
        let mut player = player(2, 0);
        let changes = player.play().unwrap();
        assert_eq!(
            changes.state,
            Some((PlaybackState::Idle, PlaybackState::Playing))
        );

        // Already playing: no-op
        assert!(player.play().unwrap().is_empty());

        player.pause();
        assert_eq!(player.state(), PlaybackState::Paused);

        // Pause when not playing is a no-op
        assert!(player.pause().is_empty());
    }

    #[test]
    fn test_toggle_play() {
        let mut player = player(1, 0);
        player.toggle_play().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        player.toggle_play().unwrap();
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_stop_clears_elapsed() {
        let mut player = player(1, 0);
        player.play().unwrap();
        player.report_position(5_000);
        player.stop();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.elapsed_ms(), 0);
    }

    #[test]
    fn test_seek_clamps() {
        let mut player = player(1, 0);
        player.seek(-10).unwrap();
        assert_eq!(player.elapsed_ms(), 0);
        player.seek(10_000_000).unwrap();
        assert_eq!(player.elapsed_ms(), 200_000);
        player.seek(1_234).unwrap();
        assert_eq!(player.elapsed_ms(), 1_234);

        let mut empty = Player::default();
        assert!(matches!(empty.seek(0), Err(Error::EmptyQueue)));
    }

    #[test]
    fn test_skip_preserves_playing() {
        let mut player = player(3, 0);
        player.play().unwrap();
        player.seek(50_000).unwrap();

        let changes = player.skip().unwrap();
        assert!(changes.track_changed);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.queue().cursor(), Some(1));
        assert_eq!(player.elapsed_ms(), 0);
    }

    #[test]
    fn test_skip_when_not_playing_pauses_at_new_track() {
        let mut player = player(3, 0);
        player.skip().unwrap();
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.queue().cursor(), Some(1));
    }

    #[test]
    fn test_skip_at_end_stops_with_cursor_unchanged() {
        let mut player = player(3, 2);
        player.play().unwrap();
        let changes = player.skip().unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.queue().cursor(), Some(2));
        assert!(!changes.track_changed);
    }

    #[test]
    fn test_previous_at_start_restarts_current() {
        let mut player = player(3, 0);
        player.play().unwrap();
        player.seek(30_000).unwrap();

        let changes = player.previous().unwrap();
        assert!(changes.seeked);
        assert!(changes.state.is_none());
        assert_eq!(player.elapsed_ms(), 0);
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_change_song() {
        let mut player = player(3, 0);
        player.change_song(2).unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.queue().cursor(), Some(2));

        assert!(matches!(
            player.change_song(3),
            Err(Error::InvalidIndex { index: 3, len: 3 })
        ));
        assert_eq!(player.queue().cursor(), Some(2));
    }

    #[test]
    fn test_remove_current_while_playing_keeps_playing() {
        let mut player = player(3, 0);
        player.play().unwrap();
        let changes = player.remove(0).unwrap();
        assert!(changes.track_changed);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.current().unwrap().track.title, "T1");
    }

    #[test]
    fn test_remove_last_current_stops() {
        let mut player = player(2, 1);
        player.play().unwrap();
        player.remove(1).unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.queue().cursor(), Some(0));
    }

    #[test]
    fn test_remove_only_entry_goes_idle() {
        let mut player = player(1, 0);
        player.play().unwrap();
        player.remove(0).unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.queue().cursor(), None);
    }

    #[test]
    fn test_stopped_empty_queue_refilled_becomes_idle() {
        let mut player = player(1, 0);
        player.stop();
        player.set_queue(Vec::new(), 0).unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);

        player.stop();
        assert_eq!(player.state(), PlaybackState::Stopped);
        player.insert_last(tracks(1).remove(0));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.queue().cursor(), Some(0));
    }

    #[test]
    fn test_track_completed_advances_then_stops() {
        let mut player = player(2, 0);
        player.play().unwrap();

        player.track_completed().unwrap();
        assert_eq!(player.queue().cursor(), Some(1));
        assert_eq!(player.state(), PlaybackState::Playing);

        player.track_completed().unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.queue().cursor(), Some(1));
    }

    #[test]
    fn test_track_completed_honours_multi_repeat() {
        let mut player = player(2, 0);
        player.play().unwrap();
        player.set_multi_repeat(2);

        player.track_completed().unwrap();
        player.track_completed().unwrap();
        assert_eq!(player.queue().cursor(), Some(0));
        assert_eq!(player.multi_repeat(), 0);

        player.track_completed().unwrap();
        assert_eq!(player.queue().cursor(), Some(1));
    }

    #[test]
    fn test_track_completed_repeat_one_replays() {
        let mut player = player(2, 0);
        player.set_repeat_mode(RepeatMode::One);
        player.play().unwrap();
        player.report_position(100_000);

        let changes = player.track_completed().unwrap();
        assert!(changes.seeked);
        assert_eq!(player.queue().cursor(), Some(0));
        assert_eq!(player.elapsed_ms(), 0);
    }

    #[test]
    fn test_user_skip_clears_multi_repeat() {
        let mut player = player(3, 0);
        player.set_multi_repeat(3);
        player.skip().unwrap();
        assert_eq!(player.multi_repeat(), 0);
    }

    #[test]
    fn test_sleep_expired_pauses() {
        let mut player = player(1, 0);
        player.play().unwrap();
        player.set_sleep_deadline(Some(Utc::now()));
        player.sleep_expired();
        assert_eq!(player.state(), PlaybackState::Paused);
        assert!(player.sleep_deadline().is_none());
    }

    #[test]
    fn test_restored_player_never_resumes_playing() {
        let mut queue = Queue::new();
        queue.set_queue(tracks(2), 1).unwrap();
        let player = Player::restored(queue, PlaybackState::Playing, 999_999);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.elapsed_ms(), 200_000);
    }
}
