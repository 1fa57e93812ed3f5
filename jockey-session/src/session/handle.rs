//! Public command and subscription API of a running session engine

use crate::error::{Error, Result};
use crate::playback::{Artwork, QueueEntry};
use crate::session::binding::{Binding, BindingId, BindingRegistry};
use crate::session::broadcaster::Broadcaster;
use crate::session::command::{Command, Message};
use crate::session::snapshot::Snapshot;
use jockey_common::events::{EventBus, RepeatMode, SessionEvent};
use jockey_common::TrackRef;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;

/// Cloneable handle to the session engine
///
/// Commands are queued to the engine task and resolve once the command has
/// been applied and the resulting snapshot published. A failed command
/// leaves the session untouched.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    broadcaster: Arc<Broadcaster>,
    bindings: Arc<BindingRegistry>,
    events: EventBus,
}

impl SessionHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Message>,
        broadcaster: Arc<Broadcaster>,
        bindings: Arc<BindingRegistry>,
        events: EventBus,
    ) -> Self {
        Self {
            tx,
            broadcaster,
            bindings,
            events,
        }
    }

    pub(crate) fn bindings(&self) -> &BindingRegistry {
        &self.bindings
    }

    async fn request(&self, command: Command) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Message::Request { command, reply })
            .map_err(|_| Error::EngineStopped)?;
        response.await.map_err(|_| Error::EngineStopped)?
    }

    // ---- queue ----

    /// Replace the queue with `tracks`, cursor on `start_index`
    pub async fn set_queue(&self, tracks: Vec<TrackRef>, start_index: usize) -> Result<()> {
        self.request(Command::SetQueue {
            tracks,
            start_index,
        })
        .await
    }

    pub async fn insert_next(&self, track: TrackRef) -> Result<()> {
        self.request(Command::InsertNext(track)).await
    }

    pub async fn insert_last(&self, track: TrackRef) -> Result<()> {
        self.request(Command::InsertLast(track)).await
    }

    pub async fn remove(&self, index: usize) -> Result<()> {
        self.request(Command::Remove(index)).await
    }

    pub async fn move_entry(&self, from: usize, to: usize) -> Result<()> {
        self.request(Command::Move { from, to }).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.request(Command::SetShuffle(enabled)).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.request(Command::SetRepeatMode(mode)).await
    }

    /// Replay the current track `count` more times before advancing
    pub async fn set_multi_repeat(&self, count: u32) -> Result<()> {
        self.request(Command::SetMultiRepeat(count)).await
    }

    /// Pause playback after `duration`; `None` cancels a pending timer
    pub async fn set_sleep_timer(&self, duration: Option<Duration>) -> Result<()> {
        self.request(Command::SetSleepTimer(duration)).await
    }

    // ---- transport ----

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.request(Command::TogglePlay).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Seek within the current track; the position is clamped to the track
    pub async fn seek(&self, position_ms: i64) -> Result<()> {
        self.request(Command::Seek(position_ms)).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(Command::Skip).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.request(Command::Previous).await
    }

    /// Jump to queue index `index` and start playing it
    pub async fn change_song(&self, index: usize) -> Result<()> {
        self.request(Command::ChangeSong(index)).await
    }

    /// Backend report: the current track played to its end
    pub async fn track_completed(&self) -> Result<()> {
        self.request(Command::TrackCompleted).await
    }

    /// Backend report: playback position within the current track
    pub async fn report_position(&self, position_ms: u64) -> Result<()> {
        self.request(Command::ReportPosition(position_ms)).await
    }

    /// Write the session to the store now
    pub async fn persist(&self) -> Result<()> {
        self.request(Command::Persist).await
    }

    /// Persist, release the backend and stop the engine task
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Message::Shutdown { reply })
            .map_err(|_| Error::EngineStopped)?;
        response.await.map_err(|_| Error::EngineStopped)?
    }

    // ---- bindings ----

    /// Take a lease keeping the engine resident
    pub fn bind(&self) -> Binding {
        Binding::new(self.bindings.acquire(), self.clone())
    }

    /// Release a lease by id
    pub fn unbind(&self, id: BindingId) -> Result<()> {
        self.bindings.release(id)
    }

    pub fn live_bindings(&self) -> usize {
        self.bindings.live_count()
    }

    // ---- observation ----

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.broadcaster.current()
    }

    pub fn now_playing(&self) -> Option<QueueEntry> {
        self.snapshot().now_playing().cloned()
    }

    pub fn queue_position(&self) -> Option<usize> {
        self.snapshot().queue_position
    }

    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.broadcaster.watch()
    }

    pub fn subscribe(&self) -> WatchStream<Arc<Snapshot>> {
        self.broadcaster.snapshots()
    }

    pub fn subscribe_now_playing(&self) -> WatchStream<Option<QueueEntry>> {
        self.broadcaster.now_playing()
    }

    pub fn subscribe_playing(&self) -> WatchStream<bool> {
        self.broadcaster.playing()
    }

    pub fn subscribe_queue(&self) -> WatchStream<Arc<[QueueEntry]>> {
        self.broadcaster.queue()
    }

    pub fn subscribe_artwork(&self) -> WatchStream<Artwork> {
        self.broadcaster.artwork()
    }

    pub fn subscribe_queue_position(&self) -> WatchStream<Option<usize>> {
        self.broadcaster.queue_position()
    }

    /// Diagnostics and transition events
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }
}
