//! Session engine owner task
//!
//! A single tokio task owns the [`Player`], the backend and the artwork
//! slot. Commands arrive over an unbounded mpsc channel and run one at a
//! time: validate, mutate, drive the backend, emit events, publish the
//! snapshot, reply. Nothing else mutates session state, so no locks guard
//! it.
//!
//! Resource lifecycle: when the live binding count drops to zero a teardown
//! is armed for the configured grace period. If it fires while the count is
//! still zero at the same epoch, the session is persisted and the backend
//! released. A later bind, or any command that needs the backend, acquires
//! it again and reloads the current track at the saved position.

use crate::db::{PersistedSession, SessionStore};
use crate::error::{Error, Result};
use crate::playback::{
    Artwork, ArtworkImage, ArtworkSource, Changes, NoArtwork, NullBackend, PlaybackBackend,
    Player, Queue,
};
use crate::session::binding::{BindingRegistry, LeaseState};
use crate::session::broadcaster::Broadcaster;
use crate::session::command::{Command, Message};
use crate::session::handle::SessionHandle;
use crate::session::snapshot::Snapshot;
use jockey_common::events::{DiagnosticSource, EventBus, PlaybackState, SessionEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default delay between the last unbind and backend release
pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default EventBus capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Configures and spawns a session engine
pub struct SessionEngineBuilder {
    backend: Box<dyn PlaybackBackend>,
    artwork_source: Arc<dyn ArtworkSource>,
    store: Option<SessionStore>,
    events: Option<EventBus>,
    player: Option<Player>,
    teardown_grace: Duration,
    shuffle_seed: Option<u64>,
}

impl Default for SessionEngineBuilder {
    fn default() -> Self {
        Self {
            backend: Box::new(NullBackend::new()),
            artwork_source: Arc::new(NoArtwork),
            store: None,
            events: None,
            player: None,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            shuffle_seed: None,
        }
    }
}

impl SessionEngineBuilder {
    pub fn backend(mut self, backend: impl PlaybackBackend) -> Self {
        self.backend = Box::new(backend);
        self
    }

    pub fn artwork_source(mut self, source: impl ArtworkSource) -> Self {
        self.artwork_source = Arc::new(source);
        self
    }

    /// Persist on teardown, shutdown and explicit `persist()`
    pub fn store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Start from an existing (typically restored) player
    pub fn player(mut self, player: Player) -> Self {
        self.player = Some(player);
        self
    }

    pub fn teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    /// Fixed shuffle seed for reproducible shuffle orders
    pub fn shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    /// Spawn the owner task on the current tokio runtime
    pub fn spawn(self) -> SessionHandle {
        let player = self.player.unwrap_or_else(|| {
            Player::new(match self.shuffle_seed {
                Some(seed) => Queue::with_seed(seed),
                None => Queue::new(),
            })
        });
        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(DEFAULT_EVENT_CAPACITY));
        let artwork = Artwork::Placeholder;
        let broadcaster = Arc::new(Broadcaster::new(Snapshot::capture(0, &player, &artwork)));
        let bindings = Arc::new(BindingRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = SessionEngine {
            player,
            artwork,
            sequence: 0,
            backend: self.backend,
            resident: false,
            loaded: false,
            released_once: false,
            artwork_source: self.artwork_source,
            artwork_generation: 0,
            artwork_task: None,
            store: self.store,
            events: events.clone(),
            broadcaster: Arc::clone(&broadcaster),
            bindings: Arc::clone(&bindings),
            teardown_grace: self.teardown_grace,
            teardown: None,
            sleep_at: None,
            self_tx: tx.downgrade(),
        };
        let leases = bindings.subscribe();
        tokio::spawn(engine.run(rx, leases));

        SessionHandle::new(tx, broadcaster, bindings, events)
    }
}

pub struct SessionEngine {
    player: Player,
    artwork: Artwork,
    sequence: u64,
    backend: Box<dyn PlaybackBackend>,
    /// Backend acquired
    resident: bool,
    /// Current track loaded into the backend
    loaded: bool,
    released_once: bool,
    artwork_source: Arc<dyn ArtworkSource>,
    artwork_generation: u64,
    artwork_task: Option<JoinHandle<()>>,
    store: Option<SessionStore>,
    events: EventBus,
    broadcaster: Arc<Broadcaster>,
    bindings: Arc<BindingRegistry>,
    teardown_grace: Duration,
    /// Armed teardown: lease epoch and deadline
    teardown: Option<(u64, Instant)>,
    sleep_at: Option<Instant>,
    self_tx: mpsc::WeakUnboundedSender<Message>,
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl SessionEngine {
    pub fn builder() -> SessionEngineBuilder {
        SessionEngineBuilder::default()
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Message>,
        mut leases: watch::Receiver<LeaseState>,
    ) {
        info!(
            "Session engine started ({} queued, state {})",
            self.player.queue().len(),
            self.player.state()
        );

        loop {
            let teardown_at = self.teardown.map(|(_, at)| at);
            let sleep_at = self.sleep_at;

            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Shutdown { reply }) => {
                        let result = self.shutdown().await;
                        let _ = reply.send(result);
                        return;
                    }
                    Some(message) => self.handle(message).await,
                    None => break,
                },
                changed = leases.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *leases.borrow_and_update();
                    self.on_lease_change(state);
                }
                _ = deadline(teardown_at) => self.teardown().await,
                _ = deadline(sleep_at) => self.sleep_timer_fired(),
            }

            self.arm_teardown_if_unbound();
        }

        debug!("All session handles dropped");
        if let Err(e) = self.shutdown().await {
            error!("Failed to persist session on shutdown: {}", e);
        }
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::Request { command, reply } => {
                let name = command.name();
                let result = self.execute(command).await;
                if let Err(e) = &result {
                    debug!("Command {} rejected: {}", name, e);
                }
                let _ = reply.send(result);
            }
            Message::ArtworkLoaded {
                entry_id,
                generation,
                result,
            } => self.artwork_loaded(entry_id, generation, result),
            Message::Shutdown { .. } => {}
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        debug!("Command: {}", command.name());
        let changes = match command {
            Command::SetQueue {
                tracks,
                start_index,
            } => self.player.set_queue(tracks, start_index)?,
            Command::InsertNext(track) => self.player.insert_next(track),
            Command::InsertLast(track) => self.player.insert_last(track),
            Command::Remove(index) => self.player.remove(index)?,
            Command::Move { from, to } => self.player.move_entry(from, to)?,
            Command::SetShuffle(enabled) => self.player.set_shuffle(enabled),
            Command::SetRepeatMode(mode) => self.player.set_repeat_mode(mode),
            Command::SetMultiRepeat(count) => self.player.set_multi_repeat(count),
            Command::SetSleepTimer(duration) => self.set_sleep_timer(duration)?,
            Command::Play => self.player.play()?,
            Command::Pause => self.player.pause(),
            Command::TogglePlay => self.player.toggle_play()?,
            Command::Stop => self.player.stop(),
            Command::Seek(position_ms) => self.player.seek(position_ms)?,
            Command::Skip => self.player.skip()?,
            Command::Previous => self.player.previous()?,
            Command::ChangeSong(index) => self.player.change_song(index)?,
            Command::TrackCompleted => self.player.track_completed()?,
            Command::ReportPosition(position_ms) => self.player.report_position(position_ms),
            Command::Persist => return self.persist().await,
        };

        self.apply(changes);
        Ok(())
    }

    fn set_sleep_timer(&mut self, duration: Option<Duration>) -> Result<Changes> {
        let Some(duration) = duration else {
            self.sleep_at = None;
            return Ok(self.player.set_sleep_deadline(None));
        };

        let out_of_range = || Error::InvalidArgument(format!("sleep timer {:?}", duration));
        let at = Instant::now().checked_add(duration).ok_or_else(out_of_range)?;
        let end = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| chrono::Utc::now().checked_add_signed(d))
            .ok_or_else(out_of_range)?;

        info!("Sleep timer set for {}", end);
        self.sleep_at = Some(at);
        Ok(self.player.set_sleep_deadline(Some(end)))
    }

    fn sleep_timer_fired(&mut self) {
        self.sleep_at = None;
        info!("Sleep timer expired");
        let changes = self.player.sleep_expired();
        self.events.emit_lossy(SessionEvent::SleepTimerExpired {
            timestamp: chrono::Utc::now(),
        });
        self.apply(changes);
    }

    /// Drive the backend, emit events and publish a new snapshot
    fn apply(&mut self, changes: Changes) {
        if changes.touches_backend() && !self.ensure_resident() {
            self.drive_backend(&changes);
        }
        self.emit_events(&changes);
        if changes.track_changed {
            self.request_artwork();
        }
        self.publish();
    }

    fn drive_backend(&mut self, changes: &Changes) {
        if !self.resident {
            return;
        }
        let state = self.player.state();

        if matches!(state, PlaybackState::Idle | PlaybackState::Stopped) {
            if self.loaded {
                self.loaded = false;
                let result = self.backend.stop();
                self.check_backend("stop", result);
            }
            return;
        }

        if changes.track_changed || !self.loaded {
            self.load_current();
            if !self.loaded {
                return;
            }
        } else if changes.seeked {
            let result = self.backend.seek(self.player.elapsed_ms());
            self.check_backend("seek", result);
        }

        if changes.state.is_some() || changes.track_changed {
            let (op, result) = if state.is_playing() {
                ("play", self.backend.play())
            } else {
                ("pause", self.backend.pause())
            };
            self.check_backend(op, result);
        }
    }

    /// Load the current track at the elapsed position
    fn load_current(&mut self) {
        let Some(track) = self.player.current().map(|e| Arc::clone(&e.track)) else {
            self.loaded = false;
            return;
        };
        let result = self.backend.load(&track, self.player.elapsed_ms());
        self.loaded = result.is_ok();
        self.check_backend("load", result);
    }

    fn check_backend(&self, op: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("Backend {} failed: {}", op, e);
            self.events.emit_lossy(SessionEvent::diagnostic(
                DiagnosticSource::Backend,
                format!("{} failed: {}", op, e),
            ));
        }
    }

    fn emit_events(&self, changes: &Changes) {
        let timestamp = chrono::Utc::now();
        if let Some((old_state, new_state)) = changes.state {
            self.events.emit_lossy(SessionEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp,
            });
        }
        if changes.track_changed {
            self.events.emit_lossy(SessionEvent::TrackChanged {
                track_id: self.player.current().map(|e| e.track.id),
                queue_position: self.player.queue().cursor(),
                timestamp,
            });
        }
        if let Some(trigger) = changes.queue {
            self.events.emit_lossy(SessionEvent::QueueChanged {
                trigger,
                length: self.player.queue().len(),
                timestamp,
            });
        }
    }

    fn publish(&mut self) {
        self.sequence += 1;
        self.broadcaster
            .publish(Snapshot::capture(self.sequence, &self.player, &self.artwork));
    }

    fn request_artwork(&mut self) {
        if let Some(task) = self.artwork_task.take() {
            task.abort();
        }
        self.artwork_generation += 1;
        self.artwork = Artwork::Placeholder;

        let Some(entry) = self.player.current().cloned() else {
            return;
        };
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        let source = Arc::clone(&self.artwork_source);
        let generation = self.artwork_generation;

        self.artwork_task = Some(tokio::spawn(async move {
            let track = Arc::clone(&entry.track);
            let result = match tokio::task::spawn_blocking(move || source.fetch(&track)).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => Err(format!("artwork task failed: {}", e)),
            };
            let _ = tx.send(Message::ArtworkLoaded {
                entry_id: entry.entry_id,
                generation,
                result,
            });
        }));
    }

    fn artwork_loaded(
        &mut self,
        entry_id: Uuid,
        generation: u64,
        result: std::result::Result<Option<ArtworkImage>, String>,
    ) {
        let current = self.player.current().map(|e| e.entry_id);
        if generation != self.artwork_generation || current != Some(entry_id) {
            debug!("Discarding stale artwork for entry {}", entry_id);
            return;
        }
        self.artwork_task = None;

        self.artwork = match result {
            Ok(Some(image)) => Artwork::Image(Arc::new(image)),
            Ok(None) => Artwork::Placeholder,
            Err(message) => {
                warn!("Artwork fetch failed for entry {}: {}", entry_id, message);
                self.events
                    .emit_lossy(SessionEvent::diagnostic(DiagnosticSource::Artwork, message));
                Artwork::Placeholder
            }
        };
        self.publish();
    }

    fn on_lease_change(&mut self, state: LeaseState) {
        if state.live > 0 {
            if self.teardown.take().is_some() {
                debug!("Teardown cancelled by new binding");
            }
            let _ = self.ensure_resident();
        } else if self.resident {
            debug!("No live bindings, teardown in {:?}", self.teardown_grace);
            self.teardown = Some((state.epoch, Instant::now() + self.teardown_grace));
        }
    }

    /// Backend in use with nobody bound (command-driven rehydrate)
    fn arm_teardown_if_unbound(&mut self) {
        if !self.resident || self.teardown.is_some() {
            return;
        }
        let state = self.bindings.state();
        if state.live == 0 {
            self.teardown = Some((state.epoch, Instant::now() + self.teardown_grace));
        }
    }

    async fn teardown(&mut self) {
        let Some((epoch, _)) = self.teardown.take() else {
            return;
        };
        let state = self.bindings.state();
        if state.live > 0 || state.epoch != epoch {
            debug!("Skipping stale teardown (epoch {} vs {})", epoch, state.epoch);
            return;
        }

        if let Err(e) = self.persist().await {
            warn!("Failed to persist session before release: {}", e);
            self.events.emit_lossy(SessionEvent::diagnostic(
                DiagnosticSource::Persistence,
                e.to_string(),
            ));
        }
        self.release_backend();
        self.events.emit_lossy(SessionEvent::EngineReleased {
            timestamp: chrono::Utc::now(),
        });
        info!("Session engine released (no live bindings)");
    }

    fn release_backend(&mut self) {
        if self.resident {
            self.backend.release();
            self.resident = false;
            self.loaded = false;
            self.released_once = true;
        }
    }

    /// Acquire the backend and reload the current track if released
    ///
    /// Returns true when the backend was just loaded from current state.
    fn ensure_resident(&mut self) -> bool {
        if self.resident {
            return false;
        }
        if let Err(e) = self.backend.acquire() {
            self.check_backend("acquire", Err(e));
            return false;
        }
        self.resident = true;

        let state = self.player.state();
        let reloaded = matches!(state, PlaybackState::Playing | PlaybackState::Paused);
        if reloaded {
            self.load_current();
            if state.is_playing() && self.loaded {
                let result = self.backend.play();
                self.check_backend("play", result);
            }
        }

        if self.released_once {
            info!(
                "Session engine rehydrated at {:?} ({}ms)",
                self.player.queue().cursor(),
                self.player.elapsed_ms()
            );
            self.events.emit_lossy(SessionEvent::EngineRehydrated {
                timestamp: chrono::Utc::now(),
            });
        }
        reloaded
    }

    /// Capture the session now; the returned future does not borrow the engine
    fn persist(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let job = self
            .store
            .clone()
            .map(|store| (store, PersistedSession::capture(&self.player)));
        async move {
            match job {
                Some((store, session)) => store.save(&session).await,
                None => Ok(()),
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("Session engine shutting down");
        if let Some(task) = self.artwork_task.take() {
            task.abort();
        }
        let result = self.persist().await;
        self.release_backend();
        result
    }
}
