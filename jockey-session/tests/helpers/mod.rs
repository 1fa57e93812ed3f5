//! Shared fixtures for jockey-session integration tests
//!
//! - RecordingBackend: records every backend call, optionally fails loads
//! - ScriptedArtwork: artwork source with per-title delay and failure
//! - Event and snapshot waiters with a timeout

#![allow(dead_code)]

use jockey_common::events::SessionEvent;
use jockey_common::{Track, TrackRef};
use jockey_session::error::{Error, Result};
use jockey_session::playback::{ArtworkImage, ArtworkSource, PlaybackBackend};
use jockey_session::{SessionHandle, Snapshot};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(2);

/// Grace long enough that no test outside the lifecycle suite sees a teardown
pub const LONG_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Acquire,
    Release,
    Load { title: String, position_ms: u64 },
    Play,
    Pause,
    Seek(u64),
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    fail_loads: Arc<AtomicBool>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &BackendCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PlaybackBackend for RecordingBackend {
    fn acquire(&mut self) -> Result<()> {
        self.record(BackendCall::Acquire);
        Ok(())
    }

    fn release(&mut self) {
        self.record(BackendCall::Release);
    }

    fn load(&mut self, track: &Track, position_ms: u64) -> Result<()> {
        self.record(BackendCall::Load {
            title: track.title.clone(),
            position_ms,
        });
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!("cannot open {}", track.location)));
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(BackendCall::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(BackendCall::Pause);
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.record(BackendCall::Seek(position_ms));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record(BackendCall::Stop);
        Ok(())
    }
}

/// Artwork source keyed on track titles
///
/// Titles starting with `slow` take `delay` to load; titles starting with
/// `broken` fail; titles starting with `bare` have no artwork.
#[derive(Debug, Clone)]
pub struct ScriptedArtwork {
    pub delay: Duration,
}

impl ArtworkSource for ScriptedArtwork {
    fn fetch(&self, track: &Track) -> Result<Option<ArtworkImage>> {
        if track.title.starts_with("slow") {
            std::thread::sleep(self.delay);
        }
        if track.title.starts_with("broken") {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("corrupt image for {}", track.title),
            )));
        }
        if track.title.starts_with("bare") {
            return Ok(None);
        }
        Ok(Some(ArtworkImage {
            track_id: track.id,
            source: PathBuf::from(format!("/art/{}.jpg", track.title)),
            bytes: Arc::from(track.title.as_bytes()),
        }))
    }
}

pub fn track(title: &str, duration_ms: u64) -> TrackRef {
    Arc::new(
        Track::new(format!("/music/{title}.flac"), title, duration_ms).with_artist("Test Artist"),
    )
}

pub fn tracks(titles: &[&str]) -> Vec<TrackRef> {
    titles.iter().map(|t| track(t, 180_000)).collect()
}

/// Receive events until one matches `pred`
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    mut pred: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Wait until the published snapshot satisfies `pred`
pub async fn wait_for_snapshot<F>(session: &SessionHandle, pred: F) -> Arc<Snapshot>
where
    F: FnMut(&Arc<Snapshot>) -> bool,
{
    let mut rx = session.watch();
    let snapshot = timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for snapshot")
        .expect("session engine stopped");
    Arc::clone(&snapshot)
}

/// True if no event matching `pred` arrives within `window`
pub async fn no_event_within<F>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    window: Duration,
    mut pred: F,
) -> bool
where
    F: FnMut(&SessionEvent) -> bool,
{
    timeout(window, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    })
    .await
    .is_err()
}
