//! Playback backend seam
//!
//! The engine never decodes or renders audio itself. It drives a
//! [`PlaybackBackend`] with the current track, transport commands and seek
//! positions, and releases it when no binding holds the session.

use crate::error::Result;
use jockey_common::Track;
use tracing::debug;

/// Audio output collaborator driven by the session engine
///
/// Calls happen on the engine owner task, one at a time. Implementations
/// should hand long-running work to their own threads and return quickly.
/// Errors are reported as diagnostics; they never fail the command that
/// triggered them.
pub trait PlaybackBackend: Send + 'static {
    /// Acquire the output resource (device, decoder, media session)
    fn acquire(&mut self) -> Result<()>;

    /// Release everything acquired; the engine may call `acquire` again later
    fn release(&mut self);

    /// Prepare `track` for playback starting at `position_ms`
    fn load(&mut self, track: &Track, position_ms: u64) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn seek(&mut self, position_ms: u64) -> Result<()>;

    /// Stop output and unload the current track
    fn stop(&mut self) -> Result<()>;
}

/// Backend that only logs what it is asked to do
///
/// Used by the CLI and in headless deployments where another process owns
/// the audio device.
#[derive(Debug, Default)]
pub struct NullBackend {
    acquired: bool,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl PlaybackBackend for NullBackend {
    fn acquire(&mut self) -> Result<()> {
        debug!("NullBackend: acquire");
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        debug!("NullBackend: release");
        self.acquired = false;
    }

    fn load(&mut self, track: &Track, position_ms: u64) -> Result<()> {
        debug!(
            "NullBackend: load {} ({}) at {}ms",
            track.title, track.id, position_ms
        );
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        debug!("NullBackend: play");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        debug!("NullBackend: pause");
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        debug!("NullBackend: seek to {}ms", position_ms);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        debug!("NullBackend: stop");
        Ok(())
    }
}
