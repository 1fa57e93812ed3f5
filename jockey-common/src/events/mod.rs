//! Event types for the Jockey event system
//!
//! Provides the session event definitions and the EventBus used as the
//! diagnostic side channel next to the snapshot subscriptions.

mod playback_types;
mod queue_types;

pub use playback_types::{PlaybackState, RepeatMode};
pub use queue_types::{DiagnosticSource, QueueChangeTrigger};

use crate::track::{PlaylistId, TrackId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Session event types
///
/// Events are broadcast via EventBus and can be serialized for logging or
/// forwarding to remote observers. Snapshot consumers do not need them: the
/// snapshot subscriptions carry the full state. Events exist for observers
/// that care about transitions and for failures that must not corrupt the
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Playback state changed
    ///
    /// Triggers:
    /// - Media controls: Update play/pause button
    /// - Widgets: Refresh play indicator
    PlaybackStateChanged {
        /// Playback state before change
        old_state: PlaybackState,
        /// Playback state after change
        new_state: PlaybackState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Track under the cursor changed
    TrackChanged {
        /// New current track (None when the queue became empty)
        track_id: Option<TrackId>,
        /// Cursor position in the active queue order
        queue_position: Option<usize>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents or order changed
    QueueChanged {
        /// Why queue changed
        trigger: QueueChangeTrigger,
        /// Queue length after the change
        length: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Live binding count dropped to zero and the backend was released
    EngineReleased {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Backend reacquired and session state reloaded into it
    EngineRehydrated {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sleep timer fired and paused playback
    SleepTimerExpired {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Automatic playlist membership re-materialized
    AutoPlaylistUpdated {
        playlist_id: PlaylistId,
        /// Number of member tracks after evaluation
        length: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Non-fatal failure reported out-of-band
    ///
    /// Artwork fetch failures, unreadable catalog, backend errors. The
    /// snapshot is never altered to carry these.
    Diagnostic {
        source: DiagnosticSource,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Build a diagnostic event stamped with the current time
    pub fn diagnostic(source: DiagnosticSource, message: impl Into<String>) -> Self {
        SessionEvent::Diagnostic {
            source,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Central event distribution bus for session events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use jockey_common::events::{EventBus, SessionEvent, PlaybackState};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(SessionEvent::PlaybackStateChanged {
///     old_state: PlaybackState::Paused,
///     new_state: PlaybackState::Playing,
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(100);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(100);
        let event = SessionEvent::EngineReleased {
            timestamp: chrono::Utc::now(),
        };

        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        let event = SessionEvent::PlaybackStateChanged {
            old_state: PlaybackState::Paused,
            new_state: PlaybackState::Playing,
            timestamp: chrono::Utc::now(),
        };

        assert!(bus.emit(event).is_ok());

        match rx.recv().await.unwrap() {
            SessionEvent::PlaybackStateChanged {
                old_state,
                new_state,
                ..
            } => {
                assert_eq!(old_state, PlaybackState::Paused);
                assert_eq!(new_state, PlaybackState::Playing);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_eventbus_emit_lossy() {
        let bus = EventBus::new(10);
        // Should not panic even without subscribers
        bus.emit_lossy(SessionEvent::diagnostic(DiagnosticSource::Artwork, "missing"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SessionEvent::diagnostic(DiagnosticSource::Catalog, "unreadable");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Diagnostic");
        assert_eq!(json["source"], "Catalog");
        assert_eq!(json["message"], "unreadable");
    }

    #[test]
    fn test_playback_state_round_trips_through_str() {
        for state in [
            PlaybackState::Idle,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Stopped,
        ] {
            assert_eq!(state.to_string().parse::<PlaybackState>().unwrap(), state);
        }
        assert!("bogus".parse::<PlaybackState>().is_err());
    }

    #[test]
    fn test_repeat_mode_parse() {
        assert_eq!("all".parse::<RepeatMode>().unwrap(), RepeatMode::All);
        assert_eq!(RepeatMode::default(), RepeatMode::Off);
        assert!("twice".parse::<RepeatMode>().is_err());
    }
}
