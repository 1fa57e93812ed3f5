//! Snapshot and projection publishing
//!
//! One `watch` channel for the full snapshot plus one per projection. The
//! engine task is the only writer. Projections use `send_if_modified` so a
//! subscriber to `playing` is not woken when only the elapsed time moved.
//!
//! Every subscription is a [`WatchStream`]: it yields the current value
//! first, then later values in publish order. A slow consumer may skip
//! intermediate values but never goes backwards.
//!
//! The full snapshot is replaced before any projection, so a consumer woken
//! by a projection always finds [`Broadcaster::current`] at least as new.

use crate::playback::{Artwork, QueueEntry};
use crate::session::snapshot::Snapshot;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub struct Broadcaster {
    snapshot: watch::Sender<Arc<Snapshot>>,
    now_playing: watch::Sender<Option<QueueEntry>>,
    playing: watch::Sender<bool>,
    queue: watch::Sender<Arc<[QueueEntry]>>,
    artwork: watch::Sender<Artwork>,
    queue_position: watch::Sender<Option<usize>>,
}

/// Replace `slot` only when the new value differs
fn update<T: PartialEq>(sender: &watch::Sender<T>, value: T) {
    sender.send_if_modified(|slot| {
        if *slot == value {
            false
        } else {
            *slot = value;
            true
        }
    });
}

impl Broadcaster {
    pub fn new(initial: Snapshot) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(initial.clone()));
        let (now_playing, _) = watch::channel(initial.now_playing().cloned());
        let (playing, _) = watch::channel(initial.is_playing());
        let (queue, _) = watch::channel(initial.queue.clone());
        let (artwork, _) = watch::channel(initial.artwork.clone());
        let (queue_position, _) = watch::channel(initial.queue_position);
        Self {
            snapshot,
            now_playing,
            playing,
            queue,
            artwork,
            queue_position,
        }
    }

    /// Publish a new snapshot and refresh every projection whose slice changed
    pub(crate) fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        self.snapshot.send_replace(Arc::clone(&snapshot));
        update(&self.now_playing, snapshot.now_playing().cloned());
        update(&self.playing, snapshot.is_playing());
        update(&self.queue, snapshot.queue.clone());
        update(&self.artwork, snapshot.artwork.clone());
        update(&self.queue_position, snapshot.queue_position);
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    /// Raw receiver for consumers that want `changed()`/`borrow()` directly
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    pub fn snapshots(&self) -> WatchStream<Arc<Snapshot>> {
        WatchStream::new(self.snapshot.subscribe())
    }

    pub fn now_playing(&self) -> WatchStream<Option<QueueEntry>> {
        WatchStream::new(self.now_playing.subscribe())
    }

    pub fn playing(&self) -> WatchStream<bool> {
        WatchStream::new(self.playing.subscribe())
    }

    pub fn queue(&self) -> WatchStream<Arc<[QueueEntry]>> {
        WatchStream::new(self.queue.subscribe())
    }

    pub fn artwork(&self) -> WatchStream<Artwork> {
        WatchStream::new(self.artwork.subscribe())
    }

    pub fn queue_position(&self) -> WatchStream<Option<usize>> {
        WatchStream::new(self.queue_position.subscribe())
    }
}
