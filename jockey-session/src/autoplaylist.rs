//! Automatic playlist materialization
//!
//! Keeps the membership of one [`RuleSet`] current. Evaluation runs on the
//! blocking pool whenever the catalog is refreshed or the rules are edited;
//! an evaluation overtaken by a newer change is discarded and restarted
//! against the latest inputs.

use crate::rules::{evaluate, RuleSet};
use jockey_common::events::{DiagnosticSource, EventBus, SessionEvent};
use jockey_common::{Catalog, CatalogHandle, TrackRef};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

/// Materialized auto-playlist
pub struct AutoPlaylist {
    rules_tx: watch::Sender<Arc<RuleSet>>,
    members_rx: watch::Receiver<Arc<[TrackRef]>>,
    task: JoinHandle<()>,
}

impl AutoPlaylist {
    /// Start materializing `rules` over `catalog`
    pub fn spawn(rules: RuleSet, catalog: &CatalogHandle, events: EventBus) -> Self {
        let (rules_tx, rules_rx) = watch::channel(Arc::new(rules));
        let empty: Arc<[TrackRef]> = Arc::from(Vec::new());
        let (members_tx, members_rx) = watch::channel(empty);
        let task = tokio::spawn(materialize(catalog.subscribe(), rules_rx, members_tx, events));
        Self {
            rules_tx,
            members_rx,
            task,
        }
    }

    /// Replace the rule set; membership is re-evaluated in the background
    pub fn update_rules(&self, rules: RuleSet) {
        self.rules_tx.send_replace(Arc::new(rules));
    }

    pub fn rules(&self) -> Arc<RuleSet> {
        self.rules_tx.borrow().clone()
    }

    /// Latest materialized membership
    pub fn members(&self) -> Arc<[TrackRef]> {
        self.members_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<[TrackRef]>> {
        self.members_rx.clone()
    }

    pub fn subscribe(&self) -> WatchStream<Arc<[TrackRef]>> {
        WatchStream::new(self.members_rx.clone())
    }
}

impl Drop for AutoPlaylist {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn materialize(
    mut catalog_rx: watch::Receiver<Arc<Catalog>>,
    mut rules_rx: watch::Receiver<Arc<RuleSet>>,
    members_tx: watch::Sender<Arc<[TrackRef]>>,
    events: EventBus,
) {
    loop {
        let catalog = catalog_rx.borrow_and_update().clone();
        let rules = rules_rx.borrow_and_update().clone();
        let playlist_id = rules.id;

        let job = tokio::task::spawn_blocking(move || evaluate(&rules, catalog.songs()));

        let superseded = tokio::select! {
            result = job => {
                match result {
                    Ok(members) => {
                        let length = members.len();
                        members_tx.send_replace(members.into());
                        events.emit_lossy(SessionEvent::AutoPlaylistUpdated {
                            playlist_id,
                            length,
                            timestamp: chrono::Utc::now(),
                        });
                    }
                    Err(e) => {
                        warn!("Auto-playlist evaluation failed: {}", e);
                        events.emit_lossy(SessionEvent::diagnostic(
                            DiagnosticSource::AutoPlaylist,
                            e.to_string(),
                        ));
                    }
                }
                false
            }
            changed = catalog_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                true
            }
            changed = rules_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                true
            }
        };

        if superseded {
            debug!("Auto-playlist {} inputs changed mid-evaluation", playlist_id);
            continue;
        }

        tokio::select! {
            changed = catalog_rx.changed() => if changed.is_err() { return },
            changed = rules_rx.changed() => if changed.is_err() { return },
        }
    }
}
