//! Stored playlists with revision tracking
//!
//! Every mutation bumps the playlist's revision. An [`UndoToken`] remembers
//! the exact contents and the revision its own mutation produced; undo is
//! refused once anything else touched the playlist.

use crate::collision::{self, CollisionReport, Resolution};
use crate::error::{Error, Result};
use jockey_common::{Catalog, PlaylistId, TrackRef};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct StoredPlaylist {
    name: String,
    contents: Vec<TrackRef>,
    revision: u64,
}

/// Single-use handle restoring a playlist to its state before a mutation
///
/// Not `Clone`: undoing consumes the token.
#[derive(Debug)]
#[must_use = "dropping the token discards the undo"]
pub struct UndoToken {
    playlist_id: PlaylistId,
    previous: Vec<TrackRef>,
    /// Revision right after the mutation this token undoes
    revision: u64,
}

impl UndoToken {
    pub fn playlist_id(&self) -> PlaylistId {
        self.playlist_id
    }
}

/// Result of adding tracks with a chosen resolution
#[derive(Debug)]
pub struct AddOutcome {
    pub added: usize,
    /// `None` for `Cancel`
    pub undo: Option<UndoToken>,
}

#[derive(Debug, Default)]
pub struct PlaylistStore {
    playlists: RwLock<HashMap<PlaylistId, StoredPlaylist>>,
}

impl PlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with the catalog's playlists
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let playlists = catalog
            .playlists()
            .iter()
            .map(|p| {
                let contents = catalog.playlist_songs(p.id).unwrap_or_default();
                (
                    p.id,
                    StoredPlaylist {
                        name: p.name.clone(),
                        contents,
                        revision: 0,
                    },
                )
            })
            .collect::<HashMap<_, _>>();
        info!("Playlist store loaded {} playlists", playlists.len());
        Self {
            playlists: RwLock::new(playlists),
        }
    }

    pub async fn create(&self, name: impl Into<String>, contents: Vec<TrackRef>) -> PlaylistId {
        let id = PlaylistId::new();
        self.playlists.write().await.insert(
            id,
            StoredPlaylist {
                name: name.into(),
                contents,
                revision: 0,
            },
        );
        id
    }

    pub async fn name(&self, id: PlaylistId) -> Result<String> {
        let playlists = self.playlists.read().await;
        let playlist = playlists.get(&id).ok_or(Error::PlaylistNotFound(id))?;
        Ok(playlist.name.clone())
    }

    pub async fn contents(&self, id: PlaylistId) -> Result<Vec<TrackRef>> {
        let playlists = self.playlists.read().await;
        let playlist = playlists.get(&id).ok_or(Error::PlaylistNotFound(id))?;
        Ok(playlist.contents.clone())
    }

    pub async fn revision(&self, id: PlaylistId) -> Result<u64> {
        let playlists = self.playlists.read().await;
        let playlist = playlists.get(&id).ok_or(Error::PlaylistNotFound(id))?;
        Ok(playlist.revision)
    }

    /// Replace contents outright (playlist editor save)
    pub async fn replace(&self, id: PlaylistId, contents: Vec<TrackRef>) -> Result<u64> {
        let mut playlists = self.playlists.write().await;
        let playlist = playlists.get_mut(&id).ok_or(Error::PlaylistNotFound(id))?;
        playlist.contents = contents;
        playlist.revision += 1;
        Ok(playlist.revision)
    }

    /// Duplicate report for adding `candidates` to playlist `id`
    pub async fn check(&self, id: PlaylistId, candidates: &[TrackRef]) -> Result<CollisionReport> {
        let playlists = self.playlists.read().await;
        let playlist = playlists.get(&id).ok_or(Error::PlaylistNotFound(id))?;
        Ok(collision::resolve(&playlist.contents, candidates))
    }

    /// Add `candidates` to playlist `id` using `resolution`
    pub async fn add(
        &self,
        id: PlaylistId,
        candidates: &[TrackRef],
        resolution: Resolution,
    ) -> Result<AddOutcome> {
        let mut playlists = self.playlists.write().await;
        let playlist = playlists.get_mut(&id).ok_or(Error::PlaylistNotFound(id))?;

        if resolution == Resolution::Cancel {
            return Ok(AddOutcome {
                added: 0,
                undo: None,
            });
        }

        let (contents, added) = collision::apply(&playlist.contents, candidates, resolution);
        let previous = std::mem::replace(&mut playlist.contents, contents);
        playlist.revision += 1;
        debug!(
            "Added {} tracks to playlist {} ({:?}), revision {}",
            added, id, resolution, playlist.revision
        );

        Ok(AddOutcome {
            added,
            undo: Some(UndoToken {
                playlist_id: id,
                previous,
                revision: playlist.revision,
            }),
        })
    }

    /// Restore the contents captured by `token`
    pub async fn undo(&self, token: UndoToken) -> Result<()> {
        let id = token.playlist_id;
        let mut playlists = self.playlists.write().await;
        let playlist = playlists.get_mut(&id).ok_or(Error::PlaylistNotFound(id))?;

        if playlist.revision != token.revision {
            return Err(Error::StaleUndo(id));
        }
        playlist.contents = token.previous;
        playlist.revision += 1;
        debug!("Undid change to playlist {}, revision {}", id, playlist.revision);
        Ok(())
    }
}
