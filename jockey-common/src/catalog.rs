//! Read-only music catalog
//!
//! The catalog is owned by the storage/indexing collaborator; the session
//! engine only reads it. Refreshes are published through [`CatalogHandle`],
//! a watch channel that always holds the latest catalog and notifies
//! subscribers when a refresh lands.

use crate::track::{Playlist, PlaylistId, Track, TrackId, TrackRef};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Songs and playlists known to the library at one point in time
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    songs: Vec<TrackRef>,
    playlists: Vec<Playlist>,
    index: HashMap<TrackId, usize>,
}

/// On-disk catalog representation
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    songs: Vec<Track>,
    #[serde(default)]
    playlists: Vec<Playlist>,
}

impl Catalog {
    pub fn new(songs: Vec<Track>, playlists: Vec<Playlist>) -> Self {
        let songs: Vec<TrackRef> = songs.into_iter().map(Arc::new).collect();
        let index = songs
            .iter()
            .enumerate()
            .map(|(i, track)| (track.id, i))
            .collect();
        Self {
            songs,
            playlists,
            index,
        }
    }

    /// Load a catalog exported as JSON (`{"songs": [...], "playlists": [...]}`)
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        info!(
            "Loaded catalog from {}: {} songs, {} playlists",
            path.display(),
            file.songs.len(),
            file.playlists.len()
        );
        Ok(Self::new(file.songs, file.playlists))
    }

    /// All songs in catalog default order
    pub fn songs(&self) -> &[TrackRef] {
        &self.songs
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn song(&self, id: TrackId) -> Option<&TrackRef> {
        self.index.get(&id).map(|&i| &self.songs[i])
    }

    pub fn playlist(&self, id: PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// Resolve a playlist's member ids to tracks, skipping ids no longer in the catalog
    pub fn playlist_songs(&self, id: PlaylistId) -> Option<Vec<TrackRef>> {
        self.playlist(id).map(|playlist| {
            playlist
                .track_ids
                .iter()
                .filter_map(|track_id| self.song(*track_id).cloned())
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Publisher side of the catalog change notification
#[derive(Clone)]
pub struct CatalogHandle {
    tx: Arc<watch::Sender<Arc<Catalog>>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        let (tx, _) = watch::channel(Arc::new(catalog));
        Self { tx: Arc::new(tx) }
    }

    /// Current catalog
    pub fn current(&self) -> Arc<Catalog> {
        self.tx.borrow().clone()
    }

    /// Replace the catalog and notify every subscriber
    pub fn refresh(&self, catalog: Catalog) {
        info!("Catalog refreshed: {} songs", catalog.len());
        self.tx.send_replace(Arc::new(catalog));
    }

    /// Receiver that observes the current catalog and every later refresh
    pub fn subscribe(&self) -> watch::Receiver<Arc<Catalog>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_song_lookup_by_id() {
        let a = Track::new("a.mp3", "A", 1000);
        let b = Track::new("b.mp3", "B", 2000);
        let b_id = b.id;
        let catalog = Catalog::new(vec![a, b], vec![]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.song(b_id).unwrap().title, "B");
        assert!(catalog.song(TrackId::new()).is_none());
    }

    #[test]
    fn test_playlist_songs_skip_missing_ids() {
        let a = Track::new("a.mp3", "A", 1000);
        let a_id = a.id;
        let playlist = Playlist {
            id: PlaylistId::new(),
            name: "Mix".to_string(),
            track_ids: vec![a_id, TrackId::new()],
        };
        let playlist_id = playlist.id;
        let catalog = Catalog::new(vec![a], vec![playlist]);

        let songs = catalog.playlist_songs(playlist_id).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, a_id);
    }

    #[test]
    fn test_load_json_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"songs": [{{
                "id": "0b8f2c1e-2a1b-4f57-8f0c-5b0f4a7c9e01",
                "location": "/music/one.flac",
                "title": "One",
                "duration_ms": 60000,
                "date_added": "2021-05-01T12:00:00Z"
            }}]}}"#
        )
        .unwrap();

        let catalog = Catalog::load_json(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.songs()[0].title, "One");
        assert!(catalog.playlists().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_notifies_subscribers() {
        let handle = CatalogHandle::new(Catalog::default());
        let mut rx = handle.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        handle.refresh(Catalog::new(vec![Track::new("a", "A", 1)], vec![]));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
