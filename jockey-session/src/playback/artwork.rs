//! Cover artwork lookup
//!
//! Fetching runs on the blocking pool; the engine tags every request with
//! the queue entry and a generation number and drops results that arrive
//! after the current track moved on.

use crate::error::Result;
use jockey_common::{Track, TrackId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Image bytes for one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkImage {
    pub track_id: TrackId,
    /// File the bytes were read from
    pub source: PathBuf,
    pub bytes: Arc<[u8]>,
}

/// Artwork slot of the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Artwork {
    /// No artwork known (not loaded yet, none found, or fetch failed)
    #[default]
    Placeholder,
    Image(Arc<ArtworkImage>),
}

impl Artwork {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Artwork::Placeholder)
    }
}

/// Source of cover images
///
/// `fetch` is called from `spawn_blocking` and may do file or network I/O.
/// `Ok(None)` means the track simply has no artwork.
pub trait ArtworkSource: Send + Sync + 'static {
    fn fetch(&self, track: &Track) -> Result<Option<ArtworkImage>>;
}

/// Source that never finds artwork
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArtwork;

impl ArtworkSource for NoArtwork {
    fn fetch(&self, _track: &Track) -> Result<Option<ArtworkImage>> {
        Ok(None)
    }
}

/// Looks for well-known image files in the directory holding the track
#[derive(Debug, Clone)]
pub struct FolderArtworkSource {
    file_names: Vec<String>,
}

impl FolderArtworkSource {
    pub fn new(file_names: Vec<String>) -> Self {
        Self { file_names }
    }

    fn candidate_dir(track: &Track) -> Option<&Path> {
        let location = track
            .location
            .strip_prefix("file://")
            .unwrap_or(&track.location);
        Path::new(location).parent()
    }
}

impl Default for FolderArtworkSource {
    fn default() -> Self {
        Self::new(default_artwork_file_names())
    }
}

/// File names probed next to a track, in priority order
pub fn default_artwork_file_names() -> Vec<String> {
    ["cover.jpg", "cover.png", "folder.jpg", "folder.png", "front.jpg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ArtworkSource for FolderArtworkSource {
    fn fetch(&self, track: &Track) -> Result<Option<ArtworkImage>> {
        let Some(dir) = Self::candidate_dir(track) else {
            return Ok(None);
        };

        for name in &self.file_names {
            let path = dir.join(name);
            if path.is_file() {
                let bytes = std::fs::read(&path)?;
                debug!("Artwork for {} found at {}", track.id, path.display());
                return Ok(Some(ArtworkImage {
                    track_id: track.id,
                    source: path,
                    bytes: bytes.into(),
                }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_folder_source_finds_cover() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("folder.jpg"), b"jpeg").unwrap();
        let track_path = dir.path().join("song.flac");
        let track = Track::new(track_path.to_string_lossy(), "Song", 1_000);

        let image = FolderArtworkSource::default().fetch(&track).unwrap().unwrap();
        assert_eq!(image.track_id, track.id);
        assert_eq!(&*image.bytes, b"jpeg");
        assert!(image.source.ends_with("folder.jpg"));
    }

    #[test]
    fn test_folder_source_respects_priority() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("folder.jpg"), b"folder").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"cover").unwrap();
        let track = Track::new(
            format!("file://{}", dir.path().join("a.mp3").display()),
            "A",
            1_000,
        );

        let image = FolderArtworkSource::default().fetch(&track).unwrap().unwrap();
        assert_eq!(&*image.bytes, b"cover");
    }

    #[test]
    fn test_folder_source_without_image() {
        let dir = TempDir::new().unwrap();
        let track = Track::new(dir.path().join("a.mp3").to_string_lossy(), "A", 1_000);
        assert!(FolderArtworkSource::default().fetch(&track).unwrap().is_none());
        assert!(NoArtwork.fetch(&track).unwrap().is_none());
    }
}
