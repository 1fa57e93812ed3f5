//! Duplicate detection when adding tracks to a playlist
//!
//! [`resolve`] reports how many candidates the playlist already holds and
//! which resolutions make sense; [`apply`] computes the new contents for
//! the chosen resolution. Both are pure. Undo bookkeeping lives in
//! [`crate::playlist_store`].

use jockey_common::{TrackId, TrackRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Append every candidate, duplicates included
    AddAll,
    /// Append only candidates the playlist does not contain yet
    AddNewOnly,
    /// Leave the playlist untouched
    Cancel,
}

/// Outcome of comparing candidates against a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionReport {
    /// Distinct tracks present both in the playlist and among the candidates
    pub overlap_count: usize,
    pub candidate_count: usize,
    /// Resolutions to offer, in display order
    pub options: Vec<Resolution>,
}

impl CollisionReport {
    pub fn has_collision(&self) -> bool {
        self.overlap_count > 0
    }
}

/// Compare `candidates` with the playlist's `existing` contents
pub fn resolve(existing: &[TrackRef], candidates: &[TrackRef]) -> CollisionReport {
    let existing_ids: HashSet<TrackId> = existing.iter().map(|t| t.id).collect();
    let candidate_ids: HashSet<TrackId> = candidates.iter().map(|t| t.id).collect();
    let overlap_count = existing_ids.intersection(&candidate_ids).count();

    // "Add new only" is pointless for one track, when nothing collides, or
    // when every candidate is already present
    let options = if candidates.len() <= 1
        || overlap_count == 0
        || overlap_count == candidate_ids.len()
    {
        vec![Resolution::AddAll, Resolution::Cancel]
    } else {
        vec![Resolution::AddAll, Resolution::AddNewOnly, Resolution::Cancel]
    };

    CollisionReport {
        overlap_count,
        candidate_count: candidates.len(),
        options,
    }
}

/// New playlist contents after applying `resolution`
///
/// Returns the contents and the number of tracks appended.
pub fn apply(
    existing: &[TrackRef],
    candidates: &[TrackRef],
    resolution: Resolution,
) -> (Vec<TrackRef>, usize) {
    let mut contents = existing.to_vec();
    let added = match resolution {
        Resolution::AddAll => {
            contents.extend(candidates.iter().cloned());
            candidates.len()
        }
        Resolution::AddNewOnly => {
            let existing_ids: HashSet<TrackId> = existing.iter().map(|t| t.id).collect();
            let before = contents.len();
            contents.extend(
                candidates
                    .iter()
                    .filter(|t| !existing_ids.contains(&t.id))
                    .cloned(),
            );
            contents.len() - before
        }
        Resolution::Cancel => 0,
    };
    (contents, added)
}
