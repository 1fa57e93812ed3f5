//! Session persistence
//!
//! The queue is stored as track ids (one `session_queue` row per entry,
//! original order plus shuffled position), the flags in `settings`. Saving
//! replaces everything in one transaction. Restoring resolves the ids
//! against the current catalog: tracks no longer present are dropped and
//! the cursor slides to the nearest surviving entry.

use crate::db::settings::{self, SessionFlags};
use crate::error::{Error, Result};
use crate::playback::{Player, Queue, QueueEntry};
use jockey_common::events::{PlaybackState, RepeatMode};
use jockey_common::{Catalog, TrackId};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One persisted queue slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedEntry {
    pub entry_id: Uuid,
    pub track_id: TrackId,
}

/// Everything needed to rebuild a [`Player`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    /// Entries in original order
    pub entries: Vec<PersistedEntry>,
    /// Entry ids in shuffled order, when shuffle was on
    pub shuffle_order: Option<Vec<Uuid>>,
    /// Cursor in active order
    pub cursor: Option<usize>,
    pub repeat: RepeatMode,
    pub state: PlaybackState,
    pub elapsed_ms: u64,
}

impl PersistedSession {
    pub fn capture(player: &Player) -> Self {
        let queue = player.queue();
        let entries = queue
            .original_entries()
            .iter()
            .map(|e| PersistedEntry {
                entry_id: e.entry_id,
                track_id: e.track.id,
            })
            .collect();
        let shuffle_order = queue
            .shuffled_entries()
            .map(|shuffled| shuffled.iter().map(|e| e.entry_id).collect());

        Self {
            entries,
            shuffle_order,
            cursor: queue.cursor(),
            repeat: queue.repeat_mode(),
            state: player.state(),
            elapsed_ms: player.elapsed_ms(),
        }
    }

    /// Rebuild a paused player against `catalog`
    pub fn restore(self, catalog: &Catalog, shuffle_seed: Option<u64>) -> Player {
        let total = self.entries.len();
        let resolved: HashMap<Uuid, QueueEntry> = self
            .entries
            .iter()
            .filter_map(|p| {
                catalog.song(p.track_id).map(|track| {
                    (
                        p.entry_id,
                        QueueEntry {
                            entry_id: p.entry_id,
                            track: track.clone(),
                        },
                    )
                })
            })
            .collect();
        if resolved.len() < total {
            warn!(
                "Dropped {} queue entries whose tracks are no longer in the catalog",
                total - resolved.len()
            );
        }

        let original_ids: Vec<Uuid> = self.entries.iter().map(|p| p.entry_id).collect();
        let active_ids = self.shuffle_order.as_ref().unwrap_or(&original_ids);

        // Cursor slides forward to the next surviving entry, else the last one
        let current_survived = self
            .cursor
            .and_then(|c| active_ids.get(c))
            .is_some_and(|id| resolved.contains_key(id));
        let cursor = self.cursor.and_then(|c| {
            let survivors_before = active_ids
                .iter()
                .take(c)
                .filter(|id| resolved.contains_key(id))
                .count();
            if resolved.is_empty() {
                None
            } else {
                Some(survivors_before.min(resolved.len() - 1))
            }
        });

        let pick = |ids: &[Uuid]| -> Vec<QueueEntry> {
            ids.iter().filter_map(|id| resolved.get(id).cloned()).collect()
        };
        let original = pick(original_ids.as_slice());
        let shuffled = self.shuffle_order.as_deref().map(pick);

        let queue = Queue::from_parts(original, shuffled, cursor, self.repeat, shuffle_seed);
        let elapsed_ms = if current_survived { self.elapsed_ms } else { 0 };
        Player::restored(queue, self.state, elapsed_ms)
    }
}

/// Session persistence over the SQLite pool
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Replace the stored session
    pub async fn save(&self, session: &PersistedSession) -> Result<()> {
        let shuffle_positions: HashMap<Uuid, i64> = session
            .shuffle_order
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, id)| (*id, i as i64))
            .collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM session_queue")
            .execute(&mut *tx)
            .await?;

        for (play_order, entry) in session.entries.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO session_queue (entry_id, track_id, play_order, shuffle_order)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(entry.entry_id.to_string())
            .bind(entry.track_id.to_string())
            .bind(play_order as i64)
            .bind(shuffle_positions.get(&entry.entry_id).copied())
            .execute(&mut *tx)
            .await?;
        }

        settings::set_setting(&mut *tx, settings::KEY_PLAYBACK_STATE, session.state).await?;
        settings::set_setting(&mut *tx, settings::KEY_ELAPSED_MS, session.elapsed_ms).await?;
        settings::set_setting(
            &mut *tx,
            settings::KEY_SHUFFLE,
            session.shuffle_order.is_some(),
        )
        .await?;
        settings::set_setting(&mut *tx, settings::KEY_REPEAT_MODE, session.repeat).await?;
        match session.cursor {
            Some(cursor) => {
                settings::set_setting(&mut *tx, settings::KEY_QUEUE_POSITION, cursor).await?
            }
            None => settings::delete_setting(&mut *tx, settings::KEY_QUEUE_POSITION).await?,
        }

        tx.commit().await?;
        debug!(
            "Saved session: {} entries, cursor {:?}, state {}",
            session.entries.len(),
            session.cursor,
            session.state
        );
        Ok(())
    }

    /// Load the stored session; `None` when nothing was ever queued
    pub async fn load(&self) -> Result<Option<PersistedSession>> {
        let rows = sqlx::query(
            "SELECT entry_id, track_id, shuffle_order FROM session_queue ORDER BY play_order",
        )
        .fetch_all(&self.pool)
        .await?;

        let flags: SessionFlags = settings::load_session_flags(&self.pool).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(rows.len());
        let mut shuffled: Vec<(i64, Uuid)> = Vec::new();
        for row in rows {
            let entry_id: String = row.get("entry_id");
            let track_id: String = row.get("track_id");
            let shuffle_order: Option<i64> = row.get("shuffle_order");

            let entry_id = Uuid::parse_str(&entry_id)
                .map_err(|e| Error::CorruptSession(format!("entry id {entry_id}: {e}")))?;
            let track_id = track_id
                .parse::<TrackId>()
                .map_err(|e| Error::CorruptSession(format!("track id {track_id}: {e}")))?;

            if let Some(position) = shuffle_order {
                shuffled.push((position, entry_id));
            }
            entries.push(PersistedEntry { entry_id, track_id });
        }

        let shuffle_order = if flags.shuffle {
            shuffled.sort_by_key(|(position, _)| *position);
            Some(shuffled.into_iter().map(|(_, id)| id).collect())
        } else {
            None
        };

        info!(
            "Loaded persisted session: {} entries, state {}",
            entries.len(),
            flags.state
        );
        Ok(Some(PersistedSession {
            entries,
            shuffle_order,
            cursor: flags.queue_position,
            repeat: flags.repeat,
            state: flags.state,
            elapsed_ms: flags.elapsed_ms,
        }))
    }
}
