//! Settings database access
//!
//! Read/write session flags in the `settings` key-value table. Values are
//! stored as text and parsed with `FromStr` on the way out.

use crate::error::{Error, Result};
use jockey_common::events::{PlaybackState, RepeatMode};
use sqlx::{Executor, Sqlite};
use std::str::FromStr;

pub const KEY_PLAYBACK_STATE: &str = "session_playback_state";
pub const KEY_ELAPSED_MS: &str = "session_elapsed_ms";
pub const KEY_SHUFFLE: &str = "session_shuffle";
pub const KEY_REPEAT_MODE: &str = "session_repeat_mode";
pub const KEY_QUEUE_POSITION: &str = "session_queue_position";

/// Session flags persisted next to the queue rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFlags {
    pub state: PlaybackState,
    pub elapsed_ms: u64,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub queue_position: Option<usize>,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            elapsed_ms: 0,
            shuffle: false,
            repeat: RepeatMode::Off,
            queue_position: None,
        }
    }
}

/// Load session flags, falling back to defaults for missing keys
pub async fn load_session_flags<'e, E>(db: E) -> Result<SessionFlags>
where
    E: Executor<'e, Database = Sqlite> + Copy,
{
    let defaults = SessionFlags::default();
    Ok(SessionFlags {
        state: get_setting(db, KEY_PLAYBACK_STATE)
            .await?
            .unwrap_or(defaults.state),
        elapsed_ms: get_setting(db, KEY_ELAPSED_MS)
            .await?
            .unwrap_or(defaults.elapsed_ms),
        shuffle: get_setting(db, KEY_SHUFFLE).await?.unwrap_or(defaults.shuffle),
        repeat: get_setting(db, KEY_REPEAT_MODE)
            .await?
            .unwrap_or(defaults.repeat),
        queue_position: get_setting(db, KEY_QUEUE_POSITION).await?,
    })
}

/// Generic setting getter
///
/// Returns `Ok(None)` when the key is absent or NULL.
pub async fn get_setting<'e, T, E>(db: E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    E: Executor<'e, Database = Sqlite>,
{
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::CorruptSession(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<'e, T, E>(db: E, key: &str, value: T) -> Result<()>
where
    T: ToString,
    E: Executor<'e, Database = Sqlite>,
{
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn delete_setting<'e, E>(db: E, key: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jockey_common::db::init_memory_database;

    #[tokio::test]
    async fn test_defaults_after_schema_creation() {
        let pool = init_memory_database().await.unwrap();
        let flags = load_session_flags(&pool).await.unwrap();
        assert_eq!(flags, SessionFlags::default());
    }

    #[tokio::test]
    async fn test_set_and_get_setting() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, KEY_ELAPSED_MS, 4_200u64).await.unwrap();
        let value: Option<u64> = get_setting(&pool, KEY_ELAPSED_MS).await.unwrap();
        assert_eq!(value, Some(4_200));

        set_setting(&pool, KEY_ELAPSED_MS, 10u64).await.unwrap();
        let value: Option<u64> = get_setting(&pool, KEY_ELAPSED_MS).await.unwrap();
        assert_eq!(value, Some(10));
    }

    #[tokio::test]
    async fn test_get_missing_setting() {
        let pool = init_memory_database().await.unwrap();
        let value: Option<String> = get_setting(&pool, "nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_corrupt() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, KEY_REPEAT_MODE, "sometimes").await.unwrap();
        let result: Result<Option<RepeatMode>> = get_setting(&pool, KEY_REPEAT_MODE).await;
        assert!(matches!(result, Err(Error::CorruptSession(_))));
    }

    #[tokio::test]
    async fn test_delete_setting() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, KEY_QUEUE_POSITION, 3usize).await.unwrap();
        delete_setting(&pool, KEY_QUEUE_POSITION).await.unwrap();
        let value: Option<usize> = get_setting(&pool, KEY_QUEUE_POSITION).await.unwrap();
        assert!(value.is_none());
    }
}
