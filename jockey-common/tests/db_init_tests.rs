//! Tests for database initialization
//!
//! Covers first-run creation, reopening, default settings and idempotence.

use jockey_common::db::init::{init_database, init_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("jockey.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("jockey.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let pool = init_memory_database().await.unwrap();

    let repeat: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'session_repeat_mode'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(repeat.as_deref(), Some("off"));

    let state: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'session_playback_state'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(state.as_deref(), Some("idle"));
}

#[tokio::test]
async fn test_session_queue_table_exists() {
    let pool = init_memory_database().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_queue")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_idempotent_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("jockey.db");

    let pool1 = init_database(&db_path).await.unwrap();
    let count1: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool1)
        .await
        .unwrap();
    drop(pool1);

    let pool2 = init_database(&db_path).await.unwrap();
    let count2: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool2)
        .await
        .unwrap();

    assert_eq!(count1, count2, "Re-initialization duplicated settings");
}
