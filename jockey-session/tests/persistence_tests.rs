//! Session persistence across engine restarts

mod helpers;

use helpers::*;
use jockey_common::db::{init_database, init_memory_database};
use jockey_common::events::{PlaybackState, RepeatMode};
use jockey_common::Catalog;
use jockey_session::db::SessionStore;
use jockey_session::SessionEngine;

fn catalog_of(tracks: &[jockey_common::TrackRef]) -> Catalog {
    Catalog::new(tracks.iter().map(|t| (**t).clone()).collect(), Vec::new())
}

#[tokio::test]
async fn test_restart_restores_queue_modes_and_position() {
    let pool = init_memory_database().await.unwrap();
    let store = SessionStore::new(pool);
    let songs = tracks(&["a", "b", "c", "d", "e"]);
    let catalog = catalog_of(&songs);

    let session = SessionEngine::builder()
        .store(store.clone())
        .teardown_grace(LONG_GRACE)
        .shuffle_seed(Some(11))
        .spawn();
    session.set_queue(songs.clone(), 1).await.unwrap();
    session.set_shuffle(true).await.unwrap();
    session.set_repeat_mode(RepeatMode::All).await.unwrap();
    session.play().await.unwrap();
    session.skip().await.unwrap();
    session.report_position(42_000).await.unwrap();
    let before = session.snapshot();
    session.shutdown().await.unwrap();

    let persisted = store.load().await.unwrap().expect("session persisted");
    let player = persisted.restore(&catalog, Some(11));
    let restored = SessionEngine::builder()
        .store(store.clone())
        .teardown_grace(LONG_GRACE)
        .player(player)
        .spawn();
    let after = restored.snapshot();

    assert_eq!(after.queue, before.queue);
    assert_eq!(after.queue_position, before.queue_position);
    assert!(after.shuffle);
    assert_eq!(after.repeat, RepeatMode::All);
    assert_eq!(after.elapsed_ms, 42_000);
    // Restore waits for an explicit play
    assert_eq!(after.state, PlaybackState::Paused);

    // Unshuffling returns to the original order
    restored.set_shuffle(false).await.unwrap();
    let titles: Vec<String> = restored
        .snapshot()
        .queue
        .iter()
        .map(|e| e.track.title.clone())
        .collect();
    assert_eq!(titles, ["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn test_restore_drops_tracks_missing_from_catalog() {
    let pool = init_memory_database().await.unwrap();
    let store = SessionStore::new(pool);
    let songs = tracks(&["a", "b", "c"]);

    let session = SessionEngine::builder()
        .store(store.clone())
        .teardown_grace(LONG_GRACE)
        .spawn();
    session.set_queue(songs.clone(), 1).await.unwrap();
    session.report_position(5_000).await.unwrap();
    session.persist().await.unwrap();

    // "b" (the current track) left the catalog
    let catalog = catalog_of(&[songs[0].clone(), songs[2].clone()]);
    let player = store.load().await.unwrap().unwrap().restore(&catalog, None);

    assert_eq!(player.queue().len(), 2);
    assert_eq!(player.current().unwrap().track.title, "c");
    assert_eq!(player.elapsed_ms(), 0);
}

#[tokio::test]
async fn test_empty_store_loads_nothing() {
    let pool = init_memory_database().await.unwrap();
    let store = SessionStore::new(pool);
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jockey.db");
    let songs = tracks(&["a", "b"]);

    {
        let store = SessionStore::new(init_database(&path).await.unwrap());
        let session = SessionEngine::builder()
            .store(store.clone())
            .teardown_grace(LONG_GRACE)
            .spawn();
        session.set_queue(songs.clone(), 1).await.unwrap();
        session.set_repeat_mode(RepeatMode::One).await.unwrap();
        session.shutdown().await.unwrap();
        store.pool().close().await;
    }

    let store = SessionStore::new(init_database(&path).await.unwrap());
    let persisted = store.load().await.unwrap().expect("session persisted");
    assert_eq!(persisted.entries.len(), 2);
    assert_eq!(persisted.cursor, Some(1));
    assert_eq!(persisted.repeat, RepeatMode::One);

    let player = persisted.restore(&catalog_of(&songs), None);
    assert_eq!(player.current().unwrap().track.title, "b");
}
