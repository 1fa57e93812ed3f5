//! Binding leases and backend residency
//!
//! The backend is released once no binding has been live for the grace
//! period, and reacquired (with the current track reloaded at the saved
//! position) by the next bind or by a command that needs it.

mod helpers;

use helpers::*;
use jockey_common::db::init_memory_database;
use jockey_common::events::{PlaybackState, SessionEvent};
use jockey_session::db::SessionStore;
use jockey_session::error::Error;
use jockey_session::{SessionEngine, SessionHandle};
use std::time::Duration;

const GRACE: Duration = Duration::from_millis(80);

fn spawn(backend: &RecordingBackend, grace: Duration) -> SessionHandle {
    SessionEngine::builder()
        .backend(backend.clone())
        .teardown_grace(grace)
        .spawn()
}

fn released(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::EngineReleased { .. })
}

fn rehydrated(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::EngineRehydrated { .. })
}

#[tokio::test]
async fn test_release_after_grace_persists_session() {
    let pool = init_memory_database().await.unwrap();
    let store = SessionStore::new(pool);
    let backend = RecordingBackend::new();
    let session = SessionEngine::builder()
        .backend(backend.clone())
        .store(store.clone())
        .teardown_grace(Duration::from_millis(250))
        .spawn();
    let mut events = session.events();

    let binding = session.bind();
    session.set_queue(tracks(&["a", "b"]), 1).await.unwrap();
    session.play().await.unwrap();
    binding.release().unwrap();
    assert_eq!(session.live_bindings(), 0);

    // Nothing happens inside the grace period
    assert!(no_event_within(&mut events, Duration::from_millis(100), released).await);
    assert_eq!(backend.count(&BackendCall::Release), 0);

    wait_for_event(&mut events, released).await;
    assert_eq!(backend.calls().last(), Some(&BackendCall::Release));

    let persisted = store.load().await.unwrap().expect("session persisted");
    assert_eq!(persisted.entries.len(), 2);
    assert_eq!(persisted.cursor, Some(1));
    assert_eq!(persisted.state, PlaybackState::Playing);

    // Session state itself survives the release
    assert_eq!(session.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_bind_within_grace_cancels_teardown() {
    let backend = RecordingBackend::new();
    let session = spawn(&backend, Duration::from_millis(300));
    let mut events = session.events();

    let first = session.bind();
    session.set_queue(tracks(&["a"]), 0).await.unwrap();
    session.play().await.unwrap();
    drop(first);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let _second = session.bind();

    assert!(no_event_within(&mut events, Duration::from_millis(600), released).await);
    assert_eq!(backend.count(&BackendCall::Release), 0);
    assert_eq!(backend.count(&BackendCall::Acquire), 1);
}

#[tokio::test]
async fn test_bind_after_release_rehydrates_at_saved_position() {
    let backend = RecordingBackend::new();
    let session = spawn(&backend, GRACE);
    let mut events = session.events();

    let binding = session.bind();
    session.set_queue(tracks(&["a", "b"]), 0).await.unwrap();
    session.play().await.unwrap();
    session.seek(30_000).await.unwrap();
    binding.release().unwrap();
    wait_for_event(&mut events, released).await;

    backend.clear();
    let _binding = session.bind();
    wait_for_event(&mut events, rehydrated).await;

    assert_eq!(
        backend.calls(),
        vec![
            BackendCall::Acquire,
            BackendCall::Load {
                title: "a".to_string(),
                position_ms: 30_000
            },
            BackendCall::Play,
        ]
    );
    let snapshot = session.snapshot();
    assert_eq!(snapshot.elapsed_ms, 30_000);
    assert_eq!(snapshot.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_command_while_unbound_rehydrates_then_releases_again() {
    let backend = RecordingBackend::new();
    let session = spawn(&backend, GRACE);
    let mut events = session.events();

    session.set_queue(tracks(&["a"]), 0).await.unwrap();
    session.play().await.unwrap();
    wait_for_event(&mut events, released).await;

    backend.clear();
    session.seek(10_000).await.unwrap();
    wait_for_event(&mut events, rehydrated).await;
    wait_for_event(&mut events, released).await;

    assert_eq!(
        backend.calls(),
        vec![
            BackendCall::Acquire,
            BackendCall::Load {
                title: "a".to_string(),
                position_ms: 10_000
            },
            BackendCall::Play,
            BackendCall::Release,
        ]
    );
}

#[tokio::test]
async fn test_paused_session_rehydrates_without_playing() {
    let backend = RecordingBackend::new();
    let session = spawn(&backend, GRACE);
    let mut events = session.events();

    let binding = session.bind();
    session.set_queue(tracks(&["a"]), 0).await.unwrap();
    session.play().await.unwrap();
    session.pause().await.unwrap();
    drop(binding);
    wait_for_event(&mut events, released).await;

    backend.clear();
    let _binding = session.bind();
    wait_for_event(&mut events, rehydrated).await;
    assert_eq!(backend.count(&BackendCall::Play), 0);
    assert_eq!(backend.calls()[0], BackendCall::Acquire);
}

#[tokio::test]
async fn test_stale_binding_is_reported() {
    let session = spawn(&RecordingBackend::new(), LONG_GRACE);
    let binding = session.bind();
    let id = binding.id();
    assert!(binding.is_live());
    assert!(binding.session().is_ok());

    session.unbind(id).unwrap();
    assert!(!binding.is_live());
    assert!(matches!(binding.session(), Err(Error::StaleBinding(stale)) if stale == id));
    assert!(matches!(session.unbind(id), Err(Error::StaleBinding(_))));
    assert!(matches!(binding.release(), Err(Error::StaleBinding(_))));
}

#[tokio::test]
async fn test_live_binding_count() {
    let session = spawn(&RecordingBackend::new(), LONG_GRACE);
    let first = session.bind();
    let second = session.bind();
    assert_ne!(first.id(), second.id());
    assert_eq!(session.live_bindings(), 2);

    drop(first);
    assert_eq!(session.live_bindings(), 1);
    second.release().unwrap();
    assert_eq!(session.live_bindings(), 0);
}

#[tokio::test]
async fn test_commands_through_binding() {
    let session = spawn(&RecordingBackend::new(), LONG_GRACE);
    let binding = session.bind();
    let handle = binding.session().unwrap();
    handle.set_queue(tracks(&["a"]), 0).await.unwrap();
    handle.toggle_play().await.unwrap();
    assert!(session.snapshot().is_playing());
}

#[tokio::test]
async fn test_shutdown_persists_and_releases() {
    let pool = init_memory_database().await.unwrap();
    let store = SessionStore::new(pool);
    let backend = RecordingBackend::new();
    let session = SessionEngine::builder()
        .backend(backend.clone())
        .store(store.clone())
        .teardown_grace(LONG_GRACE)
        .spawn();
    let _binding = session.bind();

    session.set_queue(tracks(&["a", "b", "c"]), 2).await.unwrap();
    session.shutdown().await.unwrap();

    assert_eq!(backend.calls().last(), Some(&BackendCall::Release));
    let persisted = store.load().await.unwrap().expect("session persisted");
    assert_eq!(persisted.cursor, Some(2));
    assert_eq!(persisted.entries.len(), 3);
}
