//! Database access layer
//!
//! Session flags live in the shared `settings` table, queue rows in
//! `session_queue`. Schema creation is in `jockey_common::db`.

pub mod session_store;
pub mod settings;

pub use session_store::{PersistedEntry, PersistedSession, SessionStore};
