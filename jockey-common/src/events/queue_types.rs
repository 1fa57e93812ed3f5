//! Queue change type definitions
//!
//! Supporting types describing why the queue or cursor changed.

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    SetQueue,
    InsertNext,
    InsertLast,
    Remove,
    Move,
    Shuffle,
    Restore,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::SetQueue => write!(f, "SetQueue"),
            QueueChangeTrigger::InsertNext => write!(f, "InsertNext"),
            QueueChangeTrigger::InsertLast => write!(f, "InsertLast"),
            QueueChangeTrigger::Remove => write!(f, "Remove"),
            QueueChangeTrigger::Move => write!(f, "Move"),
            QueueChangeTrigger::Shuffle => write!(f, "Shuffle"),
            QueueChangeTrigger::Restore => write!(f, "Restore"),
        }
    }
}

/// Component that reported a degraded (but non-fatal) condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DiagnosticSource {
    Artwork,
    Catalog,
    Backend,
    Persistence,
    AutoPlaylist,
}

impl std::fmt::Display for DiagnosticSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticSource::Artwork => write!(f, "Artwork"),
            DiagnosticSource::Catalog => write!(f, "Catalog"),
            DiagnosticSource::Backend => write!(f, "Backend"),
            DiagnosticSource::Persistence => write!(f, "Persistence"),
            DiagnosticSource::AutoPlaylist => write!(f, "AutoPlaylist"),
        }
    }
}
