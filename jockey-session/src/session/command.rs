//! Messages delivered to the engine owner task

use crate::error::Result;
use crate::playback::ArtworkImage;
use jockey_common::events::RepeatMode;
use jockey_common::TrackRef;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Session command issued through the handle
#[derive(Debug)]
pub(crate) enum Command {
    SetQueue {
        tracks: Vec<TrackRef>,
        start_index: usize,
    },
    InsertNext(TrackRef),
    InsertLast(TrackRef),
    Remove(usize),
    Move {
        from: usize,
        to: usize,
    },
    SetShuffle(bool),
    SetRepeatMode(RepeatMode),
    SetMultiRepeat(u32),
    SetSleepTimer(Option<Duration>),
    Play,
    Pause,
    TogglePlay,
    Stop,
    Seek(i64),
    Skip,
    Previous,
    ChangeSong(usize),
    TrackCompleted,
    ReportPosition(u64),
    Persist,
}

impl Command {
    /// Short name for logs (the queue payload can be large)
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::SetQueue { .. } => "set_queue",
            Command::InsertNext(_) => "insert_next",
            Command::InsertLast(_) => "insert_last",
            Command::Remove(_) => "remove",
            Command::Move { .. } => "move_entry",
            Command::SetShuffle(_) => "set_shuffle",
            Command::SetRepeatMode(_) => "set_repeat_mode",
            Command::SetMultiRepeat(_) => "set_multi_repeat",
            Command::SetSleepTimer(_) => "set_sleep_timer",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::TogglePlay => "toggle_play",
            Command::Stop => "stop",
            Command::Seek(_) => "seek",
            Command::Skip => "skip",
            Command::Previous => "previous",
            Command::ChangeSong(_) => "change_song",
            Command::TrackCompleted => "track_completed",
            Command::ReportPosition(_) => "report_position",
            Command::Persist => "persist",
        }
    }
}

pub(crate) enum Message {
    Request {
        command: Command,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Result of a background artwork fetch
    ArtworkLoaded {
        entry_id: Uuid,
        generation: u64,
        result: std::result::Result<Option<ArtworkImage>, String>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}
