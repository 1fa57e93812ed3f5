//! Line commands understood by the `jockey-session` binary

use crate::collision::Resolution;
use jockey_common::events::RepeatMode;
use jockey_common::{PlaylistId, TrackId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0} (type 'help' for commands)")]
pub struct ParseError(String);

fn err<T>(message: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError(message.into()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    Skip,
    Previous,
    Seek(i64),
    Goto(usize),
    Shuffle(bool),
    Repeat(RepeatMode),
    MultiRepeat(u32),
    Sleep(Option<Duration>),
    Remove(usize),
    Move { from: usize, to: usize },
    /// Queue the whole catalog, starting at an index
    QueueAll(usize),
    QueuePlaylist(PlaylistId),
    /// Queue the result of a rule set stored as JSON
    QueueRules(PathBuf),
    Enqueue { track_id: TrackId, next: bool },
    /// Add the current queue to a playlist
    SaveQueue { playlist_id: PlaylistId, resolution: Resolution },
    Undo,
    /// Backend report: current track finished
    Completed,
    Reload,
    Persist,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
play | pause | toggle | stop | next | prev
seek <ms> | goto <index> | remove <index> | move <from> <to>
shuffle on|off | repeat off|one|all | multi <count> | sleep <minutes>|off
queue all [start] | queue playlist <id> | queue rules <file.json>
enqueue <track-id> [next|last] | save <playlist-id> [all|new|cancel] | undo
completed | reload | persist | status | help | quit";

fn parse_number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T, ParseError> {
    match word {
        Some(w) => w
            .parse()
            .or_else(|_| err(format!("invalid {}: {}", what, w))),
        None => err(format!("missing {}", what)),
    }
}

fn parse_uuid(word: Option<&str>, what: &str) -> Result<Uuid, ParseError> {
    match word {
        Some(w) => Uuid::parse_str(w).or_else(|_| err(format!("invalid {}: {}", what, w))),
        None => err(format!("missing {}", what)),
    }
}

/// Parse one input line; `Ok(None)` for blank lines and comments
pub fn parse_command(line: &str) -> Result<Option<CliCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "play" => CliCommand::Play,
        "pause" => CliCommand::Pause,
        "toggle" => CliCommand::Toggle,
        "stop" => CliCommand::Stop,
        "next" | "skip" => CliCommand::Skip,
        "prev" | "previous" => CliCommand::Previous,
        "seek" => CliCommand::Seek(parse_number(words.next(), "position")?),
        "goto" => CliCommand::Goto(parse_number(words.next(), "index")?),
        "remove" => CliCommand::Remove(parse_number(words.next(), "index")?),
        "move" => CliCommand::Move {
            from: parse_number(words.next(), "from index")?,
            to: parse_number(words.next(), "to index")?,
        },
        "shuffle" => match words.next() {
            Some("on") => CliCommand::Shuffle(true),
            Some("off") => CliCommand::Shuffle(false),
            other => return err(format!("shuffle expects on|off, got {:?}", other)),
        },
        "repeat" => match words.next().map(str::parse::<RepeatMode>) {
            Some(Ok(mode)) => CliCommand::Repeat(mode),
            _ => return err("repeat expects off|one|all"),
        },
        "multi" => CliCommand::MultiRepeat(parse_number(words.next(), "count")?),
        "sleep" => match words.next() {
            Some("off") => CliCommand::Sleep(None),
            word => {
                let minutes: u64 = parse_number(word, "minutes")?;
                match minutes.checked_mul(60) {
                    Some(secs) => CliCommand::Sleep(Some(Duration::from_secs(secs))),
                    None => return err("sleep minutes out of range"),
                }
            }
        },
        "queue" => match words.next() {
            Some("all") => CliCommand::QueueAll(match words.next() {
                Some(word) => parse_number(Some(word), "start index")?,
                None => 0,
            }),
            Some("playlist") => {
                CliCommand::QueuePlaylist(PlaylistId(parse_uuid(words.next(), "playlist id")?))
            }
            Some("rules") => match words.next() {
                Some(path) => CliCommand::QueueRules(PathBuf::from(path)),
                None => return err("missing rules file"),
            },
            _ => return err("queue expects all|playlist|rules"),
        },
        "enqueue" => {
            let track_id = TrackId(parse_uuid(words.next(), "track id")?);
            let next = match words.next() {
                None | Some("last") => false,
                Some("next") => true,
                Some(other) => return err(format!("enqueue expects next|last, got {}", other)),
            };
            CliCommand::Enqueue { track_id, next }
        }
        "save" => {
            let playlist_id = PlaylistId(parse_uuid(words.next(), "playlist id")?);
            let resolution = match words.next() {
                None | Some("all") => Resolution::AddAll,
                Some("new") => Resolution::AddNewOnly,
                Some("cancel") => Resolution::Cancel,
                Some(other) => return err(format!("save expects all|new|cancel, got {}", other)),
            };
            CliCommand::SaveQueue {
                playlist_id,
                resolution,
            }
        }
        "undo" => CliCommand::Undo,
        "completed" => CliCommand::Completed,
        "reload" => CliCommand::Reload,
        "persist" => CliCommand::Persist,
        "status" => CliCommand::Status,
        "help" | "?" => CliCommand::Help,
        "quit" | "exit" => CliCommand::Quit,
        other => return err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}
