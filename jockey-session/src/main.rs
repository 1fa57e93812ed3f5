//! Jockey Session (jockey-session) - Main entry point
//!
//! Runs one playback session against the catalog export and drives it from
//! line commands on stdin. Logs go to stderr (or the configured file) so
//! stdout stays readable.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::Parser;
use jockey_common::db::init_database;
use jockey_common::events::{DiagnosticSource, EventBus, SessionEvent};
use jockey_common::{Catalog, CatalogHandle};
use jockey_session::cli::{parse_command, CliCommand, HELP};
use jockey_session::config::{Config, ConfigOverrides, LoggingConfig};
use jockey_session::db::SessionStore;
use jockey_session::playback::{Artwork, FolderArtworkSource, NullBackend};
use jockey_session::playlist_store::{PlaylistStore, UndoToken};
use jockey_session::rules::{self, RuleSet};
use jockey_session::{SessionEngine, SessionHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for jockey-session
#[derive(Parser, Debug)]
#[command(name = "jockey-session")]
#[command(about = "Playback session engine for the Jockey music player")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "JOCKEY_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder (database and catalog default locations)
    #[arg(short, long, env = "JOCKEY_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, env = "JOCKEY_DATABASE")]
    database: Option<PathBuf>,

    /// Catalog JSON export
    #[arg(long, env = "JOCKEY_CATALOG")]
    catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "JOCKEY_LOG_LEVEL")]
    log_level: Option<String>,
}

/// State the command loop works against
struct Console {
    session: SessionHandle,
    catalog: CatalogHandle,
    catalog_path: PathBuf,
    playlists: PlaylistStore,
    events: EventBus,
    last_undo: Option<UndoToken>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_file = jockey_common::config::locate_config_file(args.config.as_deref())
        .context("Failed to locate configuration file")?;
    let config = Config::resolve(
        config_file.as_deref(),
        ConfigOverrides {
            data_folder: args.data_folder,
            database_path: args.database,
            catalog_path: args.catalog,
            log_level: args.log_level,
        },
    )
    .context("Failed to resolve configuration")?;

    init_tracing(&config.logging)?;

    info!("Starting jockey-session v{}", env!("CARGO_PKG_VERSION"));
    info!("Data folder: {}", config.data_folder.display());
    info!("Database: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let store = SessionStore::new(pool);

    let events = EventBus::new(config.session.event_capacity);
    let catalog = CatalogHandle::new(load_catalog(&config.catalog_path, &events));
    let playlists = PlaylistStore::from_catalog(&catalog.current());

    let mut builder = SessionEngine::builder()
        .backend(NullBackend::new())
        .artwork_source(FolderArtworkSource::new(
            config.session.artwork_file_names.clone(),
        ))
        .events(events.clone())
        .teardown_grace(config.session.teardown_grace())
        .shuffle_seed(config.session.shuffle_seed);

    if config.session.restore_session {
        match store.load().await {
            Ok(Some(persisted)) => {
                let player = persisted.restore(&catalog.current(), config.session.shuffle_seed);
                info!("Restored session with {} queued tracks", player.queue().len());
                builder = builder.player(player);
            }
            Ok(None) => debug!("No persisted session"),
            Err(e) => {
                warn!("Failed to load persisted session: {}", e);
                events.emit_lossy(SessionEvent::diagnostic(
                    DiagnosticSource::Persistence,
                    e.to_string(),
                ));
            }
        }
    }

    let session = builder.store(store).spawn();
    // The console is a surface of its own for as long as it runs
    let binding = session.bind();
    tokio::spawn(log_events(session.events()));

    let mut console = Console {
        session: session.clone(),
        catalog,
        catalog_path: config.catalog_path.clone(),
        playlists,
        events,
        last_undo: None,
    };

    println!("{}", HELP);
    console.run().await;

    binding.release()?;
    session.persist().await.context("Failed to persist session")?;
    session.shutdown().await.context("Failed to stop session engine")?;

    info!("jockey-session stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "jockey_session={level},jockey_common={level}",
            level = logging.level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

/// Load the catalog export, falling back to an empty catalog
fn load_catalog(path: &Path, events: &EventBus) -> Catalog {
    match Catalog::load_json(path) {
        Ok(catalog) => {
            info!("Catalog: {} tracks from {}", catalog.len(), path.display());
            catalog
        }
        Err(e) => {
            warn!("Catalog unavailable ({}), starting empty", e);
            events.emit_lossy(SessionEvent::diagnostic(
                DiagnosticSource::Catalog,
                e.to_string(),
            ));
            Catalog::default()
        }
    }
}

async fn log_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::Diagnostic {
                source, message, ..
            }) => warn!("[{}] {}", source, message),
            Ok(event) => debug!("Event: {:?}", event),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Event log lagged by {}", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

impl Console {
    async fn run(&mut self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Ok(Some(CliCommand::Quit)) => break,
                        Ok(Some(command)) => {
                            if let Err(e) = self.dispatch(command).await {
                                println!("error: {:#}", e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    },
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                },
            }
        }
    }

    async fn dispatch(&mut self, command: CliCommand) -> Result<()> {
        let session = &self.session;
        match command {
            CliCommand::Play => session.play().await?,
            CliCommand::Pause => session.pause().await?,
            CliCommand::Toggle => session.toggle_play().await?,
            CliCommand::Stop => session.stop().await?,
            CliCommand::Skip => session.skip().await?,
            CliCommand::Previous => session.previous().await?,
            CliCommand::Seek(ms) => session.seek(ms).await?,
            CliCommand::Goto(index) => session.change_song(index).await?,
            CliCommand::Shuffle(enabled) => session.set_shuffle(enabled).await?,
            CliCommand::Repeat(mode) => session.set_repeat_mode(mode).await?,
            CliCommand::MultiRepeat(count) => session.set_multi_repeat(count).await?,
            CliCommand::Sleep(duration) => session.set_sleep_timer(duration).await?,
            CliCommand::Remove(index) => session.remove(index).await?,
            CliCommand::Move { from, to } => session.move_entry(from, to).await?,
            CliCommand::QueueAll(start) => {
                let tracks = self.catalog.current().songs().to_vec();
                session.set_queue(tracks, start).await?;
            }
            CliCommand::QueuePlaylist(id) => {
                let tracks = self.playlists.contents(id).await?;
                session.set_queue(tracks, 0).await?;
            }
            CliCommand::QueueRules(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let rule_set: RuleSet =
                    serde_json::from_str(&json).context("Invalid rule set JSON")?;
                let tracks = rules::evaluate(&rule_set, self.catalog.current().songs());
                println!("'{}' matched {} tracks", rule_set.name, tracks.len());
                session.set_queue(tracks, 0).await?;
            }
            CliCommand::Enqueue { track_id, next } => {
                let catalog = self.catalog.current();
                let Some(track) = catalog.song(track_id).cloned() else {
                    bail!("track {} is not in the catalog", track_id);
                };
                if next {
                    session.insert_next(track).await?;
                } else {
                    session.insert_last(track).await?;
                }
            }
            CliCommand::SaveQueue {
                playlist_id,
                resolution,
            } => {
                let candidates: Vec<_> = session
                    .snapshot()
                    .queue
                    .iter()
                    .map(|e| e.track.clone())
                    .collect();
                let report = self.playlists.check(playlist_id, &candidates).await?;
                if report.has_collision() {
                    println!(
                        "{} of {} tracks already in playlist (options: {:?})",
                        report.overlap_count, report.candidate_count, report.options
                    );
                }
                if !report.options.contains(&resolution) {
                    bail!("{:?} is not offered here", resolution);
                }
                let outcome = self
                    .playlists
                    .add(playlist_id, &candidates, resolution)
                    .await?;
                println!("added {} tracks", outcome.added);
                if outcome.undo.is_some() {
                    self.last_undo = outcome.undo;
                }
            }
            CliCommand::Undo => match self.last_undo.take() {
                Some(token) => {
                    let id = token.playlist_id();
                    self.playlists.undo(token).await?;
                    println!("restored playlist {}", id);
                }
                None => println!("nothing to undo"),
            },
            CliCommand::Completed => session.track_completed().await?,
            CliCommand::Reload => {
                let catalog = load_catalog(&self.catalog_path, &self.events);
                println!("catalog: {} tracks", catalog.len());
                self.catalog.refresh(catalog);
            }
            CliCommand::Persist => session.persist().await?,
            CliCommand::Status => self.print_status(),
            CliCommand::Help => println!("{}", HELP),
            CliCommand::Quit => {}
        }
        Ok(())
    }

    fn print_status(&self) {
        let snapshot = self.session.snapshot();
        println!(
            "{} | shuffle {} | repeat {} | multi {} | {} ms",
            snapshot.state,
            if snapshot.shuffle { "on" } else { "off" },
            snapshot.repeat,
            snapshot.multi_repeat,
            snapshot.elapsed_ms
        );
        if let Some(end) = snapshot.sleep_timer_end {
            println!("sleep at {}", end.format("%H:%M:%S"));
        }
        if let Artwork::Image(image) = &snapshot.artwork {
            println!("artwork: {}", image.source.display());
        }
        for (i, entry) in snapshot.queue.iter().enumerate() {
            let marker = if Some(i) == snapshot.queue_position {
                ">"
            } else {
                " "
            };
            println!(
                "{} {:3} {} - {} [{}]",
                marker, i, entry.track.artist, entry.track.title, entry.track.id
            );
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
