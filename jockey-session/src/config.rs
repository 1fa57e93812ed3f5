//! Configuration for the jockey-session service
//!
//! Bootstrap settings come from an optional TOML file; everything the
//! session persists at runtime lives in the database `settings` table.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--data-folder`, `--database`, `--catalog`)
//! 2. Environment variables (`JOCKEY_DATA_FOLDER`, `JOCKEY_DATABASE`, ...)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use crate::playback::artwork::default_artwork_file_names;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
///
/// The `data_folder` key is read by
/// [`jockey_common::config::resolve_data_folder`], which also honours the
/// environment override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file; defaults to `<data_folder>/jockey.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Catalog JSON export; defaults to `<data_folder>/catalog.json`
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Delay between the last unbind and releasing the backend
    ///
    /// Default: 5000ms
    #[serde(default = "default_teardown_grace_ms")]
    pub teardown_grace_ms: u64,

    /// EventBus buffer before slow subscribers lag
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Image file names probed next to a track, in priority order
    #[serde(default = "default_artwork_file_names")]
    pub artwork_file_names: Vec<String>,

    /// Fixed shuffle seed (reproducible shuffles); random when unset
    #[serde(default)]
    pub shuffle_seed: Option<u64>,

    /// Restore the persisted session on startup
    #[serde(default = "default_true")]
    pub restore_session: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            teardown_grace_ms: default_teardown_grace_ms(),
            event_capacity: default_event_capacity(),
            artwork_file_names: default_artwork_file_names(),
            shuffle_seed: None,
            restore_session: true,
        }
    }
}

impl SessionSettings {
    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_teardown_grace_ms() -> u64 {
    5000
}

fn default_event_capacity() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_folder: PathBuf,
    pub database_path: PathBuf,
    pub catalog_path: PathBuf,
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Merge the TOML file (if any) with CLI overrides
    pub fn resolve(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match config_file {
            Some(path) => TomlConfig::load(path)?,
            None => TomlConfig::default(),
        };

        let data_folder =
            jockey_common::config::resolve_data_folder(overrides.data_folder.as_deref(), config_file);
        let database_path = overrides
            .database_path
            .or(toml_config.database_path)
            .unwrap_or_else(|| data_folder.join("jockey.db"));
        let catalog_path = overrides
            .catalog_path
            .or(toml_config.catalog_path)
            .unwrap_or_else(|| data_folder.join("catalog.json"));

        let mut logging = toml_config.logging;
        if let Some(level) = overrides.log_level {
            logging.level = level;
        }

        Ok(Self {
            data_folder,
            database_path,
            catalog_path,
            session: toml_config.session,
            logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.session.teardown_grace(), Duration::from_millis(5000));
        assert_eq!(config.session.event_capacity, 100);
        assert!(config.session.restore_session);
        assert!(config
            .session
            .artwork_file_names
            .contains(&"cover.jpg".to_string()));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_session_section() {
        let config = TomlConfig::from_toml_str(
            r#"
            database_path = "/tmp/j.db"

            [session]
            teardown_grace_ms = 250
            shuffle_seed = 42
            artwork_file_names = ["art.png"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/j.db")));
        assert_eq!(config.session.teardown_grace_ms, 250);
        assert_eq!(config.session.shuffle_seed, Some(42));
        assert_eq!(config.session.artwork_file_names, ["art.png"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            TomlConfig::from_toml_str("session = 3 ="),
            Err(Error::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn test_cli_overrides_toml() {
        std::env::remove_var(jockey_common::config::DATA_FOLDER_ENV);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "data_folder = \"/srv/jockey\"\ndatabase_path = \"/srv/jockey/toml.db\""
        )
        .unwrap();

        let config = Config::resolve(
            Some(file.path()),
            ConfigOverrides {
                database_path: Some(PathBuf::from("/cli.db")),
                log_level: Some("trace".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.data_folder, PathBuf::from("/srv/jockey"));
        assert_eq!(config.database_path, PathBuf::from("/cli.db"));
        assert_eq!(config.catalog_path, PathBuf::from("/srv/jockey/catalog.json"));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    #[serial]
    fn test_paths_default_under_data_folder() {
        std::env::remove_var(jockey_common::config::DATA_FOLDER_ENV);
        let dir = tempfile::tempdir().unwrap();
        let config = Config::resolve(
            None,
            ConfigOverrides {
                data_folder: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.database_path, dir.path().join("jockey.db"));
        assert_eq!(config.catalog_path, dir.path().join("catalog.json"));
    }
}
