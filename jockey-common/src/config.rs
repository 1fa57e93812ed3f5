//! Configuration file location and data folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "JOCKEY_DATA_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "JOCKEY_CONFIG";

/// Data folder resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `data_folder` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>, config_file: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(config_path) = config_file {
        if let Ok(toml_content) = std::fs::read_to_string(config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(folder) = config.get("data_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(folder);
                }
            }
        }
    }

    default_data_folder()
}

/// Locate the configuration file
///
/// Explicit path first, then `JOCKEY_CONFIG`, then the platform config
/// directory (`~/.config/jockey/config.toml` on Linux). Returns `Ok(None)`
/// when no file exists; a missing config is not an error.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("jockey").join("config.toml"));
    match user_config {
        Some(path) if path.exists() => Ok(Some(path)),
        _ => Ok(None),
    }
}

/// Get OS-dependent default data folder path
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/jockey
        dirs::data_local_dir()
            .map(|d| d.join("jockey"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/jockey"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/jockey
        dirs::data_dir()
            .map(|d| d.join("jockey"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/jockey"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\jockey
        dirs::data_local_dir()
            .map(|d| d.join("jockey"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\jockey"))
    } else {
        PathBuf::from("./jockey_data")
    }
}
