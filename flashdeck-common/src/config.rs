//! Configuration file lookup and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FLASHDECK_ROOT_FOLDER";

const APP_DIR: &str = "flashdeck";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    let config_path = config_file.map(Path::to_path_buf).or_else(|| find_config_file().ok());
    if let Some(config_path) = config_path {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the configuration file for the platform
pub fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/flashdeck/config.toml first, then /etc/flashdeck/config.toml
        let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
        let system_config = PathBuf::from("/etc").join(APP_DIR).join("config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let config_path = dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if config_path.exists() {
        Ok(config_path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", config_path)))
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/flashdeck
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/var/lib").join(APP_DIR))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/flashdeck
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support").join(APP_DIR))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\flashdeck
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData").join(APP_DIR))
    } else {
        PathBuf::from("./flashdeck_data")
    }
}

/// Load a TOML config file into `T`, falling back to `T::default()`.
///
/// A missing or unreadable file is not fatal: a warning is logged and defaults are used.
/// A file that exists but does not parse is reported as a configuration error.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let path = match path.map(Path::to_path_buf).or_else(|| find_config_file().ok()) {
        Some(path) => path,
        None => {
            warn!("No config file found, using built-in defaults");
            return Ok(T::default());
        }
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read config file {}: {}. Using defaults.", path.display(), e);
            return Ok(T::default());
        }
    };

    debug!("Loading config from {}", path.display());
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}
