//! TOML config file discovery and parsing.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{APP_ID, ConfigError, Settings};

/// File name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    generic: Option<Settings>,
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Settings from the `[generic]` table; empty when nothing was loaded.
    pub settings: Settings,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/tikfetch/config.toml`
/// 2. the platform config directory (`~/.config` on Linux)
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    let base = env_var_non_empty_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    Some(base.join(APP_ID).join(CONFIG_FILE_NAME))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
pub fn load_default_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };

    if !path_ref.exists() {
        debug!(path = %path_ref.display(), "no config file found");
        return Ok(LoadedConfig {
            path,
            ..LoadedConfig::default()
        });
    }

    let settings = load_config_file(path_ref)?;
    Ok(LoadedConfig {
        path,
        settings,
        loaded_from_file: true,
    })
}

/// Reads and parses the config file at `path`.
///
/// # Errors
///
/// [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn load_config_file(path: &Path) -> Result<Settings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&raw, path)
}

/// Parses config text. `path` is only used in error messages.
///
/// # Errors
///
/// [`ConfigError::Parse`] on invalid TOML or unknown keys.
pub fn parse_config_str(raw: &str, path: &Path) -> Result<Settings, ConfigError> {
    let file: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match file.generic {
        Some(settings) => Ok(settings),
        None => {
            warn!(path = %path.display(), "config file has no [generic] table, using defaults");
            Ok(Settings::default())
        }
    }
}
