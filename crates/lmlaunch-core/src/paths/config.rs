//! Settings file location and persistence.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::PathError;
use crate::settings::{Settings, SettingsError};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV_VAR: &str = "LMLAUNCH_CONFIG";

/// Environment variable overriding the models directory.
pub const MODEL_DIR_ENV_VAR: &str = "LMLAUNCH_MODEL_DIR";

/// Location of the settings file.
///
/// Resolution order:
/// 1. `LMLAUNCH_CONFIG` environment variable
/// 2. `<config dir>/lmlaunch/config.json` (e.g. `~/.config/lmlaunch/config.json`)
pub fn config_path() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let base = dirs::config_dir().ok_or(PathError::NoConfigDir)?;
    Ok(base.join("lmlaunch").join("config.json"))
}

/// Directory scanned for models.
///
/// Resolution order:
/// 1. `general.model_dir` setting
/// 2. `LMLAUNCH_MODEL_DIR` environment variable
/// 3. `~/models`
pub fn resolve_model_dir(settings: &Settings) -> Result<PathBuf, PathError> {
    if let Some(dir) = settings.general.model_dir.as_deref() {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    if let Ok(dir) = env::var(MODEL_DIR_ENV_VAR) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(home.join("models"))
}

/// Load settings from a JSON file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    match fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "Loading settings");
            serde_json::from_str(&text).map_err(|e| SettingsError::Parse(e.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No settings file, using defaults");
            Ok(Settings::with_defaults())
        }
        Err(e) => Err(SettingsError::Io(e.to_string())),
    }
}

/// Write settings as pretty JSON, creating the parent directory if needed.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }
    }
    let json =
        serde_json::to_string_pretty(settings).map_err(|e| SettingsError::Parse(e.to_string()))?;
    fs::write(path, json).map_err(|e| SettingsError::Io(e.to_string()))?;
    debug!(path = %path.display(), "Saved settings");
    Ok(())
}
