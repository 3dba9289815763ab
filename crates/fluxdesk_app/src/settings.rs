use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use desk_logging::{desk_info, desk_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const SETTINGS_FILENAME: &str = "fluxdesk_settings.ron";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(String),
}

/// Persisted client settings. The API key is the only entry today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: Option<String>,
}

pub fn default_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(SETTINGS_FILENAME)
}

/// Load settings from `path`. A missing, empty, or corrupt file is a
/// recoverable condition: the client runs keyless until one is supplied.
pub fn load(path: &Path) -> Settings {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Settings::default();
        }
        Err(err) => {
            desk_warn!("Failed to read settings from {:?}: {}", path, err);
            return Settings::default();
        }
    };

    if content.trim().is_empty() {
        desk_warn!("Settings file {:?} is empty", path);
        return Settings::default();
    }

    let mut settings: Settings = match ron::from_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            desk_warn!("Failed to parse settings from {:?}: {}", path, err);
            return Settings::default();
        }
    };

    // An empty key in the file is the same as no key.
    if settings.api_key.as_deref() == Some("") {
        settings.api_key = None;
    }

    desk_info!("Loaded settings from {:?}", path);
    settings
}

/// Save settings atomically: write a temp file in the target directory,
/// then rename over the destination.
pub fn save(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(settings, pretty)
        .map_err(|err| SettingsError::Serialize(err.to_string()))?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    // persist() replaces an existing destination atomically.
    tmp.persist(path).map_err(|err| SettingsError::Io(err.error))?;
    desk_info!("Saved settings to {:?}", path);
    Ok(())
}
