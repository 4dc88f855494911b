//! Settings persistence (config.json)

use labeler_types::Settings;
use std::path::{Path, PathBuf};

/// Base config directory for the labeler
fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vcon-labeler"))
}

/// Path to the settings file
pub fn get_settings_path() -> Option<PathBuf> {
    get_config_dir().map(|p| p.join("config.json"))
}

/// Load settings from the default location, falling back to defaults
pub fn load_settings() -> Settings {
    match get_settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            tracing::warn!("No config directory available, using default settings");
            Settings::default()
        }
    }
}

/// Load settings from a file; a missing or unparsable file yields defaults
pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        tracing::debug!("config.json not found at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                if settings.label_types.iter().all(|t| t.trim().is_empty()) {
                    tracing::warn!("config.json has no label types, using the built-in list");
                    settings.label_types = labeler_types::default_label_types();
                }
                tracing::info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("Failed to parse config.json: {}", e);
                Settings::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config.json: {}", e);
            Settings::default()
        }
    }
}

/// Save settings to a file, creating its directory
pub fn save_settings_to(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    tracing::info!("Saved settings to {:?}", path);
    Ok(())
}
