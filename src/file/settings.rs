use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::file::config::{AppConfig, ConfigError};
use crate::guitar::interaction::CanPlay;
use crate::states::StartupLatch;

/// Per-user preferences, stored as YAML in the save directory.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    /// Whether the pick toggle starts switched on in explore mode.
    pub pick_starts_held: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub width: f32,
    pub height: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window: WindowSettings {
                width: 1280.0,
                height: 720.0,
            },
            pick_starts_held: false,
        }
    }
}

pub fn load_or_create_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        warn!("Settings file not found at '{}', creating default...", path.display());
        let default = Settings::default();
        let yaml = serde_yaml::to_string(&default)?;
        fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(default);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}

fn change_window(mut windows: Query<&mut Window>, settings: &Settings) {
    if let Ok(mut window) = windows.single_mut() {
        window
            .resolution
            .set(settings.window.width, settings.window.height);
    } else {
        warn!("Primary window not available to apply settings");
    }
}

pub fn setup_settings(
    mut commands: Commands,
    windows: Query<&mut Window>,
    config: Res<AppConfig>,
    mut latch: ResMut<StartupLatch>,
) {
    let path = config.saves.directory.join(&config.saves.settings_file);

    let settings = match load_or_create_settings(&path) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("Could not load settings from '{}': {err}", path.display());
            Settings::default()
        }
    };
    change_window(windows, &settings);
    commands.insert_resource(CanPlay(settings.pick_starts_held));
    commands.insert_resource(settings);
    latch.settings_loaded = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("fretlab-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn creates_defaults_when_missing() {
        let path = scratch_dir("settings-create").join("settings.yaml");
        let _ = fs::remove_file(&path);

        let settings = load_or_create_settings(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(load_or_create_settings(&path).unwrap(), settings);
    }

    #[test]
    fn reads_partial_files() {
        let path = scratch_dir("settings-partial").join("settings.yaml");
        fs::write(&path, "pick_starts_held: true\n").unwrap();

        let settings = load_or_create_settings(&path).unwrap();
        assert!(settings.pick_starts_held);
        assert_eq!(settings.window, Settings::default().window);
    }

    #[test]
    fn rejects_malformed_files() {
        let path = scratch_dir("settings-bad").join("settings.yaml");
        fs::write(&path, "window: 12\n").unwrap();
        assert!(matches!(load_or_create_settings(&path), Err(ConfigError::Yaml(_))));
    }
}
