use bevy::prelude::*;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "fretlab.cfg";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("could not find the user config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Default, Deserialize, Resource)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub paths: PathConfig,
    pub saves: SaveConfig,
    pub audio: AudioConfig,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Fretlab".to_string(),
        }
    }
}

/// Asset paths, relative to the `assets` folder.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub guitar_model: String,
    pub chord_library: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            guitar_model: "models/guitar.glb".to_string(),
            chord_library: "chords/library.chords".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Relative to the user config directory until [`ConfigPlugin`] resolves it.
    pub directory: PathBuf,
    pub settings_file: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("fretlab"),
            settings_file: "settings.yaml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Linear amplitude applied to every sample.
    pub gain: f32,
    pub debounce_ms: u64,
    pub note_display_ms: u64,
    pub strum_step_ms: u64,
    pub samples_dir: PathBuf,
    pub sample_extension: String,
    pub max_fret: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            gain: 0.3,
            debounce_ms: 250,
            note_display_ms: 2000,
            strum_step_ms: 50,
            samples_dir: PathBuf::from("assets/sounds"),
            sample_extension: "ogg".to_string(),
            max_fret: 20,
        }
    }
}

impl AudioConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn note_display(&self) -> Duration {
        Duration::from_millis(self.note_display_ms)
    }

    pub fn strum_step(&self) -> Duration {
        Duration::from_millis(self.strum_step_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub round_secs: u32,
    pub wrong_penalty_secs: u32,
    pub feedback_hold_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_secs: 30,
            wrong_penalty_secs: 2,
            feedback_hold_ms: 1000,
        }
    }
}

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        let mut config = match load_config(Path::new(CONFIG_FILE)) {
            Ok(config) => config,
            Err(ConfigError::Read { path, source }) if source.kind() == io::ErrorKind::NotFound => {
                warn!("Config file not found at '{}', using defaults", path.display());
                AppConfig::default()
            }
            Err(err) => {
                error!("Invalid config in '{CONFIG_FILE}': {err}; using defaults");
                AppConfig::default()
            }
        };

        match get_save_directory(&config.saves.directory) {
            Ok(save_path) => {
                if let Err(source) = fs::create_dir_all(&save_path) {
                    warn!("Failed to create save directory '{}': {source}", save_path.display());
                }
                config.saves.directory = save_path;
            }
            Err(err) => warn!("{err}; settings will not be saved"),
        }
        app.insert_resource(config);
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

fn get_save_directory(save_dir: &Path) -> Result<PathBuf, ConfigError> {
    if save_dir.is_absolute() {
        return Ok(save_dir.to_path_buf());
    }
    let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    path.push(save_dir);
    Ok(path)
}
