use std::collections::BTreeMap;

use bevy::{
    asset::{io::Reader, AssetLoader, LoadContext, LoadState},
    prelude::*,
    reflect::TypePath,
};
use serde::Deserialize;
use thiserror::Error;

use crate::file::config::AppConfig;
use crate::game::{ChordGame, TargetChord};
use crate::guitar::types::{Chord, TensionType};
use crate::states::StartupLatch;

/// Every chord the app knows, plus the tension variants of each base chord.
#[derive(Asset, TypePath, Resource, Debug, Clone, Default, Deserialize)]
pub struct ChordLibrary {
    #[serde(default)]
    pub majors: Vec<String>,
    #[serde(default)]
    pub minors: Vec<String>,
    pub chords: BTreeMap<String, Chord>,
    #[serde(default)]
    pub tensions: BTreeMap<String, BTreeMap<TensionType, Chord>>,
}

#[derive(Debug, Error)]
pub enum ChordLibraryError {
    #[error("I/O error while loading chord library: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse chord library: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Chord '{0}' is listed but has no fingering")]
    UnknownChord(String),

    #[error("Tensions given for unknown chord '{0}'")]
    UnknownTensionBase(String),
}

impl ChordLibrary {
    pub fn from_yaml_str(content: &str) -> Result<Self, ChordLibraryError> {
        Self::from_yaml_slice(content.as_bytes())
    }

    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self, ChordLibraryError> {
        let library: ChordLibrary = serde_yaml::from_slice(bytes)?;
        library.check_names()?;
        Ok(library)
    }

    fn check_names(&self) -> Result<(), ChordLibraryError> {
        if let Some(name) = self
            .majors
            .iter()
            .chain(&self.minors)
            .find(|name| !self.chords.contains_key(*name))
        {
            return Err(ChordLibraryError::UnknownChord(name.clone()));
        }
        if let Some(name) = self.tensions.keys().find(|name| !self.chords.contains_key(*name)) {
            return Err(ChordLibraryError::UnknownTensionBase(name.clone()));
        }
        Ok(())
    }

    pub fn chord(&self, name: &str) -> Option<&Chord> {
        self.chords.get(name)
    }

    pub fn tension(&self, name: &str, tension: TensionType) -> Option<&Chord> {
        self.tensions.get(name)?.get(&tension)
    }

    pub fn has_tension(&self, name: &str, tension: TensionType) -> bool {
        self.tension(name, tension).is_some()
    }

    /// Majors, then minors, then anything else in name order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .majors
            .iter()
            .chain(&self.minors)
            .map(String::as_str)
            .collect();
        for name in self.chords.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Chords the game draws its targets from: every major and minor.
    pub fn game_pool(&self) -> Vec<TargetChord> {
        self.majors
            .iter()
            .chain(&self.minors)
            .filter_map(|name| {
                self.chords.get(name).map(|chord| TargetChord {
                    name: name.clone(),
                    chord: chord.clone(),
                })
            })
            .collect()
    }
}

#[derive(Default)]
pub struct ChordLibraryLoader;

impl AssetLoader for ChordLibraryLoader {
    type Asset = ChordLibrary;
    type Settings = ();
    type Error = ChordLibraryError;

    fn extensions(&self) -> &[&str] {
        &["chords"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &(),
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        ChordLibrary::from_yaml_slice(&bytes)
    }
}

#[derive(Resource)]
pub struct ChordLibraryHandle(pub Handle<ChordLibrary>);

pub fn load_chord_library(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    config: Res<AppConfig>,
) {
    let handle = asset_server.load::<ChordLibrary>(config.paths.chord_library.clone());
    commands.insert_resource(ChordLibraryHandle(handle));
}

/// Copies the loaded library into a resource and fills the game's chord pool.
/// A library that fails to load leaves the app running with no chords.
pub fn finish_chord_library(
    mut commands: Commands,
    handle: Option<Res<ChordLibraryHandle>>,
    asset_server: Res<AssetServer>,
    libraries: Res<Assets<ChordLibrary>>,
    mut game: ResMut<ChordGame>,
    mut latch: ResMut<StartupLatch>,
) {
    let Some(handle) = handle else {
        return;
    };
    if latch.chords_loaded {
        return;
    }

    let library = if let Some(library) = libraries.get(&handle.0) {
        info!(
            "Loaded {} chords with {} tension sets",
            library.chords.len(),
            library.tensions.len()
        );
        library.clone()
    } else if let LoadState::Failed(err) = asset_server.load_state(handle.0.id()) {
        error!("Could not load chord library: {err}");
        ChordLibrary::default()
    } else {
        return;
    };

    game.set_pool(library.game_pool());
    commands.insert_resource(library);
    latch.chords_loaded = true;
}
