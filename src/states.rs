use bevy::prelude::*;

use crate::file::chords::{finish_chord_library, load_chord_library, ChordLibrary, ChordLibraryLoader};
use crate::file::settings::setup_settings;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum AppState {
    #[default]
    InitialLoad,
    Explore,
    ChordGame,
}

// Latches gate the transition out of InitialLoad until every loader has reported in.

#[derive(Resource, Default)]
pub struct StartupLatch {
    pub settings_loaded: bool,
    pub chords_loaded: bool,
}

impl StartupLatch {
    pub fn is_complete(&self) -> bool {
        self.settings_loaded && self.chords_loaded
    }
}

pub fn check_startup_complete(latch: Res<StartupLatch>, mut next_state: ResMut<NextState<AppState>>) {
    if latch.is_complete() {
        info!("Startup complete");
        next_state.set(AppState::Explore);
    }
}

pub fn toggle_mode(
    keys: Res<ButtonInput<KeyCode>>,
    state: Res<State<AppState>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if !keys.just_pressed(KeyCode::Tab) {
        return;
    }
    match state.get() {
        AppState::Explore => next_state.set(AppState::ChordGame),
        AppState::ChordGame => next_state.set(AppState::Explore),
        AppState::InitialLoad => {}
    }
}

pub struct StartupPlugin;

impl Plugin for StartupPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<ChordLibrary>()
            .init_asset_loader::<ChordLibraryLoader>()
            .insert_resource(StartupLatch::default())
            .add_systems(
                OnEnter(AppState::InitialLoad),
                (setup_settings, load_chord_library),
            )
            .add_systems(
                Update,
                (finish_chord_library, check_startup_complete)
                    .chain()
                    .run_if(in_state(AppState::InitialLoad)),
            )
            .add_systems(
                Update,
                toggle_mode.run_if(not(in_state(AppState::InitialLoad))),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_waits_for_every_loader() {
        let mut latch = StartupLatch::default();
        assert!(!latch.is_complete());
        latch.settings_loaded = true;
        assert!(!latch.is_complete());
        latch.chords_loaded = true;
        assert!(latch.is_complete());
    }
}
