use bevy::{
    prelude::*,
    window::{ExitCondition, PrimaryWindow, WindowPlugin},
};

use fretlab::audio::GuitarAudioPlugin;
use fretlab::components::ChordMarkersPlugin;
use fretlab::file::config::{AppConfig, ConfigPlugin};
use fretlab::game::ChordGamePlugin;
use fretlab::guitar::GuitarPlugin;
use fretlab::scenes::ScenesPlugin;
use fretlab::states::{AppState, StartupPlugin};
use fretlab::widgets::WidgetsPlugin;

#[cfg(not(feature = "production"))]
use fretlab::debug::DebugPlugin;

fn main() {
    App::new()
        .add_plugins((
            ConfigPlugin,
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Fretlab".to_string(),
                    ..default()
                }),
                exit_condition: ExitCondition::OnPrimaryClosed,
                ..default()
            }),
            #[cfg(not(feature = "production"))]
            DebugPlugin,
            WidgetsPlugin,
            StartupPlugin,
            GuitarPlugin,
            GuitarAudioPlugin,
            ChordMarkersPlugin,
            ChordGamePlugin,
            ScenesPlugin,
        ))
        .init_state::<AppState>()
        .add_systems(Startup, apply_window_title)
        .run();
}

fn apply_window_title(config: Res<AppConfig>, mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    if let Ok(mut window) = windows.single_mut() {
        window.title = config.window.title.clone();
    }
}
