use bevy::{diagnostic::FrameTimeDiagnosticsPlugin, prelude::*};

pub mod fps_counter;

pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(FrameTimeDiagnosticsPlugin::default())
            .add_systems(Startup, fps_counter::spawn_fps_counter)
            .add_systems(
                Update,
                (fps_counter::update_fps_text, fps_counter::update_guitar_stats),
            );
    }
}
