use bevy::{
    diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin},
    prelude::*,
};

use crate::audio::GuitarAudio;
use crate::guitar::cache::MeshCache;
use crate::widgets::label;

const DEBUG_TEXT_COLOR: Color = Color::srgb(1.0, 1.0, 1.0);

#[derive(Component)]
pub struct FpsText;

#[derive(Component)]
pub struct GuitarStatsText;

pub fn spawn_fps_counter(mut commands: Commands) {
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                right: Val::Px(20.0),
                bottom: Val::Px(20.0),
                flex_direction: FlexDirection::Column,
                padding: UiRect::all(Val::Px(8.0)),
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
            Pickable::IGNORE,
        ))
        .with_children(|parent| {
            parent
                .spawn(label("FPS: ", 16.0, DEBUG_TEXT_COLOR))
                .with_child((
                    TextSpan::default(),
                    TextFont {
                        font_size: 16.0,
                        ..default()
                    },
                    TextColor(DEBUG_TEXT_COLOR),
                    FpsText,
                ));
            parent.spawn((label("", 14.0, DEBUG_TEXT_COLOR), GuitarStatsText));
        });
}

pub fn update_fps_text(
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut TextSpan, With<FpsText>>,
) {
    for mut span in &mut query {
        if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(value) = fps.smoothed() {
                **span = format!("{value:.0}");
            }
        }
    }
}

pub fn update_guitar_stats(
    audio: Res<GuitarAudio>,
    cache: Res<MeshCache>,
    mut query: Query<&mut Text, With<GuitarStatsText>>,
) {
    for mut text in &mut query {
        text.0 = format!(
            "Samples: {}  Hit regions: {}",
            audio.sample_count(),
            cache.regions().len()
        );
    }
}
