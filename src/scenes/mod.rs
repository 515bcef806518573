use bevy::prelude::*;

use crate::audio::{GuitarAudio, NotePlayed};
use crate::file::config::AppConfig;
use crate::guitar::cache::GuitarModel;
use crate::widgets::label;

pub mod chord_game;
pub mod explore;

const CAMERA_POSITION: Vec3 = Vec3::new(0.3, 6.0, 0.01);
const CAMERA_FOV_DEGREES: f32 = 30.0;
const NOTE_FONT_SIZE: f32 = 40.0;

#[derive(Component)]
pub struct MainCamera;

#[derive(Component)]
struct NoteLabel;

pub struct ScenesPlugin;

impl Plugin for ScenesPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((explore::ExplorePlugin, chord_game::ChordGameScenePlugin))
            .add_systems(Startup, (setup_camera, setup_guitar, setup_note_label))
            .add_systems(Update, update_note_label);
    }
}

pub fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: CAMERA_FOV_DEGREES.to_radians(),
            ..default()
        }),
        Transform::from_translation(CAMERA_POSITION).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(5.0, 10.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// The mesh cache picks the scene up once its named nodes appear.
pub fn setup_guitar(mut commands: Commands, asset_server: Res<AssetServer>, config: Res<AppConfig>) {
    info!("Loading guitar model from '{}'", config.paths.guitar_model);
    commands.spawn((
        Name::new("Guitar"),
        GuitarModel,
        SceneRoot(
            asset_server.load(GltfAssetLabel::Scene(0).from_asset(config.paths.guitar_model.clone())),
        ),
        Transform::default(),
    ));
}

fn setup_note_label(mut commands: Commands) {
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                bottom: Val::Px(24.0),
                width: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                ..default()
            },
            Pickable::IGNORE,
        ))
        .with_child((
            label("", NOTE_FONT_SIZE, Color::WHITE),
            NoteLabel,
            Pickable::IGNORE,
        ));
}

fn update_note_label(
    mut played: MessageReader<NotePlayed>,
    audio: Res<GuitarAudio>,
    mut labels: Query<&mut Text, With<NoteLabel>>,
) {
    let Ok(mut text) = labels.single_mut() else {
        return;
    };
    if let Some(note) = played.read().last() {
        text.0 = note.note.clone();
    } else if audio.current_note().is_none() && !text.0.is_empty() {
        text.0.clear();
    }
}
