use bevy::prelude::*;
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use crate::guitar::animation::{ChordAnimator, Marker, MarkerId, PhaseChange};
use crate::guitar::cache::{GeneratedNode, MeshCache, MeshCacheRebuilt};
use crate::guitar::selection::ChordChanged;
use crate::guitar::shape::{layout_markers, resolve_shape, MarkerPlacement};
use crate::guitar::types::{unfingered_color, Chord, Finger};

const DOT_RADIUS: f32 = 0.02;
const BAR_RADIUS: f32 = 0.01;

pub struct ChordMarkersPlugin;

impl Plugin for ChordMarkersPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ChordAnimator>()
            .init_resource::<ShownChord>()
            .init_resource::<MarkerView>()
            .add_systems(Startup, setup_marker_meshes)
            .add_systems(
                Update,
                (
                    relayout_on_rebuild,
                    apply_chord_changes,
                    tick_chord_animator,
                    sync_marker_entities,
                )
                    .chain(),
            );
    }
}

/// The chord the fretboard is currently heading towards.
#[derive(Resource, Debug, Default)]
pub struct ShownChord(pub Option<Chord>);

#[derive(Component)]
pub struct ChordMarker(pub MarkerId);

#[derive(Resource)]
struct MarkerMeshes {
    dot: Handle<Mesh>,
}

struct MarkerEntity {
    root: Entity,
    material: Handle<StandardMaterial>,
}

#[derive(Resource, Default)]
struct MarkerView {
    scene: Option<Entity>,
    markers: HashMap<MarkerId, MarkerEntity>,
}

fn setup_marker_meshes(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    commands.insert_resource(MarkerMeshes {
        dot: meshes.add(Circle::new(DOT_RADIUS)),
    });
}

fn marker_color(placement: &MarkerPlacement) -> Color {
    placement.finger().map_or_else(unfingered_color, Finger::color)
}

/// Transform of a marker's root entity, relative to the guitar scene.
pub fn marker_transform(marker: &Marker) -> Transform {
    let visual = &marker.visual;
    match marker.placement {
        MarkerPlacement::Dot { position, .. } => Transform::from_translation(position)
            .with_rotation(Quat::from_rotation_x(-FRAC_PI_2))
            .with_scale(visual.scale),
        MarkerPlacement::Bar { center, .. } => {
            Transform::from_translation(center + Vec3::X * visual.slide).with_scale(visual.scale)
        }
    }
}

fn bar_rotation() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2) * Quat::from_rotation_z(FRAC_PI_2)
}

pub fn apply_chord_changes(
    mut changes: MessageReader<ChordChanged>,
    cache: Res<MeshCache>,
    mut shown: ResMut<ShownChord>,
    mut animator: ResMut<ChordAnimator>,
) {
    let mut pending = changes.read();
    let Some(first) = pending.next() else {
        return;
    };
    let previous = first.previous.clone();
    let next = pending.last().unwrap_or(first).next.clone();

    let layout = layout_markers(next.as_ref(), &*cache);
    let previous_shape = resolve_shape(previous.as_ref());
    let next_shape = resolve_shape(next.as_ref());
    animator.transition(previous_shape.as_ref(), next_shape.as_ref(), layout);
    shown.0 = next;
}

/// A rebuilt cache invalidates every anchor, so the shown chord is placed
/// again without animating.
pub fn relayout_on_rebuild(
    mut rebuilt: MessageReader<MeshCacheRebuilt>,
    cache: Res<MeshCache>,
    shown: Res<ShownChord>,
    mut animator: ResMut<ChordAnimator>,
) {
    if rebuilt.read().last().is_none() {
        return;
    }
    animator.show(layout_markers(shown.0.as_ref(), &*cache));
}

pub fn tick_chord_animator(time: Res<Time>, mut animator: ResMut<ChordAnimator>) {
    if !animator.is_animating() {
        return;
    }
    match animator.tick(time.delta_secs()) {
        Some(PhaseChange::EnterStarted { kind, retired }) => {
            debug!("{kind:?}: {} markers retired", retired.len());
        }
        Some(PhaseChange::Settled { kind }) => debug!("{kind:?}: settled"),
        None => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn sync_marker_entities(
    mut commands: Commands,
    animator: Res<ChordAnimator>,
    cache: Res<MeshCache>,
    marker_meshes: Option<Res<MarkerMeshes>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut view: ResMut<MarkerView>,
    mut transforms: Query<&mut Transform, With<ChordMarker>>,
) {
    if !animator.is_changed() && !cache.is_changed() {
        return;
    }
    let Some(marker_meshes) = marker_meshes else {
        return;
    };

    if view.scene != cache.scene() {
        for (_, entity) in view.markers.drain() {
            if let Ok(mut root) = commands.get_entity(entity.root) {
                root.despawn();
            }
            materials.remove(&entity.material);
        }
        view.scene = cache.scene();
    }
    let Some(scene) = view.scene else {
        return;
    };

    let live: Vec<MarkerId> = animator.markers().iter().map(|marker| marker.id).collect();
    view.markers.retain(|id, entity| {
        if live.contains(id) {
            return true;
        }
        if let Ok(mut root) = commands.get_entity(entity.root) {
            root.despawn();
        }
        materials.remove(&entity.material);
        false
    });

    for marker in animator.markers() {
        let transform = marker_transform(marker);
        let color = marker_color(&marker.placement).with_alpha(marker.visual.opacity);

        if let Some(entity) = view.markers.get(&marker.id) {
            if let Ok(mut current) = transforms.get_mut(entity.root) {
                *current = transform;
            }
            if let Some(material) = materials.get_mut(&entity.material) {
                material.base_color = color;
            }
            continue;
        }

        let material = materials.add(StandardMaterial {
            base_color: color,
            alpha_mode: AlphaMode::Blend,
            double_sided: true,
            cull_mode: None,
            ..default()
        });

        let root = match marker.placement {
            MarkerPlacement::Dot { string, fret, .. } => commands
                .spawn((
                    Name::new(format!("Marker {string} fret {fret}")),
                    ChordMarker(marker.id),
                    GeneratedNode,
                    Mesh3d(marker_meshes.dot.clone()),
                    MeshMaterial3d(material.clone()),
                    transform,
                    ChildOf(scene),
                ))
                .id(),
            MarkerPlacement::Bar { barre, length, .. } => {
                let bar = meshes.add(Capsule2d::new(BAR_RADIUS, length));
                commands
                    .spawn((
                        Name::new(format!("Barre fret {}", barre.fret)),
                        ChordMarker(marker.id),
                        GeneratedNode,
                        transform,
                        Visibility::default(),
                        ChildOf(scene),
                    ))
                    .with_child((
                        GeneratedNode,
                        Mesh3d(bar),
                        MeshMaterial3d(material.clone()),
                        Transform::from_rotation(bar_rotation()),
                    ))
                    .id()
            }
        };
        view.markers.insert(marker.id, MarkerEntity { root, material });
    }
}
