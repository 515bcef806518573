use bevy::camera::primitives::Aabb;
use bevy::prelude::*;
use std::collections::HashMap;

use crate::guitar::shape::FretboardGeometry;
use crate::guitar::types::{Note, RegionKey};

pub const HITBOX_GROUP_NAME: &str = "StringHitboxes";

const HITBOX_WIDTH: f32 = 0.03;
const HITBOX_HEIGHT: f32 = 0.01;
const HITBOX_LENGTH_TRIM: f32 = 0.01;
const MIN_HITBOX_LENGTH: f32 = 0.005;

/// Root of the loaded guitar scene. Everything the cache indexes lives below it.
#[derive(Component)]
pub struct GuitarModel;

/// Entities this crate spawns into the guitar scene. They are never indexed.
#[derive(Component)]
pub struct GeneratedNode;

#[derive(Component)]
pub struct HitRegionGroup;

/// Invisible, enlarged box around one `String_<n>_<fret>` segment, in the
/// guitar's local space.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct HitRegion {
    pub key: RegionKey,
    pub note: Option<Note>,
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl HitRegion {
    fn around(key: RegionKey, center: Vec3, size: Vec3) -> Self {
        let length = (size.z - HITBOX_LENGTH_TRIM).max(MIN_HITBOX_LENGTH);
        Self {
            key,
            note: if key.is_open() { key.note() } else { None },
            center,
            half_extents: Vec3::new(HITBOX_WIDTH, HITBOX_HEIGHT, length) / 2.0,
        }
    }

    /// Slab test. Returns the distance along `direction` to the first hit.
    pub fn ray_distance(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;
        let mut near = f32::NEG_INFINITY;
        let mut far = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < f32::EPSILON {
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (min[axis] - o) / d;
            let t2 = (max[axis] - o) / d;
            near = near.max(t1.min(t2));
            far = far.min(t1.max(t2));
            if near > far {
                return None;
            }
        }

        if far < 0.0 {
            return None;
        }
        Some(near.max(0.0))
    }
}

/// A named node found while walking the scene, already in guitar-local space.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub entity: Entity,
    pub name: String,
    pub origin: Vec3,
    pub center: Vec3,
    pub size: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub entity: Entity,
    pub position: Vec3,
}

pub fn parse_fret_name(name: &str) -> Option<u8> {
    let digits = name.strip_prefix("Fret")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Lookup tables from logical strings and frets to scene nodes. The cache
/// refers to scene entities but never owns them; it owns only the hit-region
/// group it spawned.
#[derive(Resource, Default, Debug)]
pub struct MeshCache {
    scene: Option<Entity>,
    strings: HashMap<Note, Anchor>,
    frets: HashMap<u8, Anchor>,
    regions: Vec<HitRegion>,
    hitbox_group: Option<Entity>,
    generation: u64,
}

impl MeshCache {
    pub fn index(scene: Entity, nodes: impl IntoIterator<Item = SceneNode>) -> Self {
        let mut cache = MeshCache {
            scene: Some(scene),
            ..default()
        };

        for node in nodes {
            if let Ok(key) = node.name.parse::<RegionKey>() {
                let region = HitRegion::around(key, node.center, node.size);
                if let Some(note) = region.note {
                    cache.strings.insert(
                        note,
                        Anchor {
                            entity: node.entity,
                            position: node.origin,
                        },
                    );
                }
                cache.regions.push(region);
            } else if let Some(fret) = parse_fret_name(&node.name) {
                cache.frets.insert(
                    fret,
                    Anchor {
                        entity: node.entity,
                        position: node.origin,
                    },
                );
            }
        }

        cache.regions.sort_by_key(|region| region.key);
        cache
    }

    pub fn scene(&self) -> Option<Entity> {
        self.scene
    }

    pub fn string_node(&self, note: Note) -> Option<Entity> {
        self.strings.get(&note).map(|anchor| anchor.entity)
    }

    pub fn fret_node(&self, fret: u8) -> Option<Entity> {
        self.frets.get(&fret).map(|anchor| anchor.entity)
    }

    pub fn regions(&self) -> &[HitRegion] {
        &self.regions
    }

    pub fn region(&self, key: RegionKey) -> Option<&HitRegion> {
        self.regions
            .binary_search_by_key(&key, |region| region.key)
            .ok()
            .map(|index| &self.regions[index])
    }

    pub fn hitbox_group(&self) -> Option<Entity> {
        self.hitbox_group
    }

    /// Bumped on every rebuild so dependants can tell a fresh index apart.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn fret_count(&self) -> usize {
        self.frets.len()
    }

    /// Nearest hit region along a ray given in guitar-local space.
    pub fn pick(&self, origin: Vec3, direction: Vec3) -> Option<&HitRegion> {
        self.regions
            .iter()
            .filter_map(|region| {
                region
                    .ray_distance(origin, direction)
                    .map(|distance| (distance, region))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, region)| region)
    }
}

impl FretboardGeometry for MeshCache {
    fn string_anchor(&self, note: Note) -> Option<Vec3> {
        self.strings.get(&note).map(|anchor| anchor.position)
    }

    fn fret_anchor(&self, fret: u8) -> Option<Vec3> {
        self.frets.get(&fret).map(|anchor| anchor.position)
    }
}

#[derive(Resource, Default)]
pub struct SceneDirty(pub bool);

#[derive(Message, Debug, Clone, Copy)]
pub struct MeshCacheRebuilt {
    pub scene: Entity,
    pub generation: u64,
}

pub fn mark_scene_dirty(
    added_names: Query<(), (Added<Name>, Without<GeneratedNode>)>,
    changed_scene: Query<(), (With<GuitarModel>, Changed<SceneRoot>)>,
    mut dirty: ResMut<SceneDirty>,
) {
    if !added_names.is_empty() || !changed_scene.is_empty() {
        dirty.0 = true;
    }
}

#[allow(clippy::too_many_arguments)]
pub fn rebuild_mesh_cache(
    mut commands: Commands,
    mut dirty: ResMut<SceneDirty>,
    mut cache: ResMut<MeshCache>,
    guitar: Query<(Entity, &GlobalTransform), With<GuitarModel>>,
    children: Query<&Children>,
    named: Query<(&Name, &GlobalTransform, Option<&Aabb>), Without<GeneratedNode>>,
    bounds: Query<(&Aabb, &GlobalTransform)>,
    old_groups: Query<(Entity, &ChildOf), With<HitRegionGroup>>,
    mut rebuilt: MessageWriter<MeshCacheRebuilt>,
) {
    if !dirty.0 {
        return;
    }
    dirty.0 = false;

    let Ok((scene, scene_transform)) = guitar.single() else {
        return;
    };
    let to_local = scene_transform.affine().inverse();

    let mut nodes = Vec::new();
    for entity in children.iter_descendants(scene) {
        let Ok((name, transform, aabb)) = named.get(entity) else {
            continue;
        };
        let name = name.as_str();
        if name.parse::<RegionKey>().is_err() && parse_fret_name(name).is_none() {
            continue;
        }

        let origin = to_local.transform_point3(transform.translation());
        let world_bounds = aabb
            .map(|aabb| (*aabb, *transform))
            .or_else(|| {
                children
                    .iter_descendants(entity)
                    .find_map(|child| bounds.get(child).ok())
                    .map(|(aabb, transform)| (*aabb, *transform))
            });

        let (center, size) = match world_bounds {
            Some((aabb, transform)) => {
                let center = transform.transform_point(Vec3::from(aabb.center));
                let extent = transform
                    .affine()
                    .transform_vector3(Vec3::from(aabb.half_extents) * 2.0);
                (
                    to_local.transform_point3(center),
                    to_local.transform_vector3(extent).abs(),
                )
            }
            None => (origin, Vec3::ZERO),
        };

        nodes.push(SceneNode {
            entity,
            name: name.to_string(),
            origin,
            center,
            size,
        });
    }

    let mut stale: Vec<Entity> = old_groups
        .iter()
        .filter(|(_, child_of)| child_of.parent() == scene)
        .map(|(group, _)| group)
        .collect();
    stale.extend(cache.hitbox_group.take());
    stale.sort();
    stale.dedup();
    for group in stale {
        if let Ok(mut entity) = commands.get_entity(group) {
            entity.despawn();
        }
    }

    let mut next = MeshCache::index(scene, nodes);
    next.generation = cache.generation + 1;

    let group = commands
        .spawn((
            Name::new(HITBOX_GROUP_NAME),
            HitRegionGroup,
            GeneratedNode,
            Transform::default(),
            Visibility::Hidden,
            ChildOf(scene),
        ))
        .id();
    for region in next.regions() {
        commands.spawn((
            Name::new(region.key.to_string()),
            *region,
            GeneratedNode,
            Transform::from_translation(region.center).with_scale(region.half_extents * 2.0),
            Visibility::Hidden,
            ChildOf(group),
        ));
    }
    next.hitbox_group = Some(group);

    info!(
        "Indexed guitar scene: {} strings, {} frets, {} hit regions",
        next.string_count(),
        next.fret_count(),
        next.regions().len()
    );
    if next.string_count() < Note::ALL.len() {
        warn!("Guitar scene is missing open-string nodes; some markers will not render");
    }

    rebuilt.write(MeshCacheRebuilt {
        scene,
        generation: next.generation,
    });
    *cache = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(entity: Entity, name: &str, origin: Vec3) -> SceneNode {
        SceneNode {
            entity,
            name: name.to_string(),
            origin,
            center: origin,
            size: Vec3::new(0.002, 0.002, 0.05),
        }
    }

    fn sample_nodes(world: &mut World) -> Vec<SceneNode> {
        let mut nodes = Vec::new();
        for note in Note::ALL {
            for fret in 0..3u8 {
                let name = format!("String_{}_{}", note.string_number(), fret);
                let origin = Vec3::new(note.string_number() as f32 * 0.01, 0.0, fret as f32 * 0.05);
                nodes.push(node(world.spawn_empty().id(), &name, origin));
            }
        }
        for fret in 1..3u8 {
            nodes.push(node(
                world.spawn_empty().id(),
                &format!("Fret{fret}"),
                Vec3::new(0.0, 0.0, fret as f32 * 0.05),
            ));
        }
        nodes.push(node(world.spawn_empty().id(), "Body", Vec3::ZERO));
        nodes
    }

    fn sample_cache() -> (Entity, MeshCache) {
        let mut world = World::new();
        let scene = world.spawn_empty().id();
        let nodes = sample_nodes(&mut world);
        (scene, MeshCache::index(scene, nodes))
    }

    #[test]
    fn indexes_open_strings_frets_and_regions() {
        let (scene, cache) = sample_cache();

        assert_eq!(cache.scene(), Some(scene));
        assert_eq!(cache.string_count(), 6);
        assert_eq!(cache.fret_count(), 2);
        assert_eq!(cache.regions().len(), 18);
        assert_eq!(cache.string_anchor(Note::A), Some(Vec3::new(0.05, 0.0, 0.0)));
        assert_eq!(cache.fret_anchor(2), Some(Vec3::new(0.0, 0.0, 0.1)));
        assert!(cache.fret_anchor(7).is_none());

        let open = cache.region(RegionKey::new(6, 0)).unwrap();
        assert_eq!(open.note, Some(Note::LowE));
        let fretted = cache.region(RegionKey::new(6, 2)).unwrap();
        assert_eq!(fretted.note, None);
    }

    #[test]
    fn hit_regions_are_larger_than_the_string() {
        let (_, cache) = sample_cache();
        let region = cache.region(RegionKey::new(3, 1)).unwrap();
        assert!(region.half_extents.x * 2.0 > 0.002);
        assert!(region.half_extents.y * 2.0 > 0.002);
        assert!((region.half_extents.z * 2.0 - 0.04).abs() < 1e-6);
    }

    #[test]
    fn fret_names_need_digits() {
        assert_eq!(parse_fret_name("Fret12"), Some(12));
        assert_eq!(parse_fret_name("Fret"), None);
        assert_eq!(parse_fret_name("Fretboard"), None);
    }

    #[test]
    fn pick_returns_the_nearest_region() {
        let (_, cache) = sample_cache();
        let target = cache.region(RegionKey::new(4, 1)).unwrap().center;

        let origin = target + Vec3::Y;
        let hit = cache.pick(origin, Vec3::NEG_Y).unwrap();
        assert_eq!(hit.key, RegionKey::new(4, 1));

        assert!(cache.pick(origin, Vec3::Y).is_none());
        assert!(cache.pick(Vec3::new(5.0, 1.0, 5.0), Vec3::NEG_Y).is_none());
    }

    fn spawn_test_scene(app: &mut App) -> Entity {
        let world = app.world_mut();
        let root = world
            .spawn((GuitarModel, Transform::default(), GlobalTransform::default()))
            .id();
        for note in Note::ALL {
            for fret in 0..2u8 {
                world.spawn((
                    Name::new(format!("String_{}_{}", note.string_number(), fret)),
                    GlobalTransform::from_translation(Vec3::new(
                        note.string_number() as f32 * 0.01,
                        0.0,
                        fret as f32 * 0.05,
                    )),
                    ChildOf(root),
                ));
            }
        }
        world.spawn((
            Name::new("Fret1"),
            GlobalTransform::from_translation(Vec3::new(0.0, 0.0, 0.05)),
            ChildOf(root),
        ));
        root
    }

    fn cache_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<MeshCache>()
            .init_resource::<SceneDirty>()
            .add_message::<MeshCacheRebuilt>()
            .add_systems(Update, (mark_scene_dirty, rebuild_mesh_cache).chain());
        app
    }

    #[test]
    fn rebuilding_replaces_the_hitbox_group() {
        let mut app = cache_app();
        spawn_test_scene(&mut app);
        app.update();

        let groups = |app: &mut App| {
            app.world_mut()
                .query_filtered::<Entity, With<HitRegionGroup>>()
                .iter(app.world())
                .count()
        };
        let regions = |app: &mut App| {
            app.world_mut()
                .query::<&HitRegion>()
                .iter(app.world())
                .count()
        };

        assert_eq!(groups(&mut app), 1);
        assert_eq!(regions(&mut app), 12);
        let first_generation = app.world().resource::<MeshCache>().generation();

        app.world_mut().resource_mut::<SceneDirty>().0 = true;
        app.update();
        app.update();

        assert_eq!(groups(&mut app), 1);
        assert_eq!(regions(&mut app), 12);
        let cache = app.world().resource::<MeshCache>();
        assert_eq!(cache.generation(), first_generation + 1);
        assert_eq!(cache.string_count(), 6);
        assert_eq!(cache.fret_count(), 1);
        assert_eq!(cache.regions().len(), 12);

        // Regions share the scene's naming but are never indexed themselves.
        let mut named = app.world_mut().query::<(&Name, &HitRegion)>();
        for (name, region) in named.iter(app.world()) {
            assert_eq!(name.as_str(), region.key.to_string());
            assert!(name.as_str().starts_with("String_"));
        }
    }

    #[test]
    fn generated_nodes_do_not_trigger_rebuilds() {
        let mut app = cache_app();
        spawn_test_scene(&mut app);
        app.update();
        let generation = app.world().resource::<MeshCache>().generation();

        app.update();
        app.update();
        assert_eq!(app.world().resource::<MeshCache>().generation(), generation);
    }
}
