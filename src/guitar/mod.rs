use bevy::camera::visibility::VisibilitySystems;
use bevy::prelude::*;
use bevy::transform::TransformSystems;

use crate::file::config::AppConfig;
use crate::states::AppState;

pub mod animation;
pub mod cache;
pub mod input;
pub mod interaction;
pub mod selection;
pub mod shape;
pub mod types;

use cache::{mark_scene_dirty, rebuild_mesh_cache, MeshCache, MeshCacheRebuilt, SceneDirty};
use interaction::{CanPlay, InteractionState, PlayRequest, StringPressed, Strummer, DEFAULT_STRUM_STEP};
use selection::{ChordChanged, ChordSelection};

pub use types::{Chord, Finger, Note, RegionKey, TensionType};

pub struct GuitarPlugin;

impl Plugin for GuitarPlugin {
    fn build(&self, app: &mut App) {
        let strum_step = app
            .world()
            .get_resource::<AppConfig>()
            .map_or(DEFAULT_STRUM_STEP, |config| config.audio.strum_step());

        app.init_resource::<MeshCache>()
            .init_resource::<SceneDirty>()
            .init_resource::<InteractionState>()
            .init_resource::<ChordSelection>()
            .init_resource::<CanPlay>()
            .insert_resource(Strummer::new(strum_step))
            .add_message::<MeshCacheRebuilt>()
            .add_message::<ChordChanged>()
            .add_message::<PlayRequest>()
            .add_message::<StringPressed>()
            // Scene nodes only have their final transforms and bounds late in the frame.
            .add_systems(
                PostUpdate,
                (mark_scene_dirty, rebuild_mesh_cache)
                    .chain()
                    .after(TransformSystems::Propagate)
                    .after(VisibilitySystems::CalculateBounds),
            )
            .add_systems(
                Update,
                (input::pointer_input, input::strum_input)
                    .run_if(not(in_state(AppState::InitialLoad))),
            )
            .add_systems(Update, input::toggle_pick.run_if(in_state(AppState::Explore)))
            .add_systems(
                Update,
                input::follow_game_status
                    .before(input::pointer_input)
                    .run_if(in_state(AppState::ChordGame)),
            );
    }
}
