use bevy::picking::hover::HoverMap;
use bevy::picking::pointer::PointerId;
use bevy::prelude::*;
use bevy::window::{CursorLeft, PrimaryWindow};

use crate::game::ChordGame;
use crate::guitar::cache::{GuitarModel, MeshCache};
use crate::guitar::interaction::{CanPlay, InteractionState, PlayRequest, StringPressed, Strummer};
use crate::guitar::selection::ChordSelection;
use crate::guitar::types::RegionKey;
use crate::scenes::MainCamera;

/// Region under the cursor, in the guitar's local space.
fn region_under_cursor(
    window: &Window,
    camera: (&Camera, &GlobalTransform),
    guitar: &GlobalTransform,
    cache: &MeshCache,
) -> Option<RegionKey> {
    let cursor = window.cursor_position()?;
    let (camera, camera_transform) = camera;
    let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;
    let to_local = guitar.affine().inverse();
    let origin = to_local.transform_point3(ray.origin);
    let direction = to_local.transform_vector3(*ray.direction);
    cache.pick(origin, direction).map(|region| region.key)
}

/// UI panels sit in front of the guitar and take the mouse first.
fn pointer_over_ui(hover_map: &HoverMap, ui_nodes: &Query<(), With<Node>>) -> bool {
    hover_map
        .get(&PointerId::Mouse)
        .is_some_and(|hovered| hovered.keys().any(|entity| ui_nodes.contains(*entity)))
}

fn dispatch(
    request: PlayRequest,
    plays: &mut MessageWriter<PlayRequest>,
    presses: &mut MessageWriter<StringPressed>,
) {
    debug!("Play {} ({:?})", request.region, request.source);
    if request.reports_press() {
        presses.write(StringPressed {
            string: request.string,
            fret: request.fret,
        });
    }
    plays.write(request);
}

#[allow(clippy::too_many_arguments)]
pub fn pointer_input(
    buttons: Res<ButtonInput<MouseButton>>,
    mut cursor_left: MessageReader<CursorLeft>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    guitar: Query<&GlobalTransform, With<GuitarModel>>,
    ui_nodes: Query<(), With<Node>>,
    hover_map: Option<Res<HoverMap>>,
    cache: Res<MeshCache>,
    selection: Res<ChordSelection>,
    can_play: Res<CanPlay>,
    mut state: ResMut<InteractionState>,
    mut pressed_region: Local<Option<RegionKey>>,
    mut plays: MessageWriter<PlayRequest>,
    mut presses: MessageWriter<StringPressed>,
) {
    if cursor_left.read().last().is_some() {
        state.pointer_up();
        *pressed_region = None;
    }

    let (Ok(window), Ok(camera), Ok(guitar)) = (windows.single(), cameras.single(), guitar.single())
    else {
        return;
    };
    let over_ui = hover_map.is_some_and(|map| pointer_over_ui(&map, &ui_nodes));
    let hit = if over_ui {
        None
    } else {
        region_under_cursor(window, camera, guitar, &cache)
    };
    let chord = selection.active();

    if buttons.just_pressed(MouseButton::Left) {
        *pressed_region = hit;
        if over_ui {
            return;
        }
        if let Some(request) = state.pointer_down(hit, chord, can_play.0) {
            dispatch(request, &mut plays, &mut presses);
        }
    } else if buttons.just_released(MouseButton::Left) {
        if hit.is_some() && hit == *pressed_region {
            if let Some(request) = state.click(hit, can_play.0) {
                dispatch(request, &mut plays, &mut presses);
            }
        }
        *pressed_region = None;
        state.pointer_up();
    } else if buttons.pressed(MouseButton::Left) {
        if let Some(request) = state.pointer_move(hit, chord, can_play.0) {
            dispatch(request, &mut plays, &mut presses);
        }
    }
}

pub fn strum_input(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    selection: Res<ChordSelection>,
    can_play: Res<CanPlay>,
    mut strummer: ResMut<Strummer>,
    mut plays: MessageWriter<PlayRequest>,
    mut presses: MessageWriter<StringPressed>,
) {
    if keys.just_pressed(KeyCode::Space) && can_play.0 {
        if let Some(first) = strummer.start(selection.active()) {
            dispatch(first, &mut plays, &mut presses);
        }
    }
    for request in strummer.tick(time.delta()) {
        dispatch(request, &mut plays, &mut presses);
    }
}

/// `P` picks up or puts down the pick in free play.
pub fn toggle_pick(keys: Res<ButtonInput<KeyCode>>, mut can_play: ResMut<CanPlay>) {
    if keys.just_pressed(KeyCode::KeyP) {
        can_play.0 = !can_play.0;
        info!("Pick {}", if can_play.0 { "held" } else { "released" });
    }
}

/// In the game the strings only answer while a round is running.
pub fn follow_game_status(game: Res<ChordGame>, mut can_play: ResMut<CanPlay>) {
    can_play.set_if_neq(CanPlay(game.is_playing()));
}
