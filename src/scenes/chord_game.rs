use bevy::prelude::*;

use crate::game::{ChordGame, GameRng, GameStatus};
use crate::guitar::interaction::{CanPlay, Strummer};
use crate::states::AppState;
use crate::widgets::{label, ButtonBuilder};

const PANEL_COLOR: Color = Color::srgba(0.0, 0.0, 0.0, 0.7);
const CALM_TIME: Color = Color::srgb(0.13, 0.77, 0.37);
const LOW_TIME: Color = Color::srgb(0.92, 0.7, 0.03);
const CRITICAL_TIME: Color = Color::srgb(0.94, 0.27, 0.27);

pub struct ChordGameScenePlugin;

impl Plugin for ChordGameScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::ChordGame), spawn_game_hud)
            .add_systems(OnExit(AppState::ChordGame), leave_chord_game)
            .add_systems(
                Update,
                (game_keys, update_game_hud)
                    .chain()
                    .run_if(in_state(AppState::ChordGame)),
            )
            .add_observer(on_game_click);
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    Start,
    Check,
    Reset,
    ClearPresses,
    FreePlay,
}

#[derive(Component)]
struct GameHud;

#[derive(Component, Clone, Copy, PartialEq, Eq)]
enum HudText {
    Score,
    Target,
    Time,
    Feedback,
    Pressed,
}

pub fn time_color(time_left: u32) -> Color {
    match time_left {
        0..=5 => CRITICAL_TIME,
        6..=10 => LOW_TIME,
        _ => CALM_TIME,
    }
}

/// Banner shown while the game holds on a verdict, or at the end.
pub fn feedback_text(game: &ChordGame) -> Option<(String, Color)> {
    match game.status() {
        GameStatus::Correct => Some(("CORRECT!".to_string(), CALM_TIME)),
        GameStatus::Wrong => Some((
            format!("WRONG! -{} seconds", game.rules().wrong_penalty_secs),
            CRITICAL_TIME,
        )),
        GameStatus::GameOver => Some((format!("GAME OVER - score {}", game.score()), Color::WHITE)),
        GameStatus::Idle | GameStatus::Playing => None,
    }
}

fn pressed_text(game: &ChordGame) -> String {
    game.pressed()
        .iter()
        .filter(|(_, fret)| **fret > 0)
        .map(|(note, fret)| format!("{} {fret}", note.label()))
        .collect::<Vec<_>>()
        .join("  ")
}

fn apply_action(
    action: GameAction,
    game: &mut ChordGame,
    rng: &mut GameRng,
    strummer: &mut Strummer,
    next_state: &mut NextState<AppState>,
) {
    match action {
        GameAction::Start => {
            if matches!(game.status(), GameStatus::Idle | GameStatus::GameOver) {
                game.start(&mut rng.0);
            }
        }
        GameAction::Check => {
            if let Some(correct) = game.validate() {
                debug!("Chord check: {}", if correct { "correct" } else { "wrong" });
            }
        }
        GameAction::Reset => {
            strummer.cancel();
            game.reset();
        }
        GameAction::ClearPresses => game.clear_presses(),
        GameAction::FreePlay => next_state.set(AppState::Explore),
    }
}

fn spawn_stat(parent: &mut ChildSpawnerCommands, title: &str, text: HudText, size: f32) {
    parent
        .spawn((
            Node {
                flex_direction: FlexDirection::Column,
                align_items: AlignItems::Center,
                padding: UiRect::axes(Val::Px(24.0), Val::Px(10.0)),
                ..default()
            },
            BackgroundColor(PANEL_COLOR),
            BorderRadius::all(Val::Px(8.0)),
        ))
        .with_children(|panel| {
            panel.spawn(label(title, 14.0, Color::srgb(0.6, 0.6, 0.6)));
            panel.spawn((label("", size, Color::WHITE), text));
        });
}

fn spawn_game_hud(mut commands: Commands) {
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::SpaceBetween,
                padding: UiRect::all(Val::Px(16.0)),
                ..default()
            },
            Pickable::IGNORE,
            GameHud,
        ))
        .with_children(|root| {
            root.spawn((
                Node {
                    justify_content: JustifyContent::SpaceBetween,
                    align_items: AlignItems::Start,
                    ..default()
                },
                Pickable::IGNORE,
            ))
            .with_children(|top| {
                spawn_stat(top, "SCORE", HudText::Score, 36.0);
                top.spawn((
                    Node {
                        flex_direction: FlexDirection::Column,
                        align_items: AlignItems::Center,
                        row_gap: Val::Px(8.0),
                        ..default()
                    },
                    Pickable::IGNORE,
                ))
                .with_children(|center| {
                    spawn_stat(center, "PLAY THIS CHORD", HudText::Target, 56.0);
                    center.spawn((label("", 32.0, Color::WHITE), HudText::Feedback));
                    center.spawn((label("", 18.0, Color::WHITE), HudText::Pressed));
                });
                spawn_stat(top, "TIME", HudText::Time, 36.0);
            });

            root.spawn((
                Node {
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                Pickable::IGNORE,
            ))
            .with_children(|buttons| {
                ButtonBuilder::new("Start (S)").spawn(buttons, GameAction::Start);
                ButtonBuilder::new("Check (Enter)").spawn(buttons, GameAction::Check);
                ButtonBuilder::new("Clear (Backspace)").spawn(buttons, GameAction::ClearPresses);
                ButtonBuilder::new("Reset (Esc)").spawn(buttons, GameAction::Reset);
                ButtonBuilder::new("Free play (Tab)").spawn(buttons, GameAction::FreePlay);
            });
        });
}

/// Leaving the game stops every round timer and puts the pick down.
fn leave_chord_game(
    mut commands: Commands,
    huds: Query<Entity, With<GameHud>>,
    mut game: ResMut<ChordGame>,
    mut strummer: ResMut<Strummer>,
    mut can_play: ResMut<CanPlay>,
) {
    for hud in &huds {
        commands.entity(hud).despawn();
    }
    strummer.cancel();
    game.reset();
    can_play.0 = false;
}

fn game_keys(
    keys: Res<ButtonInput<KeyCode>>,
    mut game: ResMut<ChordGame>,
    mut rng: ResMut<GameRng>,
    mut strummer: ResMut<Strummer>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let bindings = [
        (KeyCode::KeyS, GameAction::Start),
        (KeyCode::Enter, GameAction::Check),
        (KeyCode::Escape, GameAction::Reset),
        (KeyCode::Backspace, GameAction::ClearPresses),
    ];
    for (key, action) in bindings {
        if keys.just_pressed(key) {
            apply_action(action, &mut game, &mut rng, &mut strummer, &mut next_state);
        }
    }
}

fn on_game_click(
    click: On<Pointer<Click>>,
    actions: Query<&GameAction>,
    state: Res<State<AppState>>,
    mut game: ResMut<ChordGame>,
    mut rng: ResMut<GameRng>,
    mut strummer: ResMut<Strummer>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if *state.get() != AppState::ChordGame {
        return;
    }
    if let Ok(action) = actions.get(click.entity) {
        apply_action(*action, &mut game, &mut rng, &mut strummer, &mut next_state);
    }
}

fn update_game_hud(game: Res<ChordGame>, mut texts: Query<(&HudText, &mut Text, &mut TextColor)>) {
    if !game.is_changed() {
        return;
    }
    let feedback = feedback_text(&game);
    for (kind, mut text, mut color) in &mut texts {
        match kind {
            HudText::Score => text.0 = game.score().to_string(),
            HudText::Target => {
                text.0 = game
                    .target()
                    .map_or_else(|| "---".to_string(), |target| target.name.clone());
                color.0 = Color::srgb(0.98, 0.8, 0.08);
            }
            HudText::Time => {
                text.0 = format!("{}s", game.time_left());
                color.0 = time_color(game.time_left());
            }
            HudText::Feedback => match &feedback {
                Some((message, tint)) => {
                    text.0 = message.clone();
                    color.0 = *tint;
                }
                None => text.0.clear(),
            },
            HudText::Pressed => text.0 = pressed_text(&game),
        }
    }
}
