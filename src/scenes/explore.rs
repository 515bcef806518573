use bevy::prelude::*;

use crate::file::chords::ChordLibrary;
use crate::guitar::interaction::CanPlay;
use crate::guitar::selection::{ChordChanged, ChordSelection};
use crate::guitar::types::{Chord, Finger, Note, TensionType};
use crate::states::AppState;
use crate::widgets::{label, set_active, Active, ButtonBuilder, ButtonStyle};

const PANEL_COLOR: Color = Color::srgba(0.0, 0.0, 0.0, 0.6);
const CHORD_NAME_SIZE: f32 = 36.0;

pub struct ExplorePlugin;

impl Plugin for ExplorePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Explore), (spawn_explore_ui, restore_selection))
            .add_systems(OnExit(AppState::Explore), (despawn_explore_ui, hide_selection))
            .add_systems(
                Update,
                (
                    sync_explore_buttons,
                    rebuild_tension_row,
                    update_chord_name,
                    update_finger_legend,
                )
                    .run_if(in_state(AppState::Explore)),
            )
            .add_observer(on_explore_click);
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub enum ExploreAction {
    SelectChord(String),
    ClearChord,
    ToggleTension(TensionType),
    TogglePick,
    StartChordGame,
}

#[derive(Component)]
struct ExploreUi;

#[derive(Component)]
struct TensionRow;

#[derive(Component)]
struct ChordNameText;

#[derive(Component)]
struct FingerLegend;

/// Fretted, fingered notes of the chord in string order, as shown in the legend.
pub fn legend_entries(chord: &Chord) -> Vec<(Note, Finger)> {
    chord
        .notes
        .iter()
        .filter(|(_, position)| !position.is_open())
        .filter_map(|(note, position)| position.finger.map(|finger| (*note, finger)))
        .collect()
}

fn pick_label(holding: bool) -> &'static str {
    if holding {
        "Holding pick"
    } else {
        "No pick"
    }
}

fn spawn_explore_ui(
    mut commands: Commands,
    library: Option<Res<ChordLibrary>>,
    selection: Res<ChordSelection>,
    can_play: Res<CanPlay>,
) {
    let majors = library.as_ref().map(|lib| lib.majors.clone()).unwrap_or_default();
    let minors = library.as_ref().map(|lib| lib.minors.clone()).unwrap_or_default();
    let picked = selection.base().map(str::to_string);

    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                justify_content: JustifyContent::SpaceBetween,
                padding: UiRect::all(Val::Px(16.0)),
                ..default()
            },
            Pickable::IGNORE,
            ExploreUi,
        ))
        .with_children(|root| {
            root.spawn((
                Node {
                    flex_direction: FlexDirection::Column,
                    padding: UiRect::all(Val::Px(12.0)),
                    row_gap: Val::Px(6.0),
                    ..default()
                },
                BackgroundColor(PANEL_COLOR),
                BorderRadius::all(Val::Px(8.0)),
            ))
            .with_children(|panel| {
                panel.spawn(label("Chords", 18.0, Color::WHITE));
                for names in [&majors, &minors] {
                    panel
                        .spawn(Node {
                            flex_direction: FlexDirection::Row,
                            flex_wrap: FlexWrap::Wrap,
                            ..default()
                        })
                        .with_children(|row| {
                            for name in names {
                                ButtonBuilder::new(name.clone())
                                    .active(picked.as_deref() == Some(name.as_str()))
                                    .spawn(row, ExploreAction::SelectChord(name.clone()));
                            }
                        });
                }
                ButtonBuilder::new("Clear").spawn(panel, ExploreAction::ClearChord);

                panel.spawn(label("Tension:", 14.0, Color::WHITE));
                panel.spawn((
                    Node {
                        flex_direction: FlexDirection::Row,
                        ..default()
                    },
                    TensionRow,
                ));
                panel.spawn((label("", CHORD_NAME_SIZE, Color::WHITE), ChordNameText));
            });

            root.spawn((
                Node {
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::End,
                    justify_content: JustifyContent::SpaceBetween,
                    ..default()
                },
                Pickable::IGNORE,
            ))
            .with_children(|side| {
                side.spawn((
                    Node {
                        flex_direction: FlexDirection::Column,
                        align_items: AlignItems::End,
                        ..default()
                    },
                    Pickable::IGNORE,
                ))
                .with_children(|buttons| {
                    let pick_style = ButtonStyle {
                        active_color: Color::srgb(0.95, 0.55, 0.1),
                        ..default()
                    };
                    ButtonBuilder::new(pick_label(can_play.0))
                        .style(pick_style)
                        .active(can_play.0)
                        .spawn(buttons, ExploreAction::TogglePick);
                    ButtonBuilder::new("Chord game (Tab)").spawn(buttons, ExploreAction::StartChordGame);
                });
                side.spawn((
                    Node {
                        flex_direction: FlexDirection::Column,
                        padding: UiRect::all(Val::Px(12.0)),
                        ..default()
                    },
                    BackgroundColor(PANEL_COLOR),
                    BorderRadius::all(Val::Px(8.0)),
                    Visibility::Hidden,
                    FingerLegend,
                ));
            });
        });
}

fn despawn_explore_ui(mut commands: Commands, roots: Query<Entity, With<ExploreUi>>) {
    for root in &roots {
        commands.entity(root).despawn();
    }
}

fn restore_selection(
    library: Option<Res<ChordLibrary>>,
    mut selection: ResMut<ChordSelection>,
    mut changes: MessageWriter<ChordChanged>,
) {
    let Some(library) = library else {
        return;
    };
    if let Some(change) = selection.restore(&library) {
        changes.write(change);
    }
}

fn hide_selection(mut selection: ResMut<ChordSelection>, mut changes: MessageWriter<ChordChanged>) {
    if let Some(change) = selection.hide() {
        changes.write(change);
    }
}

#[allow(clippy::too_many_arguments)]
fn on_explore_click(
    click: On<Pointer<Click>>,
    actions: Query<&ExploreAction>,
    state: Res<State<AppState>>,
    library: Option<Res<ChordLibrary>>,
    mut selection: ResMut<ChordSelection>,
    mut can_play: ResMut<CanPlay>,
    mut changes: MessageWriter<ChordChanged>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if *state.get() != AppState::Explore {
        return;
    }
    let Ok(action) = actions.get(click.entity) else {
        return;
    };
    let Some(library) = library else {
        return;
    };

    let change = match action {
        ExploreAction::SelectChord(name) => selection.select(name, &library),
        ExploreAction::ClearChord => selection.clear(),
        ExploreAction::ToggleTension(tension) => selection.toggle_tension(*tension, &library),
        ExploreAction::TogglePick => {
            can_play.0 = !can_play.0;
            None
        }
        ExploreAction::StartChordGame => {
            next_state.set(AppState::ChordGame);
            None
        }
    };
    if let Some(change) = change {
        changes.write(change);
    }
}

fn sync_explore_buttons(
    mut commands: Commands,
    selection: Res<ChordSelection>,
    can_play: Res<CanPlay>,
    buttons: Query<(Entity, &ExploreAction, Has<Active>, &Children)>,
    mut texts: Query<&mut Text>,
) {
    if !selection.is_changed() && !can_play.is_changed() {
        return;
    }
    for (entity, action, is_active, children) in &buttons {
        let active = match action {
            ExploreAction::SelectChord(name) => selection.base() == Some(name.as_str()),
            ExploreAction::ToggleTension(tension) => selection.is_tension_selected(*tension),
            ExploreAction::TogglePick => {
                for child in children.iter() {
                    if let Ok(mut text) = texts.get_mut(child) {
                        text.0 = pick_label(can_play.0).to_string();
                    }
                }
                can_play.0
            }
            ExploreAction::ClearChord | ExploreAction::StartChordGame => false,
        };
        set_active(&mut commands, entity, is_active, active);
    }
}

/// Tension buttons only exist for the variants the picked chord has.
fn rebuild_tension_row(
    mut commands: Commands,
    library: Option<Res<ChordLibrary>>,
    selection: Res<ChordSelection>,
    rows: Query<Entity, With<TensionRow>>,
    mut shown_for: Local<Option<String>>,
    added: Query<(), Added<TensionRow>>,
) {
    let Some(library) = library else {
        return;
    };
    let base = selection.base().map(str::to_string);
    if base == *shown_for && added.is_empty() {
        return;
    }
    *shown_for = base.clone();

    for row in &rows {
        commands.entity(row).despawn_related::<Children>();
        let Some(base) = base.as_deref() else {
            continue;
        };
        commands.entity(row).with_children(|row| {
            for tension in TensionType::ALL {
                if library.has_tension(base, tension) {
                    ButtonBuilder::new(tension.label())
                        .active(selection.is_tension_selected(tension))
                        .spawn(row, ExploreAction::ToggleTension(tension));
                }
            }
        });
    }
}

fn update_chord_name(selection: Res<ChordSelection>, mut texts: Query<&mut Text, With<ChordNameText>>) {
    if !selection.is_changed() {
        return;
    }
    for mut text in &mut texts {
        text.0 = selection.display_name().unwrap_or_default();
    }
}

fn update_finger_legend(
    mut commands: Commands,
    selection: Res<ChordSelection>,
    mut legends: Query<(Entity, &mut Visibility), With<FingerLegend>>,
    added: Query<(), Added<FingerLegend>>,
) {
    if !selection.is_changed() && added.is_empty() {
        return;
    }
    for (legend, mut visibility) in &mut legends {
        commands.entity(legend).despawn_related::<Children>();
        let entries = selection.active().map(legend_entries).unwrap_or_default();
        *visibility = if entries.is_empty() {
            Visibility::Hidden
        } else {
            Visibility::Inherited
        };
        commands.entity(legend).with_children(|legend| {
            for (note, finger) in entries {
                legend
                    .spawn(Node {
                        flex_direction: FlexDirection::Row,
                        align_items: AlignItems::Center,
                        column_gap: Val::Px(8.0),
                        ..default()
                    })
                    .with_children(|line| {
                        line.spawn((
                            Node {
                                width: Val::Px(12.0),
                                height: Val::Px(12.0),
                                ..default()
                            },
                            BackgroundColor(finger.color()),
                            BorderRadius::MAX,
                        ));
                        line.spawn(label(format!("{}: {}", note.label(), finger.name()), 16.0, Color::WHITE));
                    });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = include_str!("../../assets/chords/library.chords");

    #[test]
    fn legend_lists_fingered_notes_low_to_high() {
        let library = ChordLibrary::from_yaml_str(LIBRARY).unwrap();
        let c = library.chord("C").unwrap();
        assert_eq!(
            legend_entries(c),
            vec![
                (Note::A, Finger::Ring),
                (Note::D, Finger::Middle),
                (Note::B, Finger::Index),
            ]
        );
    }

    #[test]
    fn open_chords_have_an_empty_legend() {
        assert!(legend_entries(&Chord::default()).is_empty());
    }
}
