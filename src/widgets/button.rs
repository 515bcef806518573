use crate::widgets::UiBorder;
use bevy::prelude::*;

#[derive(Component, Clone, Copy, Debug)]
pub struct GenericButton {
    pub current_color: Color,
    pub color: Color,
    pub hover_color: Color,
    pub press_color: Color,
    pub active_color: Color,
}

/// Marks a button as switched on (the picked chord, a held tension, the pick).
#[derive(Component, Clone, Copy, Debug)]
pub struct Active;

#[derive(Clone, Debug)]
pub struct ButtonStyle {
    pub stretch: bool,
    pub color: Color,
    pub press_color: Color,
    pub hover_color: Color,
    pub active_color: Color,
    pub label_color: Color,
    pub font_size: f32,
    pub border: Option<UiBorder>,
    pub padding: UiRect,
    pub margin: UiRect,
}

impl Default for ButtonStyle {
    fn default() -> Self {
        ButtonStyle {
            stretch: false,
            color: Color::srgb(0.25, 0.25, 0.28),
            press_color: Color::srgb(0.18, 0.18, 0.2),
            hover_color: Color::srgb(0.35, 0.35, 0.38),
            active_color: Color::srgb(0.13, 0.6, 0.35),
            label_color: Color::WHITE,
            font_size: 16.0,
            border: Some(UiBorder {
                color: Color::srgb(0.45, 0.45, 0.5),
                size: UiRect::all(Val::Px(1.0)),
                radius: BorderRadius::all(Val::Px(6.0)),
            }),
            padding: UiRect::axes(Val::Px(12.0), Val::Px(6.0)),
            margin: UiRect::all(Val::Px(4.0)),
        }
    }
}

pub struct ButtonBuilder {
    label: String,
    style: ButtonStyle,
    active: bool,
}

impl ButtonBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        ButtonBuilder {
            label: label.into(),
            style: ButtonStyle::default(),
            active: false,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Spawns the button under `parent` with `extra` (usually the action the
    /// button stands for) attached.
    pub fn spawn(&self, parent: &mut ChildSpawnerCommands, extra: impl Bundle) -> Entity {
        let width = if self.style.stretch {
            Val::Percent(100.0)
        } else {
            Val::Auto
        };
        let mut node = Node {
            width,
            height: Val::Auto,
            padding: self.style.padding,
            margin: self.style.margin,
            align_items: AlignItems::Center,
            justify_content: JustifyContent::Center,
            ..default()
        };
        let color = if self.active {
            self.style.active_color
        } else {
            self.style.color
        };

        let mut button = parent.spawn((
            BackgroundColor(color),
            GenericButton {
                current_color: color,
                color: self.style.color,
                hover_color: self.style.hover_color,
                press_color: self.style.press_color,
                active_color: self.style.active_color,
            },
            extra,
        ));
        if self.active {
            button.insert(Active);
        }
        if let Some(border) = &self.style.border {
            node.border = border.size;
            button.insert((BorderColor::all(border.color), border.radius));
        }
        button.insert(node).with_children(|container| {
            container.spawn((
                Text::new(self.label.clone()),
                TextFont {
                    font_size: self.style.font_size,
                    ..default()
                },
                TextColor(self.style.label_color),
                Pickable::IGNORE,
            ));
        });

        let entity = button.id();
        GenericButton::register_observers(entity, &mut parent.commands_mut());
        entity
    }
}

impl GenericButton {
    fn register_observers(entity: Entity, commands: &mut Commands) {
        commands
            .entity(entity)
            .observe(
                |trigger: On<Pointer<Over>>, buttons: Query<&GenericButton>, mut commands: Commands| {
                    let entity = trigger.entity;
                    if let Ok(button) = buttons.get(entity) {
                        commands
                            .entity(entity)
                            .insert(BackgroundColor(button.hover_color));
                    }
                },
            )
            .observe(
                |trigger: On<Pointer<Out>>, buttons: Query<&GenericButton>, mut commands: Commands| {
                    let entity = trigger.entity;
                    if let Ok(button) = buttons.get(entity) {
                        commands
                            .entity(entity)
                            .insert(BackgroundColor(button.current_color));
                    }
                },
            )
            .observe(
                |trigger: On<Pointer<Press>>, buttons: Query<&GenericButton>, mut commands: Commands| {
                    let entity = trigger.entity;
                    if let Ok(button) = buttons.get(entity) {
                        commands
                            .entity(entity)
                            .insert(BackgroundColor(button.press_color));
                    }
                },
            )
            .observe(
                |trigger: On<Pointer<Release>>, buttons: Query<&GenericButton>, mut commands: Commands| {
                    let entity = trigger.entity;
                    if let Ok(button) = buttons.get(entity) {
                        commands
                            .entity(entity)
                            .insert(BackgroundColor(button.hover_color));
                    }
                },
            );
    }
}

/// Adds or removes [`Active`] so the button matches `active`.
pub fn set_active(commands: &mut Commands, entity: Entity, is_active: bool, active: bool) {
    if is_active == active {
        return;
    }
    if active {
        commands.entity(entity).insert(Active);
    } else {
        commands.entity(entity).remove::<Active>();
    }
}

pub fn add_active_listener(
    mut commands: Commands,
    query: Query<Entity, Added<Active>>,
    mut buttons: Query<&mut GenericButton>,
) {
    for entity in query.iter() {
        if let Ok(mut button) = buttons.get_mut(entity) {
            button.current_color = button.active_color;
            commands
                .entity(entity)
                .insert(BackgroundColor(button.current_color));
        }
    }
}

pub fn remove_active_listener(
    mut commands: Commands,
    mut removed: RemovedComponents<Active>,
    mut buttons: Query<&mut GenericButton>,
) {
    for entity in removed.read() {
        if let Ok(mut button) = buttons.get_mut(entity) {
            button.current_color = button.color;
            if let Ok(mut entity) = commands.get_entity(entity) {
                entity.insert(BackgroundColor(button.current_color));
            }
        }
    }
}
