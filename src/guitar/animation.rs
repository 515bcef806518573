use bevy::prelude::*;
use std::mem;

use crate::guitar::shape::{ChordShape, MarkerLayout, MarkerPlacement};

pub const EXIT_SECS: f32 = 0.100;
pub const DOT_ENTER_SECS: f32 = 0.120;
pub const BAR_ENTER_SECS: f32 = 0.150;
pub const FINGER_STAGGER_SECS: f32 = 0.040;
pub const BAR_LEAD_SECS: f32 = 0.060;
pub const BAR_SLIDE: f32 = 0.01;

const DOT_REST_SCALE: f32 = 0.9;
const DOT_PEAK_SCALE: f32 = 1.05;
const DOT_PEAK_AT: f32 = 0.7;
const BAR_REST_WIDTH: f32 = 0.8;

pub fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(3)
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Identifies one transition. Every new transition takes a fresh token and
/// animation steps holding an older one are dropped without touching markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AnimationToken(u64);

impl AnimationToken {
    fn next(self) -> Self {
        AnimationToken(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerVisual {
    pub opacity: f32,
    pub scale: Vec3,
    /// Extra offset along the guitar's X axis, used by the bar slide.
    pub slide: f32,
}

impl MarkerVisual {
    pub const SHOWN: MarkerVisual = MarkerVisual {
        opacity: 1.0,
        scale: Vec3::ONE,
        slide: 0.0,
    };

    fn before_enter(placement: &MarkerPlacement) -> Self {
        if placement.is_bar() {
            MarkerVisual {
                opacity: 0.0,
                scale: Vec3::new(BAR_REST_WIDTH, 1.0, 1.0),
                slide: -BAR_SLIDE,
            }
        } else {
            MarkerVisual {
                opacity: 0.0,
                scale: Vec3::splat(DOT_REST_SCALE),
                slide: 0.0,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub token: AnimationToken,
    pub placement: MarkerPlacement,
    pub visual: MarkerVisual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    NormalToNormal,
    NormalToBarre,
    BarreToNormal,
    BarreToBarre,
}

impl TransitionKind {
    pub fn classify(prev_has_barre: bool, next_has_barre: bool) -> Self {
        match (prev_has_barre, next_has_barre) {
            (false, false) => TransitionKind::NormalToNormal,
            (false, true) => TransitionKind::NormalToBarre,
            (true, false) => TransitionKind::BarreToNormal,
            (true, true) => TransitionKind::BarreToBarre,
        }
    }

    fn enters_barre(self) -> bool {
        matches!(
            self,
            TransitionKind::NormalToBarre | TransitionKind::BarreToBarre
        )
    }

    /// The bar lands first; dots follow in finger order, after a short lead
    /// when a bar is coming in.
    fn enter_delay(self, placement: &MarkerPlacement) -> f32 {
        if placement.is_bar() {
            return 0.0;
        }
        let step = placement.finger().map_or(1, |finger| finger.number()) as f32 * FINGER_STAGGER_SECS;
        if self.enters_barre() {
            BAR_LEAD_SECS + step
        } else {
            step
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    DotExit,
    DotEnter,
    BarExit,
    BarEnter,
}

impl Motion {
    fn exit_for(placement: &MarkerPlacement) -> Self {
        if placement.is_bar() {
            Motion::BarExit
        } else {
            Motion::DotExit
        }
    }

    fn enter_for(placement: &MarkerPlacement) -> Self {
        if placement.is_bar() {
            Motion::BarEnter
        } else {
            Motion::DotEnter
        }
    }

    fn duration(self) -> f32 {
        match self {
            Motion::DotExit | Motion::BarExit => EXIT_SECS,
            Motion::DotEnter => DOT_ENTER_SECS,
            Motion::BarEnter => BAR_ENTER_SECS,
        }
    }

    fn settled(self, from: MarkerVisual) -> MarkerVisual {
        match self {
            Motion::DotExit => MarkerVisual {
                opacity: 0.0,
                scale: Vec3::splat(DOT_REST_SCALE),
                slide: from.slide,
            },
            Motion::BarExit => MarkerVisual {
                opacity: 0.0,
                scale: Vec3::new(BAR_REST_WIDTH, from.scale.y, from.scale.z),
                slide: from.slide + BAR_SLIDE,
            },
            Motion::DotEnter | Motion::BarEnter => MarkerVisual::SHOWN,
        }
    }

    fn sample(self, from: MarkerVisual, progress: f32) -> MarkerVisual {
        if progress >= 1.0 {
            return self.settled(from);
        }
        let progress = progress.max(0.0);
        let eased = ease_out_cubic(progress);
        match self {
            Motion::DotExit => MarkerVisual {
                opacity: lerp(from.opacity, 0.0, eased),
                scale: from.scale.lerp(Vec3::splat(DOT_REST_SCALE), eased),
                slide: from.slide,
            },
            Motion::DotEnter => {
                let scale = if progress < DOT_PEAK_AT {
                    let rise = ease_out_cubic(progress / DOT_PEAK_AT);
                    lerp(from.scale.x, DOT_PEAK_SCALE, rise)
                } else {
                    let settle = (progress - DOT_PEAK_AT) / (1.0 - DOT_PEAK_AT);
                    lerp(DOT_PEAK_SCALE, 1.0, settle)
                };
                MarkerVisual {
                    opacity: lerp(from.opacity, 1.0, eased),
                    scale: Vec3::splat(scale),
                    slide: from.slide,
                }
            }
            Motion::BarExit => MarkerVisual {
                opacity: lerp(from.opacity, 0.0, eased),
                scale: Vec3::new(lerp(from.scale.x, BAR_REST_WIDTH, eased), from.scale.y, from.scale.z),
                slide: from.slide + BAR_SLIDE * eased,
            },
            Motion::BarEnter => MarkerVisual {
                opacity: lerp(from.opacity, 1.0, eased),
                scale: Vec3::new(lerp(from.scale.x, 1.0, eased), from.scale.y, from.scale.z),
                slide: from.slide * (1.0 - eased),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Tween {
    token: AnimationToken,
    marker: MarkerId,
    motion: Motion,
    delay: f32,
    elapsed: f32,
    from: Option<MarkerVisual>,
}

impl Tween {
    fn is_done(&self) -> bool {
        self.elapsed >= self.delay + self.motion.duration()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnimationPhase {
    #[default]
    Idle,
    Exiting {
        kind: TransitionKind,
        pending: MarkerLayout,
    },
    Entering {
        kind: TransitionKind,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseChange {
    /// Every old marker finished its exit and was replaced by the new layout.
    EnterStarted {
        kind: TransitionKind,
        retired: Vec<Marker>,
    },
    Settled {
        kind: TransitionKind,
    },
}

/// Chord marker choreography as an explicit state machine advanced by
/// [`ChordAnimator::tick`].
#[derive(Resource, Debug, Default)]
pub struct ChordAnimator {
    token: AnimationToken,
    next_id: u64,
    markers: Vec<Marker>,
    tweens: Vec<Tween>,
    phase: AnimationPhase,
}

impl ChordAnimator {
    pub fn token(&self) -> AnimationToken {
        self.token
    }

    pub fn is_current(&self, token: AnimationToken) -> bool {
        self.token == token
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn phase(&self) -> &AnimationPhase {
        &self.phase
    }

    pub fn is_animating(&self) -> bool {
        !matches!(self.phase, AnimationPhase::Idle)
    }

    /// Replaces whatever is on screen with `layout` at full opacity.
    pub fn show(&mut self, layout: MarkerLayout) -> AnimationToken {
        self.token = self.token.next();
        self.tweens.clear();
        self.phase = AnimationPhase::Idle;
        self.markers = self.spawn_markers(layout, |_| MarkerVisual::SHOWN);
        self.token
    }

    /// Starts the transition from the chord currently shown to `layout`.
    /// Without a previous chord, or with nothing on screen, the new markers
    /// appear immediately.
    pub fn transition(
        &mut self,
        previous: Option<&ChordShape>,
        next: Option<&ChordShape>,
        layout: MarkerLayout,
    ) -> AnimationToken {
        let Some(previous) = previous else {
            return self.show(layout);
        };
        if self.markers.is_empty() {
            return self.show(layout);
        }

        self.token = self.token.next();
        let kind = TransitionKind::classify(
            previous.has_barre,
            next.is_some_and(|shape| shape.has_barre),
        );
        debug!("Chord transition {:?} (token {:?})", kind, self.token);

        let token = self.token;
        self.tweens = self
            .markers
            .iter()
            .map(|marker| Tween {
                token,
                marker: marker.id,
                motion: Motion::exit_for(&marker.placement),
                delay: 0.0,
                elapsed: 0.0,
                from: None,
            })
            .collect();
        self.phase = AnimationPhase::Exiting {
            kind,
            pending: layout,
        };
        self.token
    }

    pub fn tick(&mut self, delta_seconds: f32) -> Option<PhaseChange> {
        let token = self.token;
        self.tweens.retain(|tween| tween.token == token);

        for tween in &mut self.tweens {
            tween.elapsed += delta_seconds;
            if tween.elapsed < tween.delay {
                continue;
            }
            let Some(marker) = self.markers.iter_mut().find(|marker| marker.id == tween.marker) else {
                continue;
            };
            let from = *tween.from.get_or_insert(marker.visual);
            let progress = (tween.elapsed - tween.delay) / tween.motion.duration();
            marker.visual = tween.motion.sample(from, progress);
        }

        if !self.tweens.iter().all(Tween::is_done) {
            return None;
        }

        match mem::take(&mut self.phase) {
            AnimationPhase::Idle => {
                self.tweens.clear();
                None
            }
            AnimationPhase::Exiting { kind, pending } => {
                let retired = mem::take(&mut self.markers);
                self.markers = self.spawn_markers(pending, MarkerVisual::before_enter);
                self.tweens = self
                    .markers
                    .iter()
                    .map(|marker| Tween {
                        token,
                        marker: marker.id,
                        motion: Motion::enter_for(&marker.placement),
                        delay: kind.enter_delay(&marker.placement),
                        elapsed: 0.0,
                        from: None,
                    })
                    .collect();
                self.phase = if self.tweens.is_empty() {
                    AnimationPhase::Idle
                } else {
                    AnimationPhase::Entering { kind }
                };
                Some(PhaseChange::EnterStarted { kind, retired })
            }
            AnimationPhase::Entering { kind } => {
                self.tweens.clear();
                Some(PhaseChange::Settled { kind })
            }
        }
    }

    fn spawn_markers(
        &mut self,
        layout: MarkerLayout,
        visual: impl Fn(&MarkerPlacement) -> MarkerVisual,
    ) -> Vec<Marker> {
        layout
            .markers
            .into_iter()
            .map(|placement| {
                self.next_id += 1;
                Marker {
                    id: MarkerId(self.next_id),
                    token: self.token,
                    visual: visual(&placement),
                    placement,
                }
            })
            .collect()
    }
}
