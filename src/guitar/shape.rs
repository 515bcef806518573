use bevy::prelude::*;

use crate::guitar::types::{Barre, Chord, Finger, Note};

const BAR_DROP: f32 = 0.003;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerPosition {
    pub string: Note,
    pub fret: u8,
    pub finger: Finger,
}

/// Structured view of a chord: the fingered, fretted notes plus the declared
/// barre, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordShape {
    pub has_barre: bool,
    pub fingers: Vec<FingerPosition>,
    pub barre: Option<Barre>,
}

/// The barre is read from the chord's annotation only. Two notes sharing a
/// finger and fret are not treated as a barre unless the chord says so.
pub fn resolve_shape(chord: Option<&Chord>) -> Option<ChordShape> {
    let chord = chord?;
    let fingers = chord
        .notes
        .iter()
        .filter(|(_, position)| !position.is_open())
        .filter_map(|(note, position)| {
            position.finger.map(|finger| FingerPosition {
                string: *note,
                fret: position.fret,
                finger,
            })
        })
        .collect();

    Some(ChordShape {
        has_barre: chord.barre.is_some(),
        fingers,
        barre: chord.barre,
    })
}

/// Positions, in the guitar's local space, of the nodes markers are placed on.
pub trait FretboardGeometry {
    fn string_anchor(&self, note: Note) -> Option<Vec3>;
    fn fret_anchor(&self, fret: u8) -> Option<Vec3>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerPlacement {
    Dot {
        string: Note,
        fret: u8,
        finger: Option<Finger>,
        position: Vec3,
    },
    Bar {
        barre: Barre,
        center: Vec3,
        length: f32,
    },
}

impl MarkerPlacement {
    pub fn is_bar(&self) -> bool {
        matches!(self, MarkerPlacement::Bar { .. })
    }

    pub fn finger(&self) -> Option<Finger> {
        match self {
            MarkerPlacement::Dot { finger, .. } => *finger,
            MarkerPlacement::Bar { barre, .. } => Some(barre.finger),
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            MarkerPlacement::Dot { position, .. } => *position,
            MarkerPlacement::Bar { center, .. } => *center,
        }
    }
}

/// Everything that should be drawn for one chord. The bar, when present,
/// comes first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerLayout {
    pub markers: Vec<MarkerPlacement>,
}

impl MarkerLayout {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn dots(&self) -> impl Iterator<Item = &MarkerPlacement> {
        self.markers.iter().filter(|marker| !marker.is_bar())
    }

    pub fn bars(&self) -> impl Iterator<Item = &MarkerPlacement> {
        self.markers.iter().filter(|marker| marker.is_bar())
    }
}

fn string_point(geometry: &impl FretboardGeometry, note: Note) -> Option<Vec3> {
    geometry
        .string_anchor(note)
        .map(|anchor| anchor + Vec3::new(note.lateral_offset(), note.vertical_offset(), 0.0))
}

/// Places finger dots and the barre bar for a chord. Notes whose anchors do
/// not resolve are skipped. Notes under the barre only become dots when the
/// bar itself could not be placed.
pub fn layout_markers(chord: Option<&Chord>, geometry: &impl FretboardGeometry) -> MarkerLayout {
    let Some(chord) = chord else {
        return MarkerLayout::default();
    };

    let mut markers = Vec::new();
    let mut bar_drawn = None;

    if let Some(barre) = chord.barre {
        let from = string_point(geometry, barre.from_string);
        let to = string_point(geometry, barre.to_string);
        let fret = geometry.fret_anchor(barre.fret);
        match (from, to, fret) {
            (Some(from), Some(to), Some(fret)) => {
                let min_x = from.x.min(to.x);
                let max_x = from.x.max(to.x);
                markers.push(MarkerPlacement::Bar {
                    barre,
                    center: Vec3::new(
                        (min_x + max_x) / 2.0,
                        (from.y + to.y) / 2.0 - BAR_DROP,
                        fret.z,
                    ),
                    length: max_x - min_x,
                });
                bar_drawn = Some(barre);
            }
            _ => warn!(
                "Cannot place barre {}-{} at fret {}",
                barre.from_string, barre.to_string, barre.fret
            ),
        }
    }

    for (note, position) in &chord.notes {
        if position.is_open() {
            continue;
        }
        let under_bar = bar_drawn.is_some_and(|barre| {
            position.finger == Some(barre.finger) && position.fret == barre.fret && barre.covers(*note)
        });
        if under_bar {
            continue;
        }

        let (Some(string), Some(fret)) = (string_point(geometry, *note), geometry.fret_anchor(position.fret))
        else {
            continue;
        };
        markers.push(MarkerPlacement::Dot {
            string: *note,
            fret: position.fret,
            finger: position.finger,
            position: Vec3::new(string.x, string.y, fret.z),
        });
    }

    MarkerLayout { markers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guitar::types::FretPosition;
    use std::collections::HashMap;

    struct EvenFretboard {
        missing_frets: Vec<u8>,
        missing_strings: Vec<Note>,
    }

    impl FretboardGeometry for EvenFretboard {
        fn string_anchor(&self, note: Note) -> Option<Vec3> {
            if self.missing_strings.contains(&note) {
                return None;
            }
            Some(Vec3::new(note.string_number() as f32 * 0.1, 0.0, 0.0))
        }

        fn fret_anchor(&self, fret: u8) -> Option<Vec3> {
            if self.missing_frets.contains(&fret) {
                return None;
            }
            Some(Vec3::new(0.0, 0.0, fret as f32))
        }
    }

    fn geometry() -> EvenFretboard {
        EvenFretboard {
            missing_frets: Vec::new(),
            missing_strings: Vec::new(),
        }
    }

    fn chord(notes: &[(Note, u8, Option<u8>)], barre: Option<Barre>) -> Chord {
        Chord {
            notes: notes
                .iter()
                .map(|(note, fret, finger)| {
                    (
                        *note,
                        FretPosition {
                            fret: *fret,
                            finger: finger.map(|f| Finger::try_from(f).unwrap()),
                        },
                    )
                })
                .collect(),
            barre,
        }
    }

    fn c_major() -> Chord {
        chord(
            &[
                (Note::LowE, 0, None),
                (Note::A, 3, Some(3)),
                (Note::D, 2, Some(2)),
                (Note::G, 0, None),
                (Note::B, 1, Some(1)),
                (Note::HighE, 0, None),
            ],
            None,
        )
    }

    fn f_major() -> Chord {
        chord(
            &[
                (Note::LowE, 1, Some(1)),
                (Note::A, 3, Some(3)),
                (Note::D, 3, Some(4)),
                (Note::G, 2, Some(2)),
                (Note::B, 1, Some(1)),
                (Note::HighE, 1, Some(1)),
            ],
            Some(Barre {
                fret: 1,
                finger: Finger::Index,
                from_string: Note::LowE,
                to_string: Note::HighE,
            }),
        )
    }

    #[test]
    fn resolving_nothing_yields_nothing() {
        assert_eq!(resolve_shape(None), None);
    }

    #[test]
    fn resolves_fretted_fingers_only() {
        let shape = resolve_shape(Some(&c_major())).unwrap();
        assert!(!shape.has_barre);
        let strings: Vec<Note> = shape.fingers.iter().map(|f| f.string).collect();
        assert_eq!(strings, vec![Note::A, Note::D, Note::B]);
        assert_eq!(resolve_shape(Some(&c_major())), Some(shape));
    }

    #[test]
    fn barre_is_never_inferred() {
        // Two index-finger notes on fret 1 without an annotation stay two dots.
        let chord = chord(
            &[(Note::G, 1, Some(1)), (Note::B, 1, Some(1)), (Note::D, 2, Some(2))],
            None,
        );
        let shape = resolve_shape(Some(&chord)).unwrap();
        assert!(!shape.has_barre);
        assert_eq!(shape.barre, None);

        let layout = layout_markers(Some(&chord), &geometry());
        assert_eq!(layout.bars().count(), 0);
        assert_eq!(layout.dots().count(), 3);
    }

    #[test]
    fn barre_notes_render_only_as_the_bar() {
        let layout = layout_markers(Some(&f_major()), &geometry());
        assert_eq!(layout.bars().count(), 1);
        assert!(layout.markers[0].is_bar());

        let dot_strings: Vec<Note> = layout
            .dots()
            .map(|dot| match dot {
                MarkerPlacement::Dot { string, .. } => *string,
                MarkerPlacement::Bar { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(dot_strings, vec![Note::A, Note::D, Note::G]);
    }

    #[test]
    fn bar_spans_its_endpoint_strings() {
        let layout = layout_markers(Some(&f_major()), &geometry());
        let MarkerPlacement::Bar { center, length, .. } = layout.markers[0] else {
            panic!("expected a bar first");
        };
        let low = 0.6 + Note::LowE.lateral_offset();
        let high = 0.1 + Note::HighE.lateral_offset();
        assert!((length - (low - high)).abs() < 1e-6);
        assert!((center.x - (low + high) / 2.0).abs() < 1e-6);
        assert_eq!(center.z, 1.0);
    }

    #[test]
    fn dots_use_per_string_offsets() {
        let layout = layout_markers(Some(&c_major()), &geometry());
        let positions: HashMap<Note, Vec3> = layout
            .dots()
            .filter_map(|dot| match dot {
                MarkerPlacement::Dot {
                    string, position, ..
                } => Some((*string, *position)),
                MarkerPlacement::Bar { .. } => None,
            })
            .collect();

        let a = positions[&Note::A];
        assert!((a.x - (0.5 + Note::A.lateral_offset())).abs() < 1e-6);
        assert!((a.y - Note::A.vertical_offset()).abs() < 1e-6);
        assert_eq!(a.z, 3.0);
    }

    #[test]
    fn unresolvable_anchors_are_skipped() {
        let geometry = EvenFretboard {
            missing_frets: vec![1],
            missing_strings: Vec::new(),
        };
        let layout = layout_markers(Some(&f_major()), &geometry);
        assert_eq!(layout.bars().count(), 0);
        // Without a bar the fret-1 notes cannot be placed either.
        assert_eq!(layout.dots().count(), 3);
    }

    #[test]
    fn covered_notes_fall_back_to_dots_when_the_bar_cannot_be_placed() {
        // The low E anchor is missing, so the bar has no left end.
        let geometry = EvenFretboard {
            missing_frets: Vec::new(),
            missing_strings: vec![Note::LowE],
        };
        let layout = layout_markers(Some(&f_major()), &geometry);
        assert_eq!(layout.bars().count(), 0);

        let fret_one: Vec<Note> = layout
            .dots()
            .filter_map(|dot| match dot {
                MarkerPlacement::Dot { string, fret: 1, .. } => Some(*string),
                _ => None,
            })
            .collect();
        assert_eq!(fret_one, vec![Note::B, Note::HighE]);
        assert_eq!(layout.dots().count(), 5);
    }
}
