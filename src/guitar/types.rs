use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the six strings, ordered from the lowest pitch (string 6) to the
/// highest (string 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Note {
    #[serde(rename = "E6")]
    LowE,
    A,
    D,
    G,
    B,
    #[serde(rename = "e1")]
    HighE,
}

impl Note {
    pub const ALL: [Note; 6] = [Note::LowE, Note::A, Note::D, Note::G, Note::B, Note::HighE];

    pub fn string_number(self) -> u8 {
        match self {
            Note::LowE => 6,
            Note::A => 5,
            Note::D => 4,
            Note::G => 3,
            Note::B => 2,
            Note::HighE => 1,
        }
    }

    pub fn from_string_number(string_number: u8) -> Option<Note> {
        Note::ALL
            .into_iter()
            .find(|note| note.string_number() == string_number)
    }

    pub fn label(self) -> &'static str {
        match self {
            Note::LowE => "E6",
            Note::A => "A",
            Note::D => "D",
            Note::G => "G",
            Note::B => "B",
            Note::HighE => "e1",
        }
    }

    /// MIDI note number of the open string in standard tuning.
    pub fn open_midi(self) -> u8 {
        match self {
            Note::LowE => 40,
            Note::A => 45,
            Note::D => 50,
            Note::G => 55,
            Note::B => 59,
            Note::HighE => 64,
        }
    }

    // Fitted against the guitar model; its strings are not evenly spaced.
    pub fn lateral_offset(self) -> f32 {
        match self {
            Note::LowE => 0.02,
            Note::A => 0.01,
            Note::D => 0.003,
            Note::G => -0.004,
            Note::B => -0.013,
            Note::HighE => -0.02,
        }
    }

    pub fn vertical_offset(self) -> f32 {
        match self {
            Note::LowE => -0.002,
            _ => -0.008,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Finger {
    Index = 1,
    Middle = 2,
    Ring = 3,
    Pinky = 4,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn color(self) -> Color {
        match self {
            Finger::Index => Color::srgb_u8(0xff, 0x24, 0x24),
            Finger::Middle => Color::srgb_u8(0x31, 0xad, 0xff),
            Finger::Ring => Color::srgb_u8(0x00, 0xff, 0x00),
            Finger::Pinky => Color::srgb_u8(0xff, 0xae, 0x00),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Finger::Index => "Index finger",
            Finger::Middle => "Middle finger",
            Finger::Ring => "Ring finger",
            Finger::Pinky => "Pinky",
        }
    }
}

impl TryFrom<u8> for Finger {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Finger::Index),
            2 => Ok(Finger::Middle),
            3 => Ok(Finger::Ring),
            4 => Ok(Finger::Pinky),
            other => Err(format!("finger must be 1-4, got {other}")),
        }
    }
}

impl From<Finger> for u8 {
    fn from(finger: Finger) -> Self {
        finger.number()
    }
}

/// Marker colour for a fretted note that has no finger assigned.
pub fn unfingered_color() -> Color {
    Color::srgb(1.0, 1.0, 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FretPosition {
    pub fret: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finger: Option<Finger>,
}

impl FretPosition {
    pub fn is_open(&self) -> bool {
        self.fret == 0
    }
}

/// A single finger pressing a contiguous run of strings at one fret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barre {
    pub fret: u8,
    pub finger: Finger,
    #[serde(rename = "from")]
    pub from_string: Note,
    #[serde(rename = "to")]
    pub to_string: Note,
}

impl Barre {
    pub fn covers(&self, note: Note) -> bool {
        let low = self.from_string.min(self.to_string);
        let high = self.from_string.max(self.to_string);
        low <= note && note <= high
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Chord {
    pub notes: BTreeMap<Note, FretPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barre: Option<Barre>,
}

impl Chord {
    pub fn position(&self, note: Note) -> FretPosition {
        self.notes.get(&note).copied().unwrap_or_default()
    }

    pub fn fret(&self, note: Note) -> u8 {
        self.position(note).fret
    }

    /// Strings that must be pressed, with the fret they must be pressed at.
    pub fn fretted(&self) -> impl Iterator<Item = (Note, u8)> + '_ {
        self.notes
            .iter()
            .filter(|(_, position)| !position.is_open())
            .map(|(note, position)| (*note, position.fret))
    }
}

/// The fret the active chord implies on a string, open when nothing is active.
pub fn chord_fret(chord: Option<&Chord>, note: Note) -> u8 {
    chord.map(|chord| chord.fret(note)).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TensionType {
    #[serde(rename = "7")]
    Seventh,
    #[serde(rename = "maj7")]
    MajorSeventh,
    #[serde(rename = "sus4")]
    Sus4,
    #[serde(rename = "add9")]
    Add9,
}

impl TensionType {
    pub const ALL: [TensionType; 4] = [
        TensionType::Seventh,
        TensionType::MajorSeventh,
        TensionType::Sus4,
        TensionType::Add9,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TensionType::Seventh => "7",
            TensionType::MajorSeventh => "maj7",
            TensionType::Sus4 => "sus4",
            TensionType::Add9 => "add9",
        }
    }
}

/// Identifies a string/fret interaction area. Shared by the mesh names, the
/// sample files and the debounce bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub string: u8,
    pub fret: u8,
}

impl RegionKey {
    pub fn new(string: u8, fret: u8) -> Self {
        Self { string, fret }
    }

    pub fn is_open(&self) -> bool {
        self.fret == 0
    }

    pub fn note(&self) -> Option<Note> {
        Note::from_string_number(self.string)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "String_{}_{}", self.string, self.fret)
    }
}

impl FromStr for RegionKey {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let rest = name.strip_prefix("String_").ok_or(())?;
        let (string, fret) = rest.split_once('_').ok_or(())?;
        if string.is_empty()
            || fret.is_empty()
            || !string.bytes().all(|b| b.is_ascii_digit())
            || !fret.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(());
        }
        Ok(RegionKey {
            string: string.parse().map_err(|_| ())?,
            fret: fret.parse().map_err(|_| ())?,
        })
    }
}

/// Human readable pitch of a string/fret pair, e.g. `C4`.
pub fn note_name(string_number: u8, fret: u8) -> Option<String> {
    let open = Note::from_string_number(string_number)?.open_midi() as i32;
    let midi = open + fret as i32;
    let octave = (midi - 12).div_euclid(12);
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    Some(format!("{name}{octave}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_numbers_round_trip_in_pitch_order() {
        let numbers: Vec<u8> = Note::ALL.iter().map(|n| n.string_number()).collect();
        assert_eq!(numbers, vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(Note::from_string_number(1), Some(Note::HighE));
        assert_eq!(Note::from_string_number(7), None);
    }

    #[test]
    fn note_names_follow_standard_tuning() {
        assert_eq!(note_name(6, 0).as_deref(), Some("E2"));
        assert_eq!(note_name(5, 3).as_deref(), Some("C3"));
        assert_eq!(note_name(2, 1).as_deref(), Some("C4"));
        assert_eq!(note_name(1, 0).as_deref(), Some("E4"));
        assert_eq!(note_name(1, 12).as_deref(), Some("E5"));
        assert_eq!(note_name(0, 3), None);
    }

    #[test]
    fn region_keys_parse_mesh_names() {
        let key: RegionKey = "String_6_12".parse().unwrap();
        assert_eq!(key, RegionKey::new(6, 12));
        assert_eq!(key.to_string(), "String_6_12");
        assert!("String_6".parse::<RegionKey>().is_err());
        assert!("String_a_1".parse::<RegionKey>().is_err());
        assert!("String_1_0.0".parse::<RegionKey>().is_err());
        assert!("Fret3".parse::<RegionKey>().is_err());
    }

    #[test]
    fn barre_covers_range_in_either_direction() {
        let barre = Barre {
            fret: 1,
            finger: Finger::Index,
            from_string: Note::HighE,
            to_string: Note::D,
        };
        assert!(barre.covers(Note::D));
        assert!(barre.covers(Note::G));
        assert!(barre.covers(Note::HighE));
        assert!(!barre.covers(Note::A));
    }

    #[test]
    fn finger_rejects_out_of_range_values() {
        assert_eq!(Finger::try_from(3), Ok(Finger::Ring));
        assert!(Finger::try_from(0).is_err());
        assert!(Finger::try_from(5).is_err());
    }

    #[test]
    fn missing_strings_read_as_open() {
        let chord = Chord::default();
        assert_eq!(chord.fret(Note::A), 0);
        assert_eq!(chord_fret(None, Note::A), 0);
    }
}
