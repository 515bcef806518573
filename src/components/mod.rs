pub mod chord_markers;

pub use chord_markers::{ChordMarkersPlugin, ShownChord};
