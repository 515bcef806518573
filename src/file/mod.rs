pub mod chords;
pub mod config;
pub mod settings;

pub use chords::{ChordLibrary, ChordLibraryLoader};
pub use config::AppConfig;
pub use settings::Settings;
