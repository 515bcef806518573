use bevy::prelude::*;
use std::mem;

use crate::file::chords::ChordLibrary;
use crate::guitar::types::{Chord, TensionType};

/// Emitted whenever the chord shown on the fretboard changes.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct ChordChanged {
    pub previous: Option<Chord>,
    pub next: Option<Chord>,
}

/// The chord picked in explore mode. Toggled tensions are remembered in
/// toggle order and only the most recent one is applied.
#[derive(Resource, Debug, Default)]
pub struct ChordSelection {
    base: Option<String>,
    tensions: Vec<TensionType>,
    active: Option<Chord>,
}

impl ChordSelection {
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn active(&self) -> Option<&Chord> {
        self.active.as_ref()
    }

    pub fn tensions(&self) -> &[TensionType] {
        &self.tensions
    }

    pub fn is_tension_selected(&self, tension: TensionType) -> bool {
        self.tensions.contains(&tension)
    }

    pub fn applied_tension(&self) -> Option<TensionType> {
        self.tensions.last().copied()
    }

    pub fn display_name(&self) -> Option<String> {
        let base = self.base.as_ref()?;
        Some(match self.applied_tension() {
            Some(tension) => format!("{base}{}", tension.label()),
            None => base.clone(),
        })
    }

    pub fn select(&mut self, name: &str, library: &ChordLibrary) -> Option<ChordChanged> {
        let chord = library.chord(name)?.clone();
        self.base = Some(name.to_string());
        self.tensions.clear();
        Some(self.show(Some(chord)))
    }

    pub fn clear(&mut self) -> Option<ChordChanged> {
        if self.base.is_none() && self.active.is_none() {
            return None;
        }
        self.base = None;
        self.tensions.clear();
        Some(self.show(None))
    }

    /// Does nothing without a base chord. A tension the base chord has no
    /// fingering for is still recorded but leaves the fretboard unchanged.
    pub fn toggle_tension(
        &mut self,
        tension: TensionType,
        library: &ChordLibrary,
    ) -> Option<ChordChanged> {
        let base = self.base.clone()?;
        if let Some(index) = self.tensions.iter().position(|t| *t == tension) {
            self.tensions.remove(index);
        } else {
            self.tensions.push(tension);
        }

        let next = match self.applied_tension() {
            None => library.chord(&base),
            Some(applied) => library.tension(&base, applied),
        }?;
        Some(self.show(Some(next.clone())))
    }

    /// Clears the fretboard without forgetting which chord was picked, used
    /// while another mode owns the screen.
    pub fn hide(&mut self) -> Option<ChordChanged> {
        self.active.as_ref()?;
        Some(ChordChanged {
            previous: self.active.take(),
            next: None,
        })
    }

    /// Shows the picked chord again after [`ChordSelection::hide`].
    pub fn restore(&mut self, library: &ChordLibrary) -> Option<ChordChanged> {
        if self.active.is_some() {
            return None;
        }
        let base = self.base.clone()?;
        let next = self
            .applied_tension()
            .and_then(|tension| library.tension(&base, tension))
            .or_else(|| library.chord(&base))?;
        Some(self.show(Some(next.clone())))
    }

    fn show(&mut self, next: Option<Chord>) -> ChordChanged {
        let previous = mem::replace(&mut self.active, next.clone());
        ChordChanged { previous, next }
    }
}
