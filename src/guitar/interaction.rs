use bevy::prelude::*;
use std::collections::VecDeque;
use std::time::Duration;

use crate::guitar::types::{chord_fret, Chord, Note, RegionKey};

pub const DEFAULT_STRUM_STEP: Duration = Duration::from_millis(50);

/// External switch for all string input (the pick toggle in explore mode,
/// the game status in chord game mode).
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanPlay(pub bool);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerMode {
    #[default]
    Idle,
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaySource {
    /// Dragging across open strings.
    Pluck,
    /// Clicking a fretted region.
    Click,
    Strum,
}

#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    /// Sample to play. For plucks this is the chord's fret on the string,
    /// not the open region that was touched.
    pub region: RegionKey,
    pub string: u8,
    pub fret: u8,
    pub bypass_debounce: bool,
    pub source: PlaySource,
}

impl PlayRequest {
    fn pluck(hit: RegionKey, chord: Option<&Chord>) -> Option<Self> {
        let note = hit.note()?;
        let fret = chord_fret(chord, note);
        Some(PlayRequest {
            region: RegionKey::new(hit.string, fret),
            string: hit.string,
            fret,
            bypass_debounce: false,
            source: PlaySource::Pluck,
        })
    }

    /// Strums are a synthetic gesture and are not reported as presses.
    pub fn reports_press(&self) -> bool {
        self.source != PlaySource::Strum
    }
}

/// A string the player touched, at the fret that sounded.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringPressed {
    pub string: u8,
    pub fret: u8,
}

/// Drag and hover bookkeeping for pointer input. Duplicate plucks are
/// filtered by region, not by time: crossing back into the region last
/// played does nothing until the pointer leaves every region.
#[derive(Resource, Debug, Default)]
pub struct InteractionState {
    mode: PointerMode,
    last_region: Option<RegionKey>,
}

impl InteractionState {
    pub fn mode(&self) -> PointerMode {
        self.mode
    }

    pub fn last_region(&self) -> Option<RegionKey> {
        self.last_region
    }

    pub fn pointer_down(
        &mut self,
        hit: Option<RegionKey>,
        chord: Option<&Chord>,
        can_play: bool,
    ) -> Option<PlayRequest> {
        if !can_play {
            return None;
        }
        self.mode = PointerMode::Dragging;

        let hit = hit.filter(RegionKey::is_open)?;
        let request = PlayRequest::pluck(hit, chord)?;
        self.last_region = Some(hit);
        Some(request)
    }

    pub fn pointer_move(
        &mut self,
        hit: Option<RegionKey>,
        chord: Option<&Chord>,
        can_play: bool,
    ) -> Option<PlayRequest> {
        if !can_play || self.mode != PointerMode::Dragging {
            return None;
        }
        let Some(hit) = hit else {
            self.last_region = None;
            return None;
        };
        if !hit.is_open() || self.last_region == Some(hit) {
            return None;
        }

        let request = PlayRequest::pluck(hit, chord)?;
        self.last_region = Some(hit);
        Some(request)
    }

    /// Pointer released or left the window.
    pub fn pointer_up(&mut self) {
        self.mode = PointerMode::Idle;
        self.last_region = None;
    }

    pub fn click(&self, hit: Option<RegionKey>, can_play: bool) -> Option<PlayRequest> {
        if !can_play {
            return None;
        }
        let hit = hit.filter(|hit| !hit.is_open())?;
        Some(PlayRequest {
            region: hit,
            string: hit.string,
            fret: hit.fret,
            bypass_debounce: false,
            source: PlaySource::Click,
        })
    }
}

/// Plays every string from 6 down to 1, one step apart, at the frets of the
/// chord that was active when the strum started.
#[derive(Resource, Debug)]
pub struct Strummer {
    queue: VecDeque<PlayRequest>,
    step: Timer,
    started_this_frame: bool,
}

impl Default for Strummer {
    fn default() -> Self {
        Strummer::new(DEFAULT_STRUM_STEP)
    }
}

impl Strummer {
    pub fn new(step: Duration) -> Self {
        Strummer {
            queue: VecDeque::new(),
            step: Timer::new(step, TimerMode::Repeating),
            started_this_frame: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Returns the first string's request right away. Ignored while a strum
    /// is still running.
    pub fn start(&mut self, chord: Option<&Chord>) -> Option<PlayRequest> {
        if self.is_active() {
            return None;
        }

        self.queue = Note::ALL
            .into_iter()
            .map(|note| {
                let fret = chord_fret(chord, note);
                let string = note.string_number();
                PlayRequest {
                    region: RegionKey::new(string, fret),
                    string,
                    fret,
                    bypass_debounce: true,
                    source: PlaySource::Strum,
                }
            })
            .collect();
        self.step.reset();
        self.started_this_frame = true;
        self.queue.pop_front()
    }

    /// Advances the strum by one frame. The frame that started it only
    /// played the first string, so its delta is not counted.
    pub fn tick(&mut self, delta: Duration) -> Vec<PlayRequest> {
        if std::mem::take(&mut self.started_this_frame) || !self.is_active() {
            return Vec::new();
        }
        self.step.tick(delta);
        let due = (self.step.times_finished_this_tick() as usize).min(self.queue.len());
        self.queue.drain(..due).collect()
    }

    pub fn cancel(&mut self) {
        self.queue.clear();
        self.started_this_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guitar::types::{Finger, FretPosition};

    fn g_major() -> Chord {
        let mut chord = Chord::default();
        for (note, fret, finger) in [
            (Note::LowE, 3, Some(Finger::Middle)),
            (Note::A, 2, Some(Finger::Index)),
            (Note::D, 0, None),
            (Note::G, 0, None),
            (Note::B, 0, None),
            (Note::HighE, 3, Some(Finger::Ring)),
        ] {
            chord.notes.insert(note, FretPosition { fret, finger });
        }
        chord
    }

    fn open(string: u8) -> Option<RegionKey> {
        Some(RegionKey::new(string, 0))
    }

    #[test]
    fn pointer_down_on_open_string_plays_the_chord_fret() {
        let mut state = InteractionState::default();
        let chord = g_major();
        let request = state.pointer_down(open(6), Some(&chord), true).unwrap();
        assert_eq!(request.region, RegionKey::new(6, 3));
        assert_eq!(request.fret, 3);
        assert_eq!(request.source, PlaySource::Pluck);
        assert!(!request.bypass_debounce);
        assert_eq!(state.mode(), PointerMode::Dragging);
        // The touched region is remembered, not the played one.
        assert_eq!(state.last_region(), open(6));
    }

    #[test]
    fn pointer_down_without_a_chord_plays_open() {
        let mut state = InteractionState::default();
        let request = state.pointer_down(open(3), None, true).unwrap();
        assert_eq!(request.region, RegionKey::new(3, 0));
    }

    #[test]
    fn pointer_down_on_fretted_region_only_starts_dragging() {
        let mut state = InteractionState::default();
        assert_eq!(state.pointer_down(Some(RegionKey::new(2, 1)), None, true), None);
        assert_eq!(state.mode(), PointerMode::Dragging);
        assert_eq!(state.last_region(), None);
    }

    #[test]
    fn dragging_plays_each_new_open_string_once() {
        let mut state = InteractionState::default();
        state.pointer_down(open(6), None, true);

        assert_eq!(state.pointer_move(open(6), None, true), None);
        let next = state.pointer_move(open(5), None, true).unwrap();
        assert_eq!(next.string, 5);
        assert_eq!(state.pointer_move(open(5), None, true), None);
        // Fretted regions neither play nor reset the remembered region.
        assert_eq!(state.pointer_move(Some(RegionKey::new(5, 4)), None, true), None);
        assert_eq!(state.pointer_move(open(5), None, true), None);
        assert!(state.pointer_move(open(6), None, true).is_some());
    }

    #[test]
    fn leaving_every_region_allows_a_replay() {
        let mut state = InteractionState::default();
        state.pointer_down(open(4), None, true);
        assert_eq!(state.pointer_move(None, None, true), None);
        assert_eq!(state.last_region(), None);
        assert!(state.pointer_move(open(4), None, true).is_some());
    }

    #[test]
    fn moving_without_dragging_does_nothing() {
        let mut state = InteractionState::default();
        assert_eq!(state.pointer_move(open(1), None, true), None);

        state.pointer_down(open(1), None, true);
        state.pointer_up();
        assert_eq!(state.mode(), PointerMode::Idle);
        assert_eq!(state.last_region(), None);
        assert_eq!(state.pointer_move(open(2), None, true), None);
    }

    #[test]
    fn clicks_play_fretted_regions_regardless_of_drag() {
        let mut state = InteractionState::default();
        let key = RegionKey::new(2, 1);
        let request = state.click(Some(key), true).unwrap();
        assert_eq!(request.region, key);
        assert_eq!(request.source, PlaySource::Click);

        state.pointer_down(open(6), None, true);
        assert!(state.click(Some(key), true).is_some());
        assert_eq!(state.click(open(2), true), None);
        assert_eq!(state.click(None, true), None);
    }

    #[test]
    fn nothing_plays_while_input_is_disabled() {
        let mut state = InteractionState::default();
        assert_eq!(state.pointer_down(open(6), None, false), None);
        assert_eq!(state.mode(), PointerMode::Idle);
        assert_eq!(state.click(Some(RegionKey::new(2, 1)), false), None);
    }

    #[test]
    fn strum_walks_strings_low_to_high_at_chord_frets() {
        let chord = g_major();
        let mut strummer = Strummer::default();
        let mut played = vec![strummer.start(Some(&chord)).unwrap()];
        played.extend(strummer.tick(Duration::from_millis(16)));
        for _ in 0..5 {
            played.extend(strummer.tick(Duration::from_millis(50)));
        }
        assert!(!strummer.is_active());

        let strings: Vec<u8> = played.iter().map(|r| r.string).collect();
        assert_eq!(strings, vec![6, 5, 4, 3, 2, 1]);
        let frets: Vec<u8> = played.iter().map(|r| r.fret).collect();
        assert_eq!(frets, vec![3, 2, 0, 0, 0, 3]);
        assert!(played.iter().all(|r| r.bypass_debounce));
        assert!(played.iter().all(|r| !r.reports_press()));
    }

    #[test]
    fn strum_steps_are_spaced_in_time() {
        let mut strummer = Strummer::default();
        strummer.start(None);
        assert!(strummer.tick(Duration::from_millis(16)).is_empty());
        assert!(strummer.tick(Duration::from_millis(30)).is_empty());
        assert_eq!(strummer.tick(Duration::from_millis(30)).len(), 1);
        // A long frame releases every string that came due.
        assert_eq!(strummer.tick(Duration::from_millis(200)).len(), 4);
        assert!(!strummer.is_active());
    }

    #[test]
    fn the_starting_frame_only_plays_the_first_string() {
        let mut strummer = Strummer::default();
        let first = strummer.start(None).unwrap();
        assert_eq!(first.string, 6);
        // A long press frame must not release the following strings early.
        assert!(strummer.tick(Duration::from_millis(100)).is_empty());

        let next = strummer.tick(Duration::from_millis(50));
        let strings: Vec<u8> = next.iter().map(|r| r.string).collect();
        assert_eq!(strings, vec![5]);
    }

    #[test]
    fn overlapping_strums_are_rejected() {
        let mut strummer = Strummer::default();
        assert!(strummer.start(None).is_some());
        assert_eq!(strummer.start(None), None);
        strummer.cancel();
        assert!(strummer.start(None).is_some());
    }
}
