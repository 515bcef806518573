use std::collections::BTreeMap;
use std::time::Duration;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::file::config::{AppConfig, GameConfig};
use crate::guitar::interaction::StringPressed;
use crate::guitar::types::{Chord, Note};
use crate::states::AppState;

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    Idle,
    Playing,
    Correct,
    Wrong,
    GameOver,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetChord {
    pub name: String,
    pub chord: Chord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    pub round_secs: u32,
    pub wrong_penalty_secs: u32,
    pub feedback_hold: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            round_secs: 30,
            wrong_penalty_secs: 2,
            feedback_hold: Duration::from_secs(1),
        }
    }
}

impl From<&GameConfig> for GameRules {
    fn from(config: &GameConfig) -> Self {
        Self {
            round_secs: config.round_secs,
            wrong_penalty_secs: config.wrong_penalty_secs,
            feedback_hold: Duration::from_millis(config.feedback_hold_ms),
        }
    }
}

/// Timed chord-matching loop. Both timers only advance in the status they
/// belong to, so resetting them on every status change is enough to keep a
/// stale countdown or feedback hold from firing into a new round.
#[derive(Resource, Debug)]
pub struct ChordGame {
    rules: GameRules,
    status: GameStatus,
    score: u32,
    time_left: u32,
    target: Option<TargetChord>,
    pressed: BTreeMap<Note, u8>,
    pool: Vec<TargetChord>,
    countdown: Timer,
    feedback: Timer,
    rounds: u64,
}

impl Default for ChordGame {
    fn default() -> Self {
        ChordGame::new(GameRules::default())
    }
}

impl ChordGame {
    pub fn new(rules: GameRules) -> Self {
        Self {
            rules,
            status: GameStatus::Idle,
            score: 0,
            time_left: rules.round_secs,
            target: None,
            pressed: BTreeMap::new(),
            pool: Vec::new(),
            countdown: Timer::new(COUNTDOWN_STEP, TimerMode::Repeating),
            feedback: Timer::new(rules.feedback_hold, TimerMode::Once),
            rounds: 0,
        }
    }

    pub fn set_pool(&mut self, pool: Vec<TargetChord>) {
        self.pool = pool;
    }

    pub fn rules(&self) -> GameRules {
        self.rules
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn target(&self) -> Option<&TargetChord> {
        self.target.as_ref()
    }

    pub fn pressed(&self) -> &BTreeMap<Note, u8> {
        &self.pressed
    }

    /// Increments every time a new target is drawn.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    pub fn start(&mut self, rng: &mut impl Rng) -> bool {
        if self.pool.is_empty() {
            warn!("Cannot start the chord game: no chords to draw from");
            return false;
        }
        self.score = 0;
        self.time_left = self.rules.round_secs;
        self.feedback.reset();
        self.next_target(rng);
        self.enter_playing();
        info!("Chord game started");
        true
    }

    pub fn reset(&mut self) {
        self.status = GameStatus::Idle;
        self.score = 0;
        self.time_left = self.rules.round_secs;
        self.target = None;
        self.pressed.clear();
        self.countdown.reset();
        self.feedback.reset();
    }

    /// Latest press on a string wins. Ignored unless a round is running.
    pub fn register_press(&mut self, string: u8, fret: u8) -> bool {
        if !self.is_playing() {
            return false;
        }
        let Some(note) = Note::from_string_number(string) else {
            return false;
        };
        self.pressed.insert(note, fret);
        true
    }

    pub fn clear_presses(&mut self) {
        self.pressed.clear();
    }

    /// Open strings count as unpressed, so the pressed set matches when it
    /// holds exactly the target's fretted strings at their frets.
    pub fn matches_target(&self) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        let required: BTreeMap<Note, u8> = target.chord.fretted().collect();
        let pressed: BTreeMap<Note, u8> = self
            .pressed
            .iter()
            .filter(|(_, fret)| **fret > 0)
            .map(|(note, fret)| (*note, *fret))
            .collect();
        required == pressed
    }

    /// Returns whether the pressed strings matched, or `None` if there was
    /// nothing to check.
    pub fn validate(&mut self) -> Option<bool> {
        if !self.is_playing() || self.target.is_none() {
            return None;
        }

        let correct = self.matches_target();
        if correct {
            self.score += 1;
            self.status = GameStatus::Correct;
        } else {
            self.time_left = self.time_left.saturating_sub(self.rules.wrong_penalty_secs);
            self.status = GameStatus::Wrong;
        }
        self.feedback.reset();
        Some(correct)
    }

    /// Returns the new status when this tick changed it.
    pub fn tick(&mut self, delta: Duration, rng: &mut impl Rng) -> Option<GameStatus> {
        match self.status {
            GameStatus::Playing => {
                self.countdown.tick(delta);
                for _ in 0..self.countdown.times_finished_this_tick() {
                    if self.time_left <= 1 {
                        self.time_left = 0;
                        self.status = GameStatus::GameOver;
                        info!("Chord game over with score {}", self.score);
                        return Some(self.status);
                    }
                    self.time_left -= 1;
                }
                None
            }
            GameStatus::Correct => {
                self.feedback.tick(delta);
                if !self.feedback.just_finished() {
                    return None;
                }
                self.next_target(rng);
                self.enter_playing();
                Some(self.status)
            }
            GameStatus::Wrong => {
                self.feedback.tick(delta);
                if !self.feedback.just_finished() {
                    return None;
                }
                self.pressed.clear();
                if self.time_left == 0 {
                    self.status = GameStatus::GameOver;
                    info!("Chord game over with score {}", self.score);
                } else {
                    self.enter_playing();
                }
                Some(self.status)
            }
            GameStatus::Idle | GameStatus::GameOver => None,
        }
    }

    fn next_target(&mut self, rng: &mut impl Rng) {
        self.target = self.pool.choose(rng).cloned();
        self.pressed.clear();
        self.rounds += 1;
        if let Some(target) = &self.target {
            debug!("Next target chord: {}", target.name);
        }
    }

    fn enter_playing(&mut self) {
        self.status = GameStatus::Playing;
        self.countdown.reset();
    }
}

#[derive(Resource)]
pub struct GameRng(pub StdRng);

impl Default for GameRng {
    fn default() -> Self {
        GameRng(StdRng::from_entropy())
    }
}

pub fn register_string_presses(mut presses: MessageReader<StringPressed>, mut game: ResMut<ChordGame>) {
    for press in presses.read() {
        game.register_press(press.string, press.fret);
    }
}

pub fn tick_chord_game(time: Res<Time>, mut game: ResMut<ChordGame>, mut rng: ResMut<GameRng>) {
    if matches!(game.status(), GameStatus::Idle | GameStatus::GameOver) {
        return;
    }
    game.tick(time.delta(), &mut rng.0);
}

pub struct ChordGamePlugin;

impl Plugin for ChordGamePlugin {
    fn build(&self, app: &mut App) {
        let rules = app
            .world()
            .get_resource::<AppConfig>()
            .map(|config| GameRules::from(&config.game))
            .unwrap_or_default();
        app.insert_resource(ChordGame::new(rules))
            .init_resource::<GameRng>()
            .add_systems(
                Update,
                (register_string_presses, tick_chord_game)
                    .chain()
                    .run_if(in_state(AppState::ChordGame)),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guitar::types::{Finger, FretPosition};

    fn chord(frets: [(u8, Option<u8>); 6]) -> Chord {
        let mut chord = Chord::default();
        for (note, (fret, finger)) in Note::ALL.into_iter().zip(frets) {
            chord.notes.insert(
                note,
                FretPosition {
                    fret,
                    finger: finger.map(|f| Finger::try_from(f).unwrap()),
                },
            );
        }
        chord
    }

    fn c_major() -> TargetChord {
        TargetChord {
            name: "C".to_string(),
            chord: chord([
                (0, None),
                (3, Some(3)),
                (2, Some(2)),
                (0, None),
                (1, Some(1)),
                (0, None),
            ]),
        }
    }

    fn playing_c() -> (ChordGame, StdRng) {
        let mut game = ChordGame::default();
        game.set_pool(vec![c_major()]);
        let mut rng = StdRng::seed_from_u64(7);
        assert!(game.start(&mut rng));
        (game, rng)
    }

    fn press_c(game: &mut ChordGame) {
        game.register_press(5, 3);
        game.register_press(4, 2);
        game.register_press(2, 1);
    }

    #[test]
    fn cannot_start_without_chords() {
        let mut game = ChordGame::default();
        assert!(!game.start(&mut StdRng::seed_from_u64(1)));
        assert_eq!(game.status(), GameStatus::Idle);
    }

    #[test]
    fn start_draws_a_target_and_clears_state() {
        let (game, _) = playing_c();
        assert_eq!(game.status(), GameStatus::Playing);
        assert_eq!(game.time_left(), 30);
        assert_eq!(game.score(), 0);
        assert_eq!(game.target().map(|t| t.name.as_str()), Some("C"));
        assert!(game.pressed().is_empty());
    }

    #[test]
    fn exact_presses_score() {
        let (mut game, mut rng) = playing_c();
        press_c(&mut game);
        assert_eq!(game.validate(), Some(true));
        assert_eq!(game.score(), 1);
        assert_eq!(game.status(), GameStatus::Correct);

        let rounds = game.rounds();
        assert_eq!(game.tick(Duration::from_millis(999), &mut rng), None);
        assert_eq!(game.tick(Duration::from_millis(1), &mut rng), Some(GameStatus::Playing));
        assert_eq!(game.rounds(), rounds + 1);
        assert!(game.pressed().is_empty());
    }

    #[test]
    fn extra_string_is_wrong() {
        let (mut game, mut rng) = playing_c();
        press_c(&mut game);
        game.register_press(3, 2);
        assert_eq!(game.validate(), Some(false));
        assert_eq!(game.status(), GameStatus::Wrong);
        assert_eq!(game.time_left(), 28);
        assert_eq!(game.score(), 0);

        let rounds = game.rounds();
        game.tick(Duration::from_secs(1), &mut rng);
        assert_eq!(game.status(), GameStatus::Playing);
        assert!(game.pressed().is_empty());
        // Same target after a miss.
        assert_eq!(game.rounds(), rounds);
    }

    #[test]
    fn missing_or_misplaced_strings_are_wrong() {
        let (mut game, _) = playing_c();
        game.register_press(5, 3);
        game.register_press(4, 2);
        assert_eq!(game.validate(), Some(false));

        let (mut game, _) = playing_c();
        press_c(&mut game);
        game.register_press(2, 2);
        assert_eq!(game.validate(), Some(false));
    }

    #[test]
    fn open_string_presses_are_ignored() {
        let (mut game, _) = playing_c();
        press_c(&mut game);
        game.register_press(1, 0);
        assert_eq!(game.validate(), Some(true));
    }

    #[test]
    fn latest_press_on_a_string_wins() {
        let (mut game, _) = playing_c();
        game.register_press(5, 7);
        press_c(&mut game);
        assert_eq!(game.pressed().get(&Note::A), Some(&3));
        assert_eq!(game.validate(), Some(true));
    }

    #[test]
    fn presses_only_count_while_playing() {
        let (mut game, _) = playing_c();
        game.validate();
        assert!(!game.register_press(5, 3));
        assert_eq!(game.validate(), None);
    }

    #[test]
    fn penalty_is_floored_at_zero() {
        let mut game = ChordGame::new(GameRules {
            round_secs: 1,
            ..GameRules::default()
        });
        game.set_pool(vec![c_major()]);
        let mut rng = StdRng::seed_from_u64(3);
        game.start(&mut rng);
        assert_eq!(game.validate(), Some(false));
        assert_eq!(game.time_left(), 0);
        assert_eq!(game.tick(Duration::from_secs(1), &mut rng), Some(GameStatus::GameOver));
    }

    #[test]
    fn countdown_ends_the_game() {
        let (mut game, mut rng) = playing_c();
        for _ in 0..29 {
            game.tick(Duration::from_secs(1), &mut rng);
        }
        assert_eq!(game.time_left(), 1);
        assert_eq!(game.status(), GameStatus::Playing);

        assert_eq!(game.tick(Duration::from_secs(1), &mut rng), Some(GameStatus::GameOver));
        assert_eq!(game.time_left(), 0);

        press_c(&mut game);
        assert_eq!(game.validate(), None);
        assert_eq!(game.score(), 0);
        assert_eq!(game.tick(Duration::from_secs(5), &mut rng), None);
    }

    #[test]
    fn countdown_pauses_during_feedback() {
        let (mut game, mut rng) = playing_c();
        press_c(&mut game);
        game.validate();
        game.tick(Duration::from_millis(500), &mut rng);
        assert_eq!(game.time_left(), 30);
    }

    #[test]
    fn reset_cancels_pending_feedback() {
        let (mut game, mut rng) = playing_c();
        press_c(&mut game);
        game.validate();
        game.tick(Duration::from_millis(900), &mut rng);
        game.reset();
        assert_eq!(game.status(), GameStatus::Idle);
        assert_eq!(game.tick(Duration::from_secs(1), &mut rng), None);
        assert_eq!(game.status(), GameStatus::Idle);
        assert_eq!(game.score(), 0);
        assert_eq!(game.target(), None);

        // A fresh game does not inherit the old countdown progress.
        game.start(&mut rng);
        assert_eq!(game.tick(Duration::from_millis(900), &mut rng), None);
        assert_eq!(game.time_left(), 30);
    }
}
