use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use bevy::tasks::{block_on, futures_lite::future, AsyncComputeTaskPool, Task};
use bevy::window::WindowFocused;
use kira::sound::static_sound::StaticSoundData;
use kira::sound::FromFileError;
use kira::track::{TrackBuilder, TrackHandle};
use kira::{AudioManager, AudioManagerSettings, Decibels, DefaultBackend, Tween};
use thiserror::Error;

use crate::file::config::{AppConfig, AudioConfig};
use crate::guitar::interaction::PlayRequest;
use crate::guitar::types::{note_name, RegionKey};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to start audio output: {0}")]
    Init(String),
    #[error("failed to create the sample track: {0}")]
    Track(String),
    #[error("failed to load sample from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: FromFileError,
    },
    #[error("failed to start sample playback: {0}")]
    Play(String),
}

/// Where triggered samples end up. Kept behind a trait so the trigger rules
/// can run without a sound device.
pub trait SampleOutput {
    type Sample;

    fn resume_if_suspended(&mut self);
    fn suspend(&mut self);
    fn play(&mut self, sample: &Self::Sample) -> Result<(), AudioError>;
}

fn amplitude_to_decibels(gain: f32) -> Decibels {
    if gain <= 0.001 {
        Decibels::SILENCE
    } else {
        Decibels(20.0 * gain.log10())
    }
}

struct KiraTrack {
    manager: AudioManager<DefaultBackend>,
    track: TrackHandle,
}

/// Plays samples through a single sub-track whose volume is fixed at startup.
/// Without a working device every call is a no-op.
pub struct KiraOutput {
    inner: Option<KiraTrack>,
    suspended: bool,
}

impl KiraOutput {
    pub fn new(gain: f32) -> Result<Self, AudioError> {
        let mut manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|err| AudioError::Init(format!("{err:?}")))?;
        let track = manager
            .add_sub_track(TrackBuilder::new().volume(amplitude_to_decibels(gain)))
            .map_err(|err| AudioError::Track(format!("{err:?}")))?;
        Ok(Self {
            inner: Some(KiraTrack { manager, track }),
            suspended: false,
        })
    }

    pub fn silent() -> Self {
        Self {
            inner: None,
            suspended: false,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.inner.is_none()
    }

    pub fn drain_backend_errors(&mut self) {
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(inner) = &mut self.inner {
            while let Some(err) = inner.manager.backend_mut().pop_error() {
                error!("Audio backend error: {err}");
            }
        }
    }
}

impl SampleOutput for KiraOutput {
    type Sample = StaticSoundData;

    fn resume_if_suspended(&mut self) {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        if let Some(inner) = &mut self.inner {
            inner.track.resume(Tween::default());
        }
    }

    fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        self.suspended = true;
        if let Some(inner) = &mut self.inner {
            inner.track.pause(Tween::default());
        }
    }

    fn play(&mut self, sample: &StaticSoundData) -> Result<(), AudioError> {
        let Some(inner) = &mut self.inner else {
            return Ok(());
        };
        inner
            .track
            .play(sample.clone())
            .map(|_| ())
            .map_err(|err| AudioError::Play(format!("{err:?}")))
    }
}

pub fn load_sample(path: &Path) -> Result<StaticSoundData, AudioError> {
    StaticSoundData::from_file(path).map_err(|source| AudioError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// The most recently played note name. Cleared once `hold` has passed since
/// the latest trigger; every trigger re-arms the same timer.
#[derive(Debug)]
pub struct NoteDisplay {
    note: Option<String>,
    clear: Timer,
}

impl NoteDisplay {
    pub fn new(hold: Duration) -> Self {
        Self {
            note: None,
            clear: Timer::new(hold, TimerMode::Once),
        }
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    fn show(&mut self, note: String) {
        self.note = Some(note);
        self.clear.reset();
    }

    /// Returns true when the note was cleared during this tick.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if self.note.is_none() {
            return false;
        }
        self.clear.tick(delta);
        if self.clear.just_finished() {
            self.note = None;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Played { note: String },
    Debounced,
    /// No sample loaded for the key yet, or loading failed.
    Missing,
    Failed,
}

pub struct AudioTriggerEngine<O: SampleOutput> {
    output: O,
    bank: HashMap<RegionKey, O::Sample>,
    debounce: Duration,
    last_trigger: Option<(RegionKey, Duration)>,
    display: NoteDisplay,
}

impl<O: SampleOutput> AudioTriggerEngine<O> {
    pub fn new(output: O, debounce: Duration, note_hold: Duration) -> Self {
        Self {
            output,
            bank: HashMap::new(),
            debounce,
            last_trigger: None,
            display: NoteDisplay::new(note_hold),
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn insert_sample(&mut self, key: RegionKey, sample: O::Sample) {
        self.bank.insert(key, sample);
    }

    pub fn sample_count(&self) -> usize {
        self.bank.len()
    }

    pub fn has_sample(&self, key: RegionKey) -> bool {
        self.bank.contains_key(&key)
    }

    pub fn current_note(&self) -> Option<&str> {
        self.display.note()
    }

    pub fn suspend(&mut self) {
        self.output.suspend();
    }

    /// `now` is any monotonic clock; only differences between calls matter.
    pub fn trigger(
        &mut self,
        key: RegionKey,
        string: u8,
        fret: u8,
        bypass_debounce: bool,
        now: Duration,
    ) -> TriggerOutcome {
        self.output.resume_if_suspended();

        if !bypass_debounce {
            if let Some((last_key, at)) = self.last_trigger {
                if last_key == key && now.saturating_sub(at) < self.debounce {
                    return TriggerOutcome::Debounced;
                }
            }
            self.last_trigger = Some((key, now));
        }

        let Some(sample) = self.bank.get(&key) else {
            return TriggerOutcome::Missing;
        };
        if let Err(err) = self.output.play(sample) {
            warn!("{err}");
            return TriggerOutcome::Failed;
        }

        let note = note_name(string, fret).unwrap_or_default();
        self.display.show(note.clone());
        TriggerOutcome::Played { note }
    }

    pub fn tick(&mut self, delta: Duration) -> bool {
        self.display.tick(delta)
    }
}

#[derive(Resource, Deref, DerefMut)]
pub struct GuitarAudio(pub AudioTriggerEngine<KiraOutput>);

impl FromWorld for GuitarAudio {
    fn from_world(world: &mut World) -> Self {
        let audio = world
            .get_resource::<AppConfig>()
            .map(|config| config.audio.clone())
            .unwrap_or_default();
        let output = match KiraOutput::new(audio.gain) {
            Ok(output) => output,
            Err(err) => {
                error!("{err}; continuing without sound");
                KiraOutput::silent()
            }
        };
        GuitarAudio(AudioTriggerEngine::new(
            output,
            audio.debounce(),
            audio.note_display(),
        ))
    }
}

#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct NotePlayed {
    pub note: String,
}

type SampleTask = Task<Result<StaticSoundData, AudioError>>;

#[derive(Resource, Default)]
pub struct PendingSamples {
    tasks: Vec<(RegionKey, SampleTask)>,
    requested: usize,
}

impl PendingSamples {
    pub fn is_done(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub fn sample_path(audio: &AudioConfig, key: RegionKey) -> PathBuf {
    audio
        .samples_dir
        .join(format!("{key}.{}", audio.sample_extension))
}

pub fn queue_sample_loads(config: Res<AppConfig>, mut pending: ResMut<PendingSamples>) {
    let pool = AsyncComputeTaskPool::get();
    for string in 1..=6 {
        for fret in 0..=config.audio.max_fret {
            let key = RegionKey::new(string, fret);
            let path = sample_path(&config.audio, key);
            if !path.exists() {
                warn!("Cannot load {key}: no file at {}", path.display());
                continue;
            }
            let task = pool.spawn(async move { load_sample(&path) });
            pending.tasks.push((key, task));
        }
    }
    pending.requested = pending.tasks.len();
    info!("Loading {} guitar samples", pending.requested);
}

pub fn collect_loaded_samples(mut pending: ResMut<PendingSamples>, mut audio: ResMut<GuitarAudio>) {
    if pending.is_done() {
        return;
    }

    let mut still_loading = Vec::new();
    for (key, mut task) in pending.tasks.drain(..) {
        match block_on(future::poll_once(&mut task)) {
            Some(Ok(sample)) => audio.insert_sample(key, sample),
            Some(Err(err)) => warn!("Cannot load {key}: {err}"),
            None => still_loading.push((key, task)),
        }
    }
    pending.tasks = still_loading;

    if pending.is_done() {
        info!(
            "Loaded {} of {} guitar samples",
            audio.sample_count(),
            pending.requested
        );
    }
}

pub fn play_requested_samples(
    mut requests: MessageReader<PlayRequest>,
    mut audio: ResMut<GuitarAudio>,
    mut played: MessageWriter<NotePlayed>,
    time: Res<Time<Real>>,
) {
    for request in requests.read() {
        let outcome = audio.trigger(
            request.region,
            request.string,
            request.fret,
            request.bypass_debounce,
            time.elapsed(),
        );
        if let TriggerOutcome::Played { note } = outcome {
            played.write(NotePlayed { note });
        }
    }
}

pub fn clear_note_display(mut audio: ResMut<GuitarAudio>, time: Res<Time<Real>>) {
    audio.tick(time.delta());
}

pub fn suspend_on_focus_loss(mut focus: MessageReader<WindowFocused>, mut audio: ResMut<GuitarAudio>) {
    if focus.read().any(|event| !event.focused) {
        audio.suspend();
    }
}

pub fn drain_audio_errors(mut audio: ResMut<GuitarAudio>) {
    audio.output_mut().drain_backend_errors();
}

pub struct GuitarAudioPlugin;

impl Plugin for GuitarAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GuitarAudio>()
            .init_resource::<PendingSamples>()
            .add_message::<NotePlayed>()
            .add_systems(Startup, queue_sample_loads)
            .add_systems(
                Update,
                (
                    suspend_on_focus_loss,
                    collect_loaded_samples,
                    play_requested_samples,
                    clear_note_display,
                    drain_audio_errors,
                )
                    .chain(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOutput {
        played: Vec<&'static str>,
        suspended: bool,
        resumes: usize,
        fail: bool,
    }

    impl SampleOutput for RecordingOutput {
        type Sample = &'static str;

        fn resume_if_suspended(&mut self) {
            if self.suspended {
                self.suspended = false;
                self.resumes += 1;
            }
        }

        fn suspend(&mut self) {
            self.suspended = true;
        }

        fn play(&mut self, sample: &&'static str) -> Result<(), AudioError> {
            if self.fail {
                return Err(AudioError::Play("device lost".to_string()));
            }
            self.played.push(sample);
            Ok(())
        }
    }

    fn engine() -> AudioTriggerEngine<RecordingOutput> {
        let mut engine = AudioTriggerEngine::new(
            RecordingOutput::default(),
            Duration::from_millis(250),
            Duration::from_secs(2),
        );
        engine.insert_sample(RegionKey::new(2, 1), "String_2_1");
        engine.insert_sample(RegionKey::new(6, 3), "String_6_3");
        engine
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn repeated_trigger_within_window_is_ignored() {
        let mut engine = engine();
        let key = RegionKey::new(2, 1);
        assert_eq!(
            engine.trigger(key, 2, 1, false, ms(1000)),
            TriggerOutcome::Played {
                note: "C4".to_string()
            }
        );
        assert_eq!(engine.trigger(key, 2, 1, false, ms(1200)), TriggerOutcome::Debounced);
        assert_eq!(engine.output().played, vec!["String_2_1"]);

        assert!(matches!(
            engine.trigger(key, 2, 1, false, ms(1251)),
            TriggerOutcome::Played { .. }
        ));
        assert_eq!(engine.output().played.len(), 2);
    }

    #[test]
    fn debounce_is_per_region() {
        let mut engine = engine();
        engine.trigger(RegionKey::new(2, 1), 2, 1, false, ms(0));
        assert!(matches!(
            engine.trigger(RegionKey::new(6, 3), 6, 3, false, ms(10)),
            TriggerOutcome::Played { .. }
        ));
    }

    #[test]
    fn strum_bypasses_the_debounce() {
        let mut engine = engine();
        let key = RegionKey::new(6, 3);
        engine.trigger(key, 6, 3, false, ms(0));
        assert!(matches!(
            engine.trigger(key, 6, 3, true, ms(10)),
            TriggerOutcome::Played { .. }
        ));
        assert_eq!(engine.output().played.len(), 2);
    }

    #[test]
    fn missing_samples_are_silent() {
        let mut engine = engine();
        assert_eq!(
            engine.trigger(RegionKey::new(1, 7), 1, 7, false, ms(0)),
            TriggerOutcome::Missing
        );
        assert!(engine.output().played.is_empty());
        assert_eq!(engine.current_note(), None);
    }

    #[test]
    fn playback_failures_do_not_show_a_note() {
        let mut engine = engine();
        engine.output_mut().fail = true;
        assert_eq!(
            engine.trigger(RegionKey::new(2, 1), 2, 1, false, ms(0)),
            TriggerOutcome::Failed
        );
        assert_eq!(engine.current_note(), None);
    }

    #[test]
    fn triggering_resumes_a_suspended_output() {
        let mut engine = engine();
        engine.suspend();
        engine.trigger(RegionKey::new(1, 7), 1, 7, false, ms(0));
        assert_eq!(engine.output().resumes, 1);
        assert!(!engine.output().suspended);
    }

    #[test]
    fn note_display_holds_from_the_latest_trigger() {
        let mut engine = engine();
        engine.trigger(RegionKey::new(2, 1), 2, 1, false, ms(0));
        assert_eq!(engine.current_note(), Some("C4"));

        assert!(!engine.tick(ms(1500)));
        engine.trigger(RegionKey::new(6, 3), 6, 3, false, ms(1500));
        assert_eq!(engine.current_note(), Some("G2"));

        // 2.5s after the first trigger, but only 1s after the second.
        assert!(!engine.tick(ms(1000)));
        assert_eq!(engine.current_note(), Some("G2"));

        assert!(engine.tick(ms(1000)));
        assert_eq!(engine.current_note(), None);
        assert!(!engine.tick(ms(5000)));
    }

    #[test]
    fn gain_maps_to_decibels() {
        assert_eq!(amplitude_to_decibels(0.0), Decibels::SILENCE);
        assert!((amplitude_to_decibels(1.0).0).abs() < 1e-6);
        assert!((amplitude_to_decibels(0.3).0 + 10.457).abs() < 1e-2);
    }
}
