//! `DrumMachine`: the single entry point the presentation layer talks to
//!
//! Owns the authoritative session state. Every mutation goes through here, is
//! recorded in the undo history, and is picked up by the scheduler on the
//! next `tick`.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use pulsegrid_core::{
    CustomSample, EngineConfig, Genre, History, InstrumentRole, ParamKey, PulseGridError, Result,
    STEPS_PER_PATTERN, SampleBuffer, SceneBank, SessionState, Track, TrackId, DEFAULT_SCENE_COUNT,
    find_preset,
};
use tracing::{debug, info, warn};

use crate::audio_engine::AudioEngine;
use crate::audio_input::SampleRecorder;
use crate::clock::AudioClock;
use crate::commands::{CommandSink, EngineCommand, EngineEvent, StatusKind};
use crate::macro_fx::{EffectParam, MacroEffects};
use crate::mixer::{MAX_BLOCK, Mixer};
use crate::noise_bank::NoiseBank;
use crate::preview::PreviewRenderer;
use crate::samples::{SampleError, decode_wav, resample};
use crate::scheduler::Scheduler;
use crate::synthesis::SynthLibrary;

/// Undo entry. The scene bank travels with the session so a reverted scene
/// switch also reverts which slot is live.
#[derive(Debug, Clone)]
struct Snapshot {
    state: SessionState,
    scenes: SceneBank,
}

pub struct DrumMachine {
    config: EngineConfig,
    state: SessionState,
    history: History<Snapshot>,
    scenes: SceneBank,
    library: Arc<SynthLibrary>,
    engine: AudioEngine,
    commands: Sender<EngineCommand>,
    scheduler: Scheduler,
    preview: PreviewRenderer,
    events_tx: Sender<EngineEvent>,
    events: Receiver<EngineEvent>,
    selected: Option<TrackId>,
    recorder: Option<SampleRecorder>,
    /// Transport start requested while output was unavailable
    start_pending: bool,
}

impl DrumMachine {
    pub fn new(config: EngineConfig) -> Self {
        let genre = Genre::from_name(&config.default_genre).unwrap_or_else(|e| {
            warn!("{}; using the default kit", e);
            Genre::default()
        });
        let mut state = SessionState::with_kit(genre, config.default_bpm);
        state.metronome = config.metronome;

        let bank = Arc::new(NoiseBank::new(config.sample_rate, config.reverb.seconds));
        let library = Arc::new(SynthLibrary::new(bank.clone()));
        let engine = AudioEngine::new(&config, bank);
        let (events_tx, events) = unbounded();
        let scheduler = Scheduler::new(&config, engine.clock(), library.clone(), events_tx.clone());
        let preview = PreviewRenderer::new(&config, library.clone(), events_tx.clone());

        info!(genre = %state.genre, bpm = state.bpm(), tracks = state.tracks.len(), "Drum machine ready");

        Self {
            history: History::new(config.history_depth),
            scenes: SceneBank::new(DEFAULT_SCENE_COUNT, &state.scene()),
            commands: engine.sender(),
            config,
            state,
            library,
            engine,
            scheduler,
            preview,
            events_tx,
            events,
            selected: None,
            recorder: None,
            start_pending: false,
        }
    }

    /// Step reports, preview buffers and status messages
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    fn status(&self, kind: StatusKind, message: String) {
        warn!(?kind, "{}", message);
        let _ = self.events_tx.send(EngineEvent::Status { kind, message });
    }

    /// Try to bring the output up and honour a pending transport start.
    /// Failure is reported and retried on the next interaction, never fatal.
    fn unlock_audio(&mut self) {
        if !self.engine.is_running() {
            if let Err(e) = self.engine.ensure_running() {
                self.status(StatusKind::AudioUnavailable, e.to_string());
                return;
            }
        }
        if self.start_pending {
            self.start_pending = false;
            self.scheduler.start(&self.state, &mut self.commands);
        }
    }

    // Transport

    pub fn start(&mut self) {
        self.start_pending = true;
        self.unlock_audio();
    }

    pub fn stop(&mut self) {
        self.start_pending = false;
        self.scheduler.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.record();
        self.state.set_bpm(bpm);
        self.scheduler.set_tempo(self.state.bpm(), &mut self.commands);
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.scheduler.set_recording(recording);
    }

    /// Drive the scheduler; call once per host frame
    pub fn tick(&mut self) {
        self.scheduler.poll(&self.state, &mut self.commands);
    }

    /// Manual one-shot outside the grid
    pub fn trigger(&mut self, track: TrackId) -> Result<()> {
        self.unlock_audio();
        self.scheduler.trigger_now(&self.state, track, &mut self.commands)
    }

    /// Pad strike: always sounds, and while recording writes the quantized
    /// step into the active pattern. Returns the written step.
    pub fn pad(&mut self, track: TrackId) -> Result<Option<usize>> {
        self.trigger(track)?;
        let Some(step) = self.scheduler.record_target() else {
            return Ok(None);
        };
        self.edit_track(track, |t| t.pattern_mut().steps[step] = true)?;
        debug!(track = track.0, step, "Pad recorded");
        Ok(Some(step))
    }

    // Session edits

    fn snapshot(&self) -> Snapshot {
        Snapshot { state: self.state.clone(), scenes: self.scenes.clone() }
    }

    fn record(&mut self) {
        let snapshot = self.snapshot();
        self.history.record(snapshot);
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.scenes = snapshot.scenes;
        self.replace_state(snapshot.state);
    }

    /// Swap in a whole new state, tearing down strips of vanished tracks
    fn replace_state(&mut self, next: SessionState) {
        for track in &self.state.tracks {
            if next.track(track.id).is_none() {
                self.commands.push(EngineCommand::RemoveTrack(track.id));
            }
        }
        self.state = next;
        if let Some(id) = self.selected {
            if self.state.track(id).is_none() {
                self.selected = None;
            }
        }
        self.refresh_preview();
    }

    fn refresh_preview(&mut self) {
        let Some(id) = self.selected else {
            return;
        };
        if let Some(track) = self.state.track(id) {
            self.preview.request(track, self.state.genre);
        }
    }

    /// Choose the track whose preview is kept up to date
    pub fn select_track(&mut self, track: TrackId) -> Result<()> {
        if self.state.track(track).is_none() {
            return Err(PulseGridError::TrackNotFound(track.0));
        }
        if let Some(previous) = self.selected.replace(track) {
            if previous != track {
                self.preview.cancel(previous);
            }
        }
        self.refresh_preview();
        Ok(())
    }

    pub fn set_genre(&mut self, name: &str) -> Result<()> {
        let genre = Genre::from_name(name)?;
        self.record();
        self.state.genre = genre;
        info!(%genre, "Genre changed");
        self.refresh_preview();
        Ok(())
    }

    pub fn set_metronome(&mut self, on: bool) {
        self.record();
        self.state.metronome = on;
    }

    /// Replace a track with an edited copy
    pub fn edit_track<F>(&mut self, track: TrackId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Track),
    {
        let before = self.snapshot();
        self.state.update_track(track, edit)?;
        self.history.record(before);
        if self.selected == Some(track) {
            self.refresh_preview();
        }
        Ok(())
    }

    pub fn toggle_step(&mut self, track: TrackId, step: usize) -> Result<bool> {
        if step >= STEPS_PER_PATTERN {
            return Err(PulseGridError::StepOutOfRange(step));
        }
        let mut now_on = false;
        self.edit_track(track, |t| {
            let slot = &mut t.pattern_mut().steps[step];
            *slot = !*slot;
            now_on = *slot;
        })?;
        Ok(now_on)
    }

    /// Write or clear one automation entry, e.g. `("effects.filter.value", 3, Some(0.8))`
    pub fn set_automation(
        &mut self,
        track: TrackId,
        key: &str,
        step: usize,
        value: Option<f32>,
    ) -> Result<()> {
        let key = ParamKey::parse(key)?;
        if step >= STEPS_PER_PATTERN {
            return Err(PulseGridError::StepOutOfRange(step));
        }
        let mut outcome = Ok(());
        self.edit_track(track, |t| outcome = t.pattern_mut().set_automation(key, step, value))?;
        outcome
    }

    pub fn clear_automation(&mut self, track: TrackId, key: &str) -> Result<()> {
        let key = ParamKey::parse(key)?;
        self.edit_track(track, |t| t.pattern_mut().clear_automation_lane(key))
    }

    /// Load a named preset pattern into the live scene
    pub fn apply_preset(&mut self, name: &str) -> Result<usize> {
        let preset = find_preset(name)?;
        self.record();
        let loaded = pulsegrid_core::apply_preset(&mut self.state, preset);
        info!(preset = preset.name, loaded, "Preset applied");
        self.refresh_preview();
        Ok(loaded)
    }

    pub fn add_track(&mut self, role: InstrumentRole) -> TrackId {
        self.record();
        self.state.add_track(role)
    }

    pub fn remove_track(&mut self, track: TrackId) -> Result<()> {
        let mut next = self.state.clone();
        next.remove_track(track)?;
        self.record();
        self.preview.cancel(track);
        self.replace_state(next);
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.snapshot()) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.snapshot()) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    // Scenes

    pub fn live_scene(&self) -> usize {
        self.scenes.live_index()
    }

    /// Park the live state and restore scene `index` verbatim
    pub fn select_scene(&mut self, index: usize) -> Result<()> {
        let before = self.snapshot();
        let scene = self.scenes.select(index, &self.state.scene())?;
        self.history.record(before);
        let mut next = self.state.clone();
        next.restore_scene(scene);
        self.replace_state(next);
        info!(scene = index, "Scene selected");
        Ok(())
    }

    pub fn capture_scene(&mut self) {
        self.record();
        self.scenes.capture(&self.state.scene());
    }

    // Custom samples

    /// Assign a decoded buffer. `pitch_lock` is stored but playback always
    /// scales rate by `2^pitch`.
    pub fn assign_sample(
        &mut self,
        track: TrackId,
        buffer: SampleBuffer,
        trim_start: f32,
        trim_end: f32,
        pitch_lock: bool,
    ) -> Result<()> {
        debug!(track = track.0, pitch_lock, "Pitch lock has no effect on playback rate");
        let sample = CustomSample::new(buffer, trim_start, trim_end, pitch_lock);
        self.edit_track(track, |t| t.sample = Some(sample))
    }

    pub fn clear_sample(&mut self, track: TrackId) -> Result<()> {
        self.edit_track(track, |t| t.sample = None)
    }

    /// Decode WAV bytes and assign them. A decode failure is reported as a
    /// status event and leaves the track untouched; returns whether the
    /// sample was assigned.
    pub fn load_sample_bytes(
        &mut self,
        track: TrackId,
        bytes: &[u8],
        trim_start: f32,
        trim_end: f32,
        pitch_lock: bool,
    ) -> Result<bool> {
        if self.state.track(track).is_none() {
            return Err(PulseGridError::TrackNotFound(track.0));
        }
        let target = self.engine.clock().sample_rate();
        let decoded = decode_wav(bytes).and_then(|buffer| resample(&buffer, target));
        match decoded {
            Ok(buffer) => {
                self.assign_sample(track, buffer, trim_start, trim_end, pitch_lock)?;
                Ok(true)
            }
            Err(e) => {
                self.status(StatusKind::DecodeFailure, e.to_string());
                Ok(false)
            }
        }
    }

    pub fn is_recording_sample(&self) -> bool {
        self.recorder.is_some()
    }

    /// Open the input device. Failures become a status event.
    pub fn start_sample_recording(&mut self) -> bool {
        if self.recorder.is_some() {
            return true;
        }
        match SampleRecorder::start() {
            Ok(recorder) => {
                self.recorder = Some(recorder);
                true
            }
            Err(e) => {
                self.status(StatusKind::DeviceFailure, e.to_string());
                false
            }
        }
    }

    /// Stop recording and assign the take. Nothing is kept on failure.
    pub fn finish_sample_recording(
        &mut self,
        track: TrackId,
        trim_start: f32,
        trim_end: f32,
        pitch_lock: bool,
    ) -> Result<bool> {
        let Some(recorder) = self.recorder.take() else {
            return Ok(false);
        };
        match recorder.finish() {
            Ok(buffer) => {
                self.assign_sample(track, buffer, trim_start, trim_end, pitch_lock)?;
                Ok(true)
            }
            Err(e @ (SampleError::Device(_) | SampleError::Permission(_))) => {
                self.status(StatusKind::DeviceFailure, e.to_string());
                Ok(false)
            }
            Err(e) => {
                self.status(StatusKind::DecodeFailure, e.to_string());
                Ok(false)
            }
        }
    }

    pub fn cancel_sample_recording(&mut self) {
        self.recorder = None;
    }

    // Macro effects pass-through

    pub fn install_macro_effects(&mut self, effects: Box<dyn MacroEffects>) {
        self.engine.with_mixer(|m| m.set_macro_effects(Some(effects)));
    }

    pub fn apply_effects(&mut self, active: &[String]) {
        self.engine.with_mixer(|m| {
            if let Some(fx) = m.macro_effects() {
                fx.apply(active);
            }
        });
    }

    pub fn effect_params(&self, kind: &str) -> Vec<EffectParam> {
        self.engine
            .with_mixer(|m| m.macro_effects().map(|fx| fx.params(kind)))
            .flatten()
            .unwrap_or_default()
    }

    pub fn set_effect_param(&mut self, kind: &str, index: usize, value: f32) {
        self.engine.with_mixer(|m| {
            if let Some(fx) = m.macro_effects() {
                fx.set_param(kind, index, value);
            }
        });
    }

    // Offline

    /// Render `seconds` of the live scene from step 0 as interleaved stereo at
    /// the configured sample rate, without touching any device
    pub fn render_offline(&self, seconds: f64) -> Vec<f32> {
        let sample_rate = self.config.sample_rate;
        let clock = Arc::new(AudioClock::new(sample_rate));
        clock.set_running(true);

        let mut mixer = Mixer::new(&self.config, self.library.bank().clone(), clock.clone());
        let (events, _) = unbounded();
        let mut scheduler = Scheduler::new(&self.config, clock, self.library.clone(), events);

        let mut staged: Vec<EngineCommand> = Vec::new();
        scheduler.start(&self.state, &mut staged);

        let frames = (seconds.max(0.0) * sample_rate as f64).round() as usize;
        let mut out = vec![0.0; frames * 2];
        for block in out.chunks_mut(MAX_BLOCK * 2) {
            scheduler.poll(&self.state, &mut staged);
            for command in staged.drain(..) {
                mixer.queue(command);
            }
            mixer.render(block, 2);
        }
        info!(seconds, frames, "Offline render finished");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_fx::tests::RecordingMacro;
    use crate::samples::tests::wav_bytes;
    use pulsegrid_core::seconds_per_step;
    use std::time::Duration;

    fn machine() -> DrumMachine {
        let mut config = EngineConfig::default();
        config.sample_rate = 22_050;
        config.reverb.seconds = 0.3;
        config.preview_debounce_ms = 10;
        DrumMachine::new(config)
    }

    fn role(m: &DrumMachine, role: InstrumentRole) -> TrackId {
        m.state().track_for_role(role).map(|t| t.id).unwrap()
    }

    fn statuses(m: &DrumMachine) -> Vec<StatusKind> {
        m.events()
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::Status { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_machine_has_default_kit() {
        let m = machine();
        assert_eq!(m.state().tracks.len(), 8);
        assert_eq!(m.state().genre, Genre::Tr808);
        assert!(!m.is_playing());
    }

    #[test]
    fn test_four_on_the_floor_end_to_end() {
        let mut m = machine();
        assert_eq!(m.apply_preset("Four on the Floor").unwrap(), 4);
        m.set_tempo(128.0);
        assert!((seconds_per_step(m.state().bpm()) - 0.1171875).abs() < 1e-12);
        assert!((m.scheduler().step_clock().seconds_per_step() - 0.1171875).abs() < 1e-12);

        let kick = m.state().track(role(&m, InstrumentRole::Kick)).unwrap();
        for step in 0..16 {
            assert_eq!(kick.pattern().is_set(step), step % 4 == 0, "step {step}");
        }
    }

    #[test]
    fn test_toggle_undo_redo() {
        let mut m = machine();
        let snare = role(&m, InstrumentRole::Snare);
        assert!(m.toggle_step(snare, 4).unwrap());
        assert!(m.state().track(snare).unwrap().pattern().is_set(4));

        assert!(m.undo());
        assert!(!m.state().track(snare).unwrap().pattern().is_set(4));
        assert!(m.redo());
        assert!(m.state().track(snare).unwrap().pattern().is_set(4));

        assert!(m.toggle_step(snare, 16).is_err());
    }

    #[test]
    fn test_set_genre_accepts_display_names() {
        let mut m = machine();
        m.set_genre("cr-78").unwrap();
        assert_eq!(m.state().genre, Genre::Cr78);
        assert!(matches!(m.set_genre("linn"), Err(PulseGridError::UnknownGenre(_))));
        assert_eq!(m.state().genre, Genre::Cr78);
    }

    #[test]
    fn test_automation_by_string_key() {
        let mut m = machine();
        let hat = role(&m, InstrumentRole::ClosedHat);
        m.set_automation(hat, "effects.filter.value", 3, Some(0.8)).unwrap();
        let lane_value = m
            .state()
            .track(hat)
            .unwrap()
            .pattern()
            .automation
            .get(ParamKey::parse("effects.filter.value").unwrap(), 3);
        assert_eq!(lane_value, Some(0.8));
        assert!(m.set_automation(hat, "effects.warp.value", 3, Some(0.1)).is_err());
        m.clear_automation(hat, "effects.filter.value").unwrap();
        assert!(m.state().track(hat).unwrap().pattern().automation.is_empty());
    }

    #[test]
    fn test_decode_failure_leaves_track_untouched() {
        let mut m = machine();
        let clap = role(&m, InstrumentRole::Clap);
        let before_history = m.can_undo();
        assert!(!m.load_sample_bytes(clap, b"garbage", 0.0, 1.0, false).unwrap());
        assert!(m.state().track(clap).unwrap().sample.is_none());
        assert_eq!(m.can_undo(), before_history);
        assert_eq!(statuses(&m), vec![StatusKind::DecodeFailure]);
    }

    #[test]
    fn test_load_sample_assigns_trimmed_buffer() {
        let mut m = machine();
        let clap = role(&m, InstrumentRole::Clap);
        let bytes = wav_bytes(&vec![0.3; 44_100], 22_050, 1, true);
        assert!(m.load_sample_bytes(clap, &bytes, 0.25, 0.75, true).unwrap());
        let sample = m.state().track(clap).unwrap().sample.clone().unwrap();
        assert!(sample.pitch_lock);
        assert!((sample.playback_secs(0.0) - 1.0).abs() < 1e-6);
        assert!((sample.playback_secs(1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scene_switch_restores_verbatim() {
        let mut m = machine();
        let kick = role(&m, InstrumentRole::Kick);
        m.toggle_step(kick, 2).unwrap();
        m.set_tempo(97.0);

        m.select_scene(1).unwrap();
        assert_eq!(m.live_scene(), 1);
        assert_eq!(m.state().bpm(), 120.0);
        assert!(!m.state().track(kick).unwrap().pattern().is_set(2));

        m.select_scene(0).unwrap();
        assert_eq!(m.state().bpm(), 97.0);
        assert!(m.state().track(kick).unwrap().pattern().is_set(2));
        assert!(m.select_scene(9).is_err());
    }

    #[test]
    fn test_undoing_scene_switch_keeps_stored_scenes() {
        let mut m = machine();
        let kick = role(&m, InstrumentRole::Kick);

        m.select_scene(1).unwrap();
        m.toggle_step(kick, 7).unwrap();
        m.set_tempo(150.0);
        m.select_scene(0).unwrap();

        assert!(m.undo());
        assert_eq!(m.live_scene(), 1);
        assert_eq!(m.state().bpm(), 150.0);

        m.select_scene(1).unwrap();
        assert_eq!(m.state().bpm(), 150.0);
        assert!(m.state().track(kick).unwrap().pattern().is_set(7));

        m.select_scene(0).unwrap();
        assert_eq!(m.state().bpm(), 120.0);
        assert!(!m.state().track(kick).unwrap().pattern().is_set(7));
    }

    #[test]
    fn test_redo_scene_switch_restores_live_slot() {
        let mut m = machine();
        m.set_tempo(90.0);
        m.select_scene(2).unwrap();
        assert!(m.undo());
        assert_eq!((m.live_scene(), m.state().bpm()), (0, 90.0));
        assert!(m.redo());
        assert_eq!((m.live_scene(), m.state().bpm()), (2, 120.0));
        assert!(m.select_scene(7).is_err());
        assert!(m.undo());
        assert_eq!(m.live_scene(), 0);
    }

    #[test]
    fn test_remove_track_then_undo() {
        let mut m = machine();
        let tom = role(&m, InstrumentRole::Tom);
        m.remove_track(tom).unwrap();
        assert!(m.state().track(tom).is_none());
        assert!(m.remove_track(tom).is_err());
        assert!(m.undo());
        assert!(m.state().track(tom).is_some());
    }

    #[test]
    fn test_selected_track_edits_produce_preview() {
        let mut m = machine();
        let kick = role(&m, InstrumentRole::Kick);
        m.select_track(kick).unwrap();
        m.edit_track(kick, |t| t.set_pitch(0.5)).unwrap();

        let ready = m
            .events()
            .recv_timeout(Duration::from_secs(5))
            .expect("preview should arrive");
        match ready {
            EngineEvent::PreviewReady { track, samples, .. } => {
                assert_eq!(track, kick);
                assert_eq!(samples.len(), 11_025);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_offline_render_is_audible_stereo() {
        let mut m = machine();
        m.apply_preset("Four on the Floor").unwrap();
        let out = m.render_offline(1.0);
        assert_eq!(out.len(), 2 * 22_050);
        let peak = out.iter().fold(0.0f32, |p, s| p.max(s.abs()));
        assert!(peak > 0.05 && peak <= 1.05, "peak {peak}");

        // The first kick lands at the start offset, not before
        let offset = (m.config().start_offset_secs * 22_050.0) as usize;
        assert!(out[..2 * (offset - 64)].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_macro_effects_pass_through() {
        let mut m = machine();
        assert!(m.effect_params("duck").is_empty());
        let unit = RecordingMacro::default();
        let calls = unit.calls.clone();
        m.install_macro_effects(Box::new(unit));
        m.apply_effects(&["duck".to_string(), "tape".to_string()]);
        m.set_effect_param("duck", 0, 0.4);
        assert_eq!(m.effect_params("duck")[0].value, 0.4);
        assert_eq!(calls.lock().unwrap().as_slice(), ["apply:duck,tape"]);
    }
}
