//! Look-ahead step scheduler
//!
//! `poll` is called from the host's frame loop. It never produces sound
//! itself: it stages strip updates and voices slightly ahead of the audio
//! clock, and holds each step report until the step is audible.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::Sender;
use pulsegrid_core::{
    EngineConfig, PulseGridError, Result, ScheduledStep, SessionState, StepClock, TrackId,
    resolve,
};
use tracing::{debug, info, trace, warn};

use crate::channel_strip::StripParams;
use crate::clock::AudioClock;
use crate::commands::{CommandSink, EngineCommand, EngineEvent, StepReport, TrackInput};
use crate::synthesis::SynthLibrary;

/// Steps between metronome clicks
const BEAT_STEPS: usize = 4;

pub struct Scheduler {
    clock: StepClock,
    audio: Arc<AudioClock>,
    library: Arc<SynthLibrary>,
    events: Sender<EngineEvent>,
    reports: VecDeque<StepReport>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.clock)
            .field("pending_reports", &self.reports.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        config: &EngineConfig,
        audio: Arc<AudioClock>,
        library: Arc<SynthLibrary>,
        events: Sender<EngineEvent>,
    ) -> Self {
        let mut clock = StepClock::new(config.lookahead_secs, config.start_offset_secs);
        clock.set_bpm(config.default_bpm);
        Self {
            clock,
            audio,
            library,
            events,
            reports: VecDeque::new(),
        }
    }

    pub fn step_clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    /// Start from step 0 and sync the buses to the session tempo
    pub fn start(&mut self, state: &SessionState, sink: &mut dyn CommandSink) {
        let now = self.audio.now_secs();
        self.clock.set_bpm(state.bpm());
        self.clock.start(now);
        let bpm = self.clock.bpm();
        sink.push(EngineCommand::Tempo { time: now, bpm });
        info!(bpm, "Transport started");
    }

    /// Stops staging steps. Voices already inside the window still play.
    pub fn stop(&mut self) {
        self.clock.stop();
        info!("Transport stopped");
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.clock.set_recording(recording);
    }

    pub fn is_recording(&self) -> bool {
        self.clock.is_recording()
    }

    /// Applies from the next computed step; staged steps keep their times
    pub fn set_tempo(&mut self, bpm: f64, sink: &mut dyn CommandSink) {
        self.clock.set_bpm(bpm);
        let bpm = self.clock.bpm();
        sink.push(EngineCommand::Tempo { time: self.audio.now_secs(), bpm });
        debug!(bpm, "Tempo changed");
    }

    /// Step a pad hit right now should be recorded into
    pub fn quantize_input(&self) -> usize {
        self.clock.quantize_input(self.audio.now_secs())
    }

    /// Where a pad hit right now gets written, if the transport is recording
    pub fn record_target(&self) -> Option<usize> {
        if self.clock.is_playing() && self.clock.is_recording() {
            Some(self.quantize_input())
        } else {
            None
        }
    }

    pub fn poll(&mut self, state: &SessionState, sink: &mut dyn CommandSink) {
        let now = self.audio.now_secs();

        if self.audio.is_running() && self.clock.is_playing() {
            if state.bpm() != self.clock.bpm() {
                self.set_tempo(state.bpm(), sink);
            }

            let skipped = self.clock.catch_up(now);
            if skipped > 0 {
                warn!(skipped, "Scheduler fell behind the audio clock; skipping steps");
            }

            while let Some(due) = self.clock.next_due(now) {
                self.schedule_step(state, due, sink);
            }
        }

        self.flush_reports(now);
    }

    fn schedule_step(&mut self, state: &SessionState, due: ScheduledStep, sink: &mut dyn CommandSink) {
        let sample_rate = self.audio.sample_rate() as f32;

        if state.metronome && due.step % BEAT_STEPS == 0 {
            let voice = self.library.click(due.step == 0, sample_rate);
            sink.push(EngineCommand::MasterVoice { time: due.time, voice });
        }

        let mut triggered = Vec::new();
        for track in &state.tracks {
            let pattern = track.pattern();
            let params = resolve(track, pattern, due.step);

            // Strip first so the trigger below hears the updated values
            sink.push(EngineCommand::Strip {
                track: track.id,
                time: due.time,
                params: StripParams::from_effective(&params, track.muted),
            });

            if track.muted || !pattern.is_set(due.step) {
                continue;
            }
            let mut input = TrackInput { track: track.id, sample_rate, sink: &mut *sink };
            self.library
                .trigger_track(track, &params, state.genre, due.time, &mut input);
            triggered.push((track.id, params.variation));
        }

        trace!(step = due.step, time = due.time, voices = triggered.len(), "Step staged");
        self.reports.push_back(StepReport { step: due.step, time: due.time, triggered });
    }

    fn flush_reports(&mut self, now: f64) {
        while self.reports.front().is_some_and(|r| r.time <= now) {
            if let Some(report) = self.reports.pop_front() {
                let _ = self.events.send(EngineEvent::StepReached(report));
            }
        }
    }

    /// One-shot outside the grid, e.g. a pad press. Uses the values resolved
    /// for the step currently under the playhead.
    pub fn trigger_now(
        &self,
        state: &SessionState,
        id: TrackId,
        sink: &mut dyn CommandSink,
    ) -> Result<()> {
        let track = state.track(id).ok_or(PulseGridError::TrackNotFound(id.0))?;
        let now = self.audio.now_secs();
        let step = if self.clock.is_playing() { self.quantize_input() } else { 0 };
        let params = resolve(track, track.pattern(), step);

        sink.push(EngineCommand::Strip {
            track: id,
            time: now,
            params: StripParams::from_effective(&params, track.muted),
        });
        if track.muted {
            return Ok(());
        }
        let mut input = TrackInput {
            track: id,
            sample_rate: self.audio.sample_rate() as f32,
            sink,
        };
        self.library.trigger_track(track, &params, state.genre, now, &mut input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_bank::NoiseBank;
    use crossbeam_channel::{Receiver, unbounded};
    use pulsegrid_core::{InstrumentRole, seconds_per_step};

    const SR: u32 = 8_000;

    struct Rig {
        scheduler: Scheduler,
        audio: Arc<AudioClock>,
        events: Receiver<EngineEvent>,
        state: SessionState,
    }

    fn rig() -> Rig {
        let audio = Arc::new(AudioClock::new(SR));
        audio.set_running(true);
        let library = Arc::new(SynthLibrary::new(Arc::new(NoiseBank::new(SR, 0.1))));
        let (tx, events) = unbounded();
        let scheduler = Scheduler::new(&EngineConfig::default(), audio.clone(), library, tx);
        let mut state = SessionState::default();
        state.set_bpm(120.0);
        Rig { scheduler, audio, events, state }
    }

    fn kick(state: &SessionState) -> TrackId {
        state.track_for_role(InstrumentRole::Kick).map(|t| t.id).unwrap()
    }

    fn reached(events: &Receiver<EngineEvent>) -> Vec<StepReport> {
        events
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::StepReached(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Poll every 10 ms of audio time for `secs`
    fn run(rig: &mut Rig, secs: f64, sink: &mut Vec<EngineCommand>) {
        let ticks = (secs * 100.0) as usize;
        for _ in 0..ticks {
            rig.scheduler.poll(&rig.state, sink);
            rig.audio.advance(SR as u64 / 100);
        }
        rig.scheduler.poll(&rig.state, sink);
    }

    #[test]
    fn test_steps_advance_by_one_without_gaps() {
        let mut rig = rig();
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        run(&mut rig, 5.0, &mut sink);

        let reports = reached(&rig.events);
        assert!(reports.len() >= 38, "got {}", reports.len());
        let step_secs = seconds_per_step(120.0);
        for pair in reports.windows(2) {
            assert_eq!(pair[1].step, (pair[0].step + 1) % 16);
            assert!((pair[1].time - pair[0].time - step_secs).abs() < 1e-9);
        }
        assert_eq!(reports[0].step, 0);
    }

    #[test]
    fn test_reports_wait_until_audible() {
        let mut rig = rig();
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        rig.scheduler.poll(&rig.state, &mut sink);
        assert!(!sink.is_empty(), "first step is staged ahead of time");
        assert!(reached(&rig.events).is_empty());

        rig.audio.advance(SR as u64 / 10);
        rig.scheduler.poll(&rig.state, &mut sink);
        let reports = reached(&rig.events);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].time <= rig.audio.now_secs());
    }

    #[test]
    fn test_muted_track_updates_strip_without_voice() {
        let mut rig = rig();
        let id = kick(&rig.state);
        rig.state
            .update_track(id, |t| {
                t.pattern_mut().steps = [true; 16];
                t.muted = true;
            })
            .unwrap();

        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        run(&mut rig, 1.0, &mut sink);

        let strips = sink
            .iter()
            .filter(|c| matches!(c, EngineCommand::Strip { track, params, .. } if *track == id && params.gain == 0.0))
            .count();
        let voices = sink
            .iter()
            .filter(|c| matches!(c, EngineCommand::Voice { track, .. } if *track == id))
            .count();
        assert!(strips >= 8);
        assert_eq!(voices, 0);
    }

    #[test]
    fn test_strip_update_staged_before_voice() {
        let mut rig = rig();
        let id = kick(&rig.state);
        rig.state.update_track(id, |t| t.pattern_mut().steps[0] = true).unwrap();

        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        rig.scheduler.poll(&rig.state, &mut sink);

        let strip = sink
            .iter()
            .position(|c| matches!(c, EngineCommand::Strip { track, .. } if *track == id));
        let voice = sink
            .iter()
            .position(|c| matches!(c, EngineCommand::Voice { track, .. } if *track == id));
        assert!(strip.is_some() && voice.is_some());
        assert!(strip < voice);

        rig.audio.advance(SR as u64);
        rig.scheduler.poll(&rig.state, &mut sink);
        let first = &reached(&rig.events)[0];
        assert_eq!(first.triggered, vec![(id, 0)]);
    }

    #[test]
    fn test_lag_is_bounded_after_stall() {
        let mut rig = rig();
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        rig.scheduler.poll(&rig.state, &mut sink);

        rig.audio.advance(3 * SR as u64);
        rig.scheduler.poll(&rig.state, &mut sink);
        let now = rig.audio.now_secs();
        let clock = rig.scheduler.step_clock();
        assert!(clock.next_event_time() >= now - clock.lookahead());
        assert!(clock.next_event_time() >= now);
    }

    #[test]
    fn test_nothing_staged_until_output_runs() {
        let mut rig = rig();
        rig.audio.set_running(false);
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        rig.scheduler.poll(&rig.state, &mut sink);
        assert!(sink.iter().all(|c| matches!(c, EngineCommand::Tempo { .. })));
    }

    #[test]
    fn test_metronome_clicks_on_beats() {
        let mut rig = rig();
        rig.state.metronome = true;
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        run(&mut rig, 1.9, &mut sink);
        let clicks = sink
            .iter()
            .filter(|c| matches!(c, EngineCommand::MasterVoice { .. }))
            .count();
        assert_eq!(clicks, 4);
    }

    #[test]
    fn test_tempo_change_follows_session() {
        let mut rig = rig();
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.start(&rig.state, &mut sink);
        rig.scheduler.poll(&rig.state, &mut sink);
        rig.state.set_bpm(90.0);
        rig.scheduler.poll(&rig.state, &mut sink);
        assert_eq!(rig.scheduler.step_clock().bpm(), 90.0);
        assert!(sink.iter().any(|c| matches!(c, EngineCommand::Tempo { bpm, .. } if *bpm == 90.0)));
    }

    #[test]
    fn test_pad_hit_quantizes_to_nearest_step() {
        let mut rig = rig();
        let mut sink: Vec<EngineCommand> = Vec::new();
        assert_eq!(rig.scheduler.record_target(), None);

        rig.scheduler.start(&rig.state, &mut sink);
        assert_eq!(rig.scheduler.record_target(), None);
        rig.scheduler.set_recording(true);

        // Step 0 fires at 0.05 s, step 1 at 0.175 s
        rig.scheduler.poll(&rig.state, &mut sink);
        assert_eq!(rig.scheduler.step_clock().step_index(), 1);

        // 10 ms after step 0 went off
        rig.audio.advance(480);
        assert_eq!(rig.scheduler.record_target(), Some(0));

        // 15 ms before step 1
        rig.audio.advance(800);
        assert_eq!(rig.scheduler.record_target(), Some(1));

        rig.scheduler.set_recording(false);
        assert_eq!(rig.scheduler.record_target(), None);
    }

    #[test]
    fn test_trigger_now_fires_outside_grid() {
        let rig = rig();
        let id = kick(&rig.state);
        let mut sink: Vec<EngineCommand> = Vec::new();
        rig.scheduler.trigger_now(&rig.state, id, &mut sink).unwrap();
        assert!(matches!(sink[0], EngineCommand::Strip { .. }));
        assert!(matches!(sink[1], EngineCommand::Voice { track, .. } if track == id));
        assert!(rig.scheduler.trigger_now(&rig.state, TrackId(999), &mut sink).is_err());
    }
}
