//! Transport state and look-ahead step clock
//!
//! Times are seconds on the audio device clock. The clock only decides *when*
//! steps fall; sound is staged by the caller at the returned times.

use serde::{Deserialize, Serialize};

use crate::pattern::STEPS_PER_PATTERN;

pub const MIN_BPM: f64 = 1.0;
pub const MAX_BPM: f64 = 300.0;
pub const DEFAULT_BPM: f64 = 120.0;
/// How far ahead of the audio clock steps are staged
pub const DEFAULT_LOOKAHEAD_SECS: f64 = 0.1;
/// Gap between `start()` and the first step
pub const DEFAULT_START_OFFSET_SECS: f64 = 0.05;

/// Clamp a tempo into the supported range; non-finite input falls back to the default
pub fn sanitize_bpm(bpm: f64) -> f64 {
    if !bpm.is_finite() {
        return DEFAULT_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Duration of one 16th-note step
pub fn seconds_per_step(bpm: f64) -> f64 {
    debug_assert!(bpm.is_finite() && bpm > 0.0, "tempo must be positive, got {bpm}");
    60.0 / sanitize_bpm(bpm) / 4.0
}

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Recording,
}

/// A step staged for a precise time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledStep {
    pub step: usize,
    pub time: f64,
}

/// Look-ahead step clock
#[derive(Debug, Clone)]
pub struct StepClock {
    pub state: TransportState,
    bpm: f64,
    next_event_time: f64,
    step_index: usize,
    lookahead: f64,
    start_offset: f64,
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_SECS, DEFAULT_START_OFFSET_SECS)
    }
}

impl StepClock {
    pub fn new(lookahead: f64, start_offset: f64) -> Self {
        Self {
            state: TransportState::Stopped,
            bpm: DEFAULT_BPM,
            next_event_time: 0.0,
            step_index: 0,
            lookahead: lookahead.max(0.0),
            start_offset: start_offset.max(0.0),
        }
    }

    pub fn start(&mut self, now: f64) {
        if self.state == TransportState::Stopped {
            self.state = TransportState::Playing;
        }
        self.step_index = 0;
        self.next_event_time = now + self.start_offset;
    }

    /// Stop staging new steps; already staged ones still sound
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
    }

    /// Toggle record mode, keeping playback running
    pub fn set_recording(&mut self, recording: bool) {
        self.state = match (self.state, recording) {
            (TransportState::Stopped, _) => TransportState::Stopped,
            (_, true) => TransportState::Recording,
            (_, false) => TransportState::Playing,
        };
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, TransportState::Playing | TransportState::Recording)
    }

    pub fn is_recording(&self) -> bool {
        self.state == TransportState::Recording
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Takes effect from the next computed interval; staged steps keep their times
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = sanitize_bpm(bpm);
    }

    pub fn seconds_per_step(&self) -> f64 {
        seconds_per_step(self.bpm)
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    /// Index of the step that fires at `next_event_time`
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// Pull the clock forward after a stall so it never lags more than one step
    /// behind `now`. Whole steps are skipped so the grid phase is kept.
    /// Returns the number of skipped steps.
    pub fn catch_up(&mut self, now: f64) -> usize {
        let step = self.seconds_per_step();
        let floor = now - step;
        if self.next_event_time >= floor {
            return 0;
        }
        let behind = ((floor - self.next_event_time) / step).ceil() as usize;
        self.next_event_time += behind as f64 * step;
        self.step_index = (self.step_index + behind) % STEPS_PER_PATTERN;
        behind
    }

    /// Next step that falls inside the look-ahead window, advancing the clock
    pub fn next_due(&mut self, now: f64) -> Option<ScheduledStep> {
        if !self.is_playing() || self.next_event_time >= now + self.lookahead {
            return None;
        }
        let due = ScheduledStep { step: self.step_index, time: self.next_event_time };
        self.advance();
        Some(due)
    }

    fn advance(&mut self) {
        self.next_event_time += self.seconds_per_step();
        self.step_index = (self.step_index + 1) % STEPS_PER_PATTERN;
    }

    /// Step a live pad hit at `now` should be written to: whichever of the step
    /// about to fire or the one before it is closer in time.
    pub fn quantize_input(&self, now: f64) -> usize {
        quantize_step(self.step_index, self.next_event_time - now, self.seconds_per_step())
    }
}

/// `(step_index - round(until_next / step_secs) + 16) mod 16`
pub fn quantize_step(step_index: usize, until_next: f64, step_secs: f64) -> usize {
    let steps_away = (until_next / step_secs).round() as i64;
    (step_index as i64 - steps_away).rem_euclid(STEPS_PER_PATTERN as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_per_step() {
        assert!((seconds_per_step(128.0) - 0.1171875).abs() < 1e-12);
        for bpm in 1..=234 {
            let bpm = bpm as f64;
            assert!((seconds_per_step(bpm) - 60.0 / bpm / 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sanitize_bpm() {
        assert_eq!(sanitize_bpm(f64::NAN), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(-5.0), MIN_BPM);
        assert_eq!(sanitize_bpm(1000.0), MAX_BPM);
        assert_eq!(sanitize_bpm(90.0), 90.0);
    }

    #[test]
    fn test_steps_advance_without_skips_or_repeats() {
        let mut clock = StepClock::default();
        clock.set_bpm(174.0);
        clock.start(0.0);

        let mut now = 0.0;
        let mut expected = 0;
        let mut fired = 0;
        while fired < 200 {
            while let Some(due) = clock.next_due(now) {
                assert_eq!(due.step, expected);
                assert!(due.time < now + clock.lookahead());
                expected = (expected + 1) % STEPS_PER_PATTERN;
                fired += 1;
            }
            now += 1.0 / 60.0;
        }
    }

    #[test]
    fn test_tempo_change_applies_to_next_interval() {
        let mut clock = StepClock::default();
        clock.set_bpm(120.0);
        clock.start(0.0);
        let first = clock.next_due(0.0).unwrap();
        assert!((first.time - DEFAULT_START_OFFSET_SECS).abs() < 1e-12);
        clock.set_bpm(60.0);
        let second = clock.next_due(1.0).unwrap();
        assert!((second.time - first.time - 0.125).abs() < 1e-12);
        let third = clock.next_due(1.0).unwrap();
        assert!((third.time - second.time - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_catch_up_bounds_lag() {
        let mut clock = StepClock::default();
        clock.set_bpm(120.0);
        clock.start(0.0);
        // A 3 second stall
        let now = 3.0;
        let skipped = clock.catch_up(now);
        assert!(skipped > 0);
        assert!(clock.next_event_time() >= now - clock.seconds_per_step());
        assert!(clock.next_event_time() < now + clock.seconds_per_step());
        assert_eq!(clock.step_index(), skipped % STEPS_PER_PATTERN);
        assert_eq!(clock.catch_up(now), 0);
    }

    #[test]
    fn test_stop_halts_staging() {
        let mut clock = StepClock::default();
        clock.start(0.0);
        clock.stop();
        assert!(clock.next_due(10.0).is_none());
    }

    #[test]
    fn test_quantize_step() {
        assert_eq!(quantize_step(5, 0.03, 0.117), 5);
        assert_eq!(quantize_step(5, 0.09, 0.117), 4);
        assert_eq!(quantize_step(0, 0.1, 0.117), 15);
    }

    #[test]
    fn test_quantize_input_against_clock() {
        let mut clock = StepClock::new(0.1, 0.05);
        clock.set_bpm(120.0);
        clock.start(0.0);
        let first = clock.next_due(0.0).unwrap();
        assert_eq!((first.step, first.time), (0, 0.05));
        assert!(clock.next_due(0.0).is_none());

        // Just after step 0 fired, with step 1 due at 0.175
        assert_eq!(clock.quantize_input(0.06), 0);
        assert_eq!(clock.quantize_input(0.12), 0);
        assert_eq!(clock.quantize_input(0.16), 1);

        // Before the first step fires the hit belongs to the end of the bar
        let mut fresh = StepClock::new(0.1, 0.1);
        fresh.set_bpm(120.0);
        fresh.start(0.0);
        assert_eq!(fresh.quantize_input(0.0), 15);
    }

    #[test]
    fn test_record_mode_requires_playback() {
        let mut clock = StepClock::default();
        clock.set_recording(true);
        assert!(!clock.is_recording());
        clock.start(0.0);
        clock.set_recording(true);
        assert!(clock.is_recording() && clock.is_playing());
        clock.set_recording(false);
        assert_eq!(clock.state, TransportState::Playing);
    }
}
