//! Synthesis primitives and the one-shot `Voice` they build
//!
//! A recipe describes a voice as a stack of `Layer`s (source, envelope,
//! optional filter and shaper). `Voice::with` turns each description into
//! running state for a fixed sample rate. A voice knows its own length and
//! stops itself once every layer has decayed.

use std::f32::consts::TAU;
use std::sync::Arc;

use super::filter::{FilterMode, FilterSpec, VoiceFilter};
use super::sample::{SamplePlayer, SampleRegion};
use crate::noise_bank::Curve;

/// Envelope floor treated as silence (-60 dB)
const SILENCE: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Waveform {
    /// Sample at normalized phase 0..1
    pub fn at(self, phase: f32) -> f32 {
        let p = phase - phase.floor();
        match self {
            Self::Sine => (p * TAU).sin(),
            Self::Square => {
                if p < 0.5 { 1.0 } else { -1.0 }
            }
            Self::Saw => 2.0 * p - 1.0,
            Self::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// `time` is the time constant of an exponential approach
    Exponential,
    /// `time` is the glide duration
    Linear,
}

/// Frequency trajectory from `start` towards `target`
#[derive(Debug, Clone, Copy)]
pub struct FreqEnv {
    pub start: f32,
    pub target: f32,
    pub time: f32,
    pub curve: Sweep,
}

impl FreqEnv {
    pub fn fixed(freq: f32) -> Self {
        Self { start: freq, target: freq, time: 0.0, curve: Sweep::Exponential }
    }

    pub fn exp(start: f32, target: f32, time: f32) -> Self {
        Self { start, target, time, curve: Sweep::Exponential }
    }

    pub fn linear(start: f32, target: f32, time: f32) -> Self {
        Self { start, target, time, curve: Sweep::Linear }
    }

    pub fn is_fixed(&self) -> bool {
        self.start == self.target || self.time <= 0.0
    }

    /// Same trajectory with both ends moved by `offset` Hz
    pub fn shifted(self, offset: f32) -> Self {
        Self { start: self.start + offset, target: self.target + offset, ..self }
    }

    /// Same trajectory with both ends multiplied by `ratio`
    pub fn scaled(self, ratio: f32) -> Self {
        Self { start: self.start * ratio, target: self.target * ratio, ..self }
    }
}

pub(crate) struct SweepState {
    current: f32,
    target: f32,
    coef: f32,
    step: f32,
    remaining: usize,
    curve: Sweep,
}

impl SweepState {
    pub(crate) fn new(env: &FreqEnv, sample_rate: f32) -> Self {
        let frames = (env.time.max(0.0) * sample_rate).max(1.0);
        Self {
            current: env.start,
            target: env.target,
            coef: (-1.0 / frames).exp(),
            step: (env.target - env.start) / frames,
            remaining: frames as usize,
            curve: if env.is_fixed() { Sweep::Linear } else { env.curve },
        }
    }

    pub(crate) fn next(&mut self) -> f32 {
        let out = self.current;
        match self.curve {
            Sweep::Exponential => {
                self.current = self.target + (self.current - self.target) * self.coef;
            }
            Sweep::Linear => {
                if self.remaining > 0 {
                    self.remaining -= 1;
                    self.current += self.step;
                } else {
                    self.current = self.target;
                }
            }
        }
        out
    }
}

/// Amplitude envelope: linear attack, flat hold, exponential decay
#[derive(Debug, Clone, Copy)]
pub struct AmpEnv {
    pub attack: f32,
    pub hold: f32,
    /// Time constant of the decay; infinite means no decay
    pub decay: f32,
}

impl AmpEnv {
    pub fn perc(decay: f32) -> Self {
        Self { attack: 0.0, hold: 0.0, decay }
    }

    pub fn new(attack: f32, hold: f32, decay: f32) -> Self {
        Self { attack, hold, decay }
    }

    /// Unity gain for the lifetime of the source
    pub fn flat() -> Self {
        Self { attack: 0.0, hold: 0.0, decay: f32::INFINITY }
    }

    /// Frames until the envelope falls below -60 dB
    pub fn frames(&self, sample_rate: f32) -> usize {
        if !self.decay.is_finite() {
            return usize::MAX;
        }
        let secs = self.attack + self.hold + self.decay * (1.0 / SILENCE).ln();
        (secs * sample_rate).ceil() as usize
    }
}

struct EnvState {
    attack: usize,
    hold_end: usize,
    coef: f32,
    value: f32,
    age: usize,
}

impl EnvState {
    fn new(env: &AmpEnv, sample_rate: f32) -> Self {
        let attack = (env.attack.max(0.0) * sample_rate) as usize;
        let hold = (env.hold.max(0.0) * sample_rate) as usize;
        let coef = if env.decay.is_finite() && env.decay > 0.0 {
            (-1.0 / (env.decay * sample_rate)).exp()
        } else if env.decay.is_finite() {
            0.0
        } else {
            1.0
        };
        Self { attack, hold_end: attack + hold, coef, value: 1.0, age: 0 }
    }

    fn next(&mut self) -> f32 {
        let age = self.age;
        self.age += 1;
        if age < self.attack {
            return age as f32 / self.attack as f32;
        }
        if age < self.hold_end {
            return 1.0;
        }
        let out = self.value;
        self.value *= self.coef;
        out
    }
}

#[derive(Debug, Clone, Copy)]
struct Vibrato {
    rate: f32,
    semitones: f32,
}

#[derive(Debug, Clone, Copy)]
struct Fm {
    ratio: f32,
    index: f32,
}

#[derive(Debug, Clone)]
enum Source {
    Osc {
        waveform: Waveform,
        freq: FreqEnv,
        vibrato: Option<Vibrato>,
        fm: Option<Fm>,
    },
    Noise {
        buffer: Arc<[f32]>,
        offset: usize,
    },
    /// Summed square oscillators at inharmonic ratios
    Metal {
        freqs: Vec<f32>,
    },
    Sample(SampleRegion),
}

/// Description of one sound layer of a voice
#[derive(Debug, Clone)]
pub struct Layer {
    source: Source,
    env: AmpEnv,
    level: f32,
    delay: f32,
    filter: Option<FilterSpec>,
    drive: Option<(Curve, f32)>,
}

impl Layer {
    fn from_source(source: Source) -> Self {
        Self {
            source,
            env: AmpEnv::perc(0.2),
            level: 1.0,
            delay: 0.0,
            filter: None,
            drive: None,
        }
    }

    pub fn osc(waveform: Waveform, freq: FreqEnv) -> Self {
        Self::from_source(Source::Osc { waveform, freq, vibrato: None, fm: None })
    }

    /// Read from a shared noise buffer starting at `offset`
    pub fn noise(buffer: Arc<[f32]>, offset: usize) -> Self {
        Self::from_source(Source::Noise { buffer, offset })
    }

    pub fn metal(freqs: &[f32]) -> Self {
        Self::from_source(Source::Metal { freqs: freqs.to_vec() })
    }

    /// Sample playback; the region sets the length, so the envelope is flat
    pub fn sample(region: SampleRegion) -> Self {
        Self { env: AmpEnv::flat(), ..Self::from_source(Source::Sample(region)) }
    }

    pub fn env(mut self, env: AmpEnv) -> Self {
        self.env = env;
        self
    }

    pub fn level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    /// Onset delay in seconds relative to the voice start
    pub fn delay(mut self, secs: f32) -> Self {
        self.delay = secs.max(0.0);
        self
    }

    pub fn filter(mut self, mode: FilterMode, cutoff: f32, q: f32) -> Self {
        self.filter = Some(FilterSpec { mode, cutoff: FreqEnv::fixed(cutoff), q });
        self
    }

    pub fn sweep_filter(mut self, mode: FilterMode, cutoff: FreqEnv, q: f32) -> Self {
        self.filter = Some(FilterSpec { mode, cutoff, q });
        self
    }

    /// Push the layer through a shaping curve with the given pre-gain
    pub fn drive(mut self, curve: &Curve, gain: f32) -> Self {
        self.drive = Some((curve.clone(), gain));
        self
    }

    pub fn vibrato(mut self, rate: f32, semitones: f32) -> Self {
        if let Source::Osc { vibrato, .. } = &mut self.source {
            *vibrato = Some(Vibrato { rate, semitones });
        }
        self
    }

    /// Phase-modulate by a sine at `ratio` times the carrier frequency
    pub fn fm(mut self, ratio: f32, index: f32) -> Self {
        if let Source::Osc { fm, .. } = &mut self.source {
            *fm = Some(Fm { ratio, index });
        }
        self
    }
}

enum SourceState {
    Osc {
        waveform: Waveform,
        freq: SweepState,
        phase: f32,
        vibrato: Option<(Vibrato, f32)>,
        fm: Option<(Fm, f32)>,
    },
    Noise {
        buffer: Arc<[f32]>,
        pos: usize,
    },
    Metal {
        increments: Vec<f32>,
        phases: Vec<f32>,
    },
    Sample(SamplePlayer),
}

impl SourceState {
    fn new(source: Source, sample_rate: f32) -> Self {
        match source {
            Source::Osc { waveform, freq, vibrato, fm } => Self::Osc {
                waveform,
                freq: SweepState::new(&freq, sample_rate),
                phase: 0.0,
                vibrato: vibrato.map(|v| (v, 0.0)),
                fm: fm.map(|f| (f, 0.0)),
            },
            Source::Noise { buffer, offset } => {
                let pos = if buffer.is_empty() { 0 } else { offset % buffer.len() };
                Self::Noise { buffer, pos }
            }
            Source::Metal { freqs } => Self::Metal {
                phases: freqs.iter().enumerate().map(|(i, _)| i as f32 * 0.13).collect(),
                increments: freqs.iter().map(|f| f / sample_rate).collect(),
            },
            Source::Sample(region) => Self::Sample(SamplePlayer::new(region)),
        }
    }

    fn next(&mut self, dt: f32) -> f32 {
        match self {
            Self::Osc { waveform, freq, phase, vibrato, fm } => {
                let mut hz = freq.next();
                if let Some((v, vphase)) = vibrato {
                    hz *= (v.semitones / 12.0 * (*vphase * TAU).sin()).exp2();
                    *vphase = (*vphase + v.rate * dt).fract();
                }
                let offset = match fm {
                    Some((f, mphase)) => {
                        let m = (*mphase * TAU).sin() * f.index;
                        *mphase = (*mphase + hz * f.ratio * dt).fract();
                        m
                    }
                    None => 0.0,
                };
                let out = waveform.at(*phase + offset);
                *phase = (*phase + hz * dt).fract();
                out
            }
            Self::Noise { buffer, pos } => {
                if buffer.is_empty() {
                    return 0.0;
                }
                let out = buffer[*pos];
                *pos = (*pos + 1) % buffer.len();
                out
            }
            Self::Metal { increments, phases } => {
                let mut sum = 0.0;
                for (phase, inc) in phases.iter_mut().zip(increments.iter()) {
                    sum += Waveform::Square.at(*phase);
                    *phase = (*phase + inc).fract();
                }
                sum / increments.len().max(1) as f32
            }
            Self::Sample(player) => player.next(),
        }
    }
}

struct ActiveLayer {
    source: SourceState,
    env: EnvState,
    level: f32,
    delay: usize,
    end: usize,
    filter: Option<VoiceFilter>,
    drive: Option<(Curve, f32)>,
}

/// A one-shot synthesis graph
pub struct Voice {
    sample_rate: f32,
    gain: f32,
    layers: Vec<ActiveLayer>,
    age: usize,
    length: usize,
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("sample_rate", &self.sample_rate)
            .field("layers", &self.layers.len())
            .field("age", &self.age)
            .field("length", &self.length)
            .finish()
    }
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate, gain: 1.0, layers: Vec::new(), age: 0, length: 0 }
    }

    /// Add a layer (builder style)
    pub fn with(mut self, layer: Layer) -> Self {
        self.add(layer);
        self
    }

    pub fn add(&mut self, layer: Layer) {
        let sr = self.sample_rate;
        let delay = (layer.delay * sr).round() as usize;
        let body = match &layer.source {
            Source::Sample(region) => region.frames(),
            _ => layer.env.frames(sr),
        };
        let end = delay.saturating_add(body);
        self.length = self.length.max(end);
        self.layers.push(ActiveLayer {
            filter: layer.filter.as_ref().map(|spec| VoiceFilter::new(spec, sr)),
            source: SourceState::new(layer.source, sr),
            env: EnvState::new(&layer.env, sr),
            level: layer.level,
            delay,
            end,
            drive: layer.drive,
        });
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Total length in frames
    pub fn len_frames(&self) -> usize {
        self.length
    }

    pub fn duration_secs(&self) -> f64 {
        self.length as f64 / self.sample_rate as f64
    }

    pub fn is_finished(&self) -> bool {
        self.age >= self.length
    }

    /// Mix the next `out.len()` frames into `out`. Returns false once the
    /// voice has stopped.
    pub fn render_add(&mut self, out: &mut [f32]) -> bool {
        if self.is_finished() {
            return false;
        }
        let dt = 1.0 / self.sample_rate;
        let start = self.age;
        let frames = out.len().min(self.length - start);

        for layer in &mut self.layers {
            for (i, slot) in out[..frames].iter_mut().enumerate() {
                let t = start + i;
                if t < layer.delay || t >= layer.end {
                    continue;
                }
                let mut s = layer.source.next(dt);
                if let Some(filter) = &mut layer.filter {
                    s = filter.tick(s);
                }
                if let Some((curve, gain)) = &layer.drive {
                    s = curve.shape(s * gain);
                }
                *slot += s * layer.env.next() * layer.level * self.gain;
            }
        }

        self.age += out.len();
        !self.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_all(mut voice: Voice) -> Vec<f32> {
        let mut out = vec![0.0; voice.len_frames() + 64];
        let mut pos = 0;
        while pos < out.len() {
            let end = (pos + 64).min(out.len());
            voice.render_add(&mut out[pos..end]);
            pos = end;
        }
        out
    }

    #[test]
    fn test_voice_stops_after_decay() {
        let sr = 8_000.0;
        let voice = Voice::new(sr).with(Layer::osc(Waveform::Sine, FreqEnv::fixed(200.0)).env(AmpEnv::perc(0.01)));
        let expected = AmpEnv::perc(0.01).frames(sr);
        assert_eq!(voice.len_frames(), expected);

        let out = render_all(voice);
        assert!(out[..expected].iter().any(|s| s.abs() > 0.5));
        assert!(out[expected..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_layer_delay_extends_voice() {
        let sr = 8_000.0;
        let voice = Voice::new(sr)
            .with(Layer::osc(Waveform::Square, FreqEnv::fixed(100.0)).env(AmpEnv::perc(0.01)).delay(0.1));
        assert_eq!(voice.len_frames(), 800 + AmpEnv::perc(0.01).frames(sr));
        let out = render_all(voice);
        assert!(out[..800].iter().all(|s| *s == 0.0));
        assert!(out[800..900].iter().any(|s| s.abs() > 0.5));
    }

    #[test]
    fn test_exponential_sweep_approaches_target() {
        let env = FreqEnv::exp(400.0, 50.0, 0.01);
        let mut sweep = SweepState::new(&env, 1_000.0);
        assert_eq!(sweep.next(), 400.0);
        for _ in 0..200 {
            sweep.next();
        }
        assert!((sweep.next() - 50.0).abs() < 0.1);
    }

    #[test]
    fn test_linear_glide_lands_on_target() {
        let env = FreqEnv::linear(100.0, 200.0, 0.1);
        let mut sweep = SweepState::new(&env, 1_000.0);
        let values: Vec<f32> = (0..150).map(|_| sweep.next()).collect();
        assert!((values[50] - 150.0).abs() < 1.0);
        assert_eq!(values[149], 200.0);
    }

    #[test]
    fn test_waveforms_span_unit_range() {
        for waveform in [Waveform::Sine, Waveform::Square, Waveform::Saw, Waveform::Triangle] {
            let (lo, hi) = (0..100)
                .map(|i| waveform.at(i as f32 / 100.0))
                .fold((f32::MAX, f32::MIN), |(lo, hi), s| (lo.min(s), hi.max(s)));
            assert!(lo >= -1.0 && hi <= 1.0, "{waveform:?}");
            assert!(hi - lo > 1.9, "{waveform:?}");
        }
    }
}
