//! Per-track channel strip
//!
//! Fixed topology: saturation → gate → ring → lowpass → sends → pan/gain.
//! Nothing is ever rewired; every stage is always in the path and switched by
//! ramping its parameters.

mod smoothed;

pub use smoothed::SmoothedParam;

use fundsp::hacker::*;
use pulsegrid_core::{EffectSlot, EffectiveParams, pan_gains};

use crate::noise_bank::Curve;

/// Square gate LFO range for the stutter slot
pub const GATE_RATE_HZ: (f32, f32) = (3.0, 24.0);
/// Sawtooth ring LFO range for the glitch slot
pub const RING_RATE_HZ: (f32, f32) = (20.0, 800.0);
/// Cutoff the filter rests at while inactive
pub const FILTER_OPEN_HZ: f32 = 20_000.0;
pub const FILTER_IDLE_Q: f32 = 0.707;
pub const FILTER_ACTIVE_Q: f32 = 4.0;

const FILTER_UPDATE: usize = 16;

/// Resonant filter cutoff for an effect value: `20 * 1000^value`
pub fn filter_cutoff(value: f32) -> f32 {
    20.0 * 1000.0_f32.powf(value.clamp(0.0, 1.0))
}

/// Linear map of a 0..1 value into an LFO range
pub fn lfo_rate(value: f32, (min, max): (f32, f32)) -> f32 {
    min + (max - min) * value.clamp(0.0, 1.0)
}

/// Target settings for one strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripParams {
    /// Linear output gain; zero while muted
    pub gain: f32,
    pub pan: f32,
    /// Effect value while the filter slot is active
    pub filter: Option<f32>,
    /// Saturation wet mix
    pub crush: f32,
    pub gate: Option<f32>,
    pub ring: Option<f32>,
    pub reverb_send: f32,
    pub delay_send: f32,
}

impl Default for StripParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pan: 0.0,
            filter: None,
            crush: 0.0,
            gate: None,
            ring: None,
            reverb_send: 0.0,
            delay_send: 0.0,
        }
    }
}

impl StripParams {
    pub fn from_effective(params: &EffectiveParams, muted: bool) -> Self {
        let fx = &params.effects;
        let active = |slot| fx.is_active(slot).then(|| fx.value(slot));
        Self {
            gain: if muted { 0.0 } else { params.volume },
            pan: params.pan,
            filter: active(EffectSlot::Filter),
            crush: fx.amount(EffectSlot::Bitcrush),
            gate: active(EffectSlot::Stutter),
            ring: active(EffectSlot::Glitch),
            reverb_send: fx.amount(EffectSlot::Reverb),
            delay_send: fx.amount(EffectSlot::Delay),
        }
    }
}

/// Low-frequency modulator that is only clocked while its stage is in use
#[derive(Debug, Clone, Copy)]
struct Lfo {
    phase: f32,
    enabled: bool,
}

impl Lfo {
    fn new() -> Self {
        Self { phase: 0.0, enabled: false }
    }

    fn advance(&mut self, rate: f32, dt: f32) -> f32 {
        let out = self.phase;
        self.phase = (self.phase + rate * dt).fract();
        out
    }
}

pub struct ChannelStrip {
    sample_rate: f32,
    max_cutoff: f32,
    crush_curve: Curve,
    gain: SmoothedParam,
    left: SmoothedParam,
    right: SmoothedParam,
    crush: SmoothedParam,
    gate_depth: SmoothedParam,
    gate_rate: SmoothedParam,
    ring_depth: SmoothedParam,
    ring_rate: SmoothedParam,
    cutoff: SmoothedParam,
    q: SmoothedParam,
    reverb_send: SmoothedParam,
    delay_send: SmoothedParam,
    gate: Lfo,
    ring: Lfo,
    filter: An<FixedSvf<f64, LowpassMode<f64>>>,
    filter_countdown: usize,
}

impl std::fmt::Debug for ChannelStrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStrip")
            .field("gain", &self.gain.value())
            .field("crush", &self.crush.value())
            .field("cutoff", &self.cutoff.value())
            .finish()
    }
}

impl ChannelStrip {
    pub fn new(sample_rate: f32, ramp_secs: f32, crush_curve: Curve) -> Self {
        let max_cutoff = sample_rate * 0.45;
        let open = FILTER_OPEN_HZ.min(max_cutoff);
        let (l, r) = pan_gains(0.0);
        let param = |v: f32| SmoothedParam::new(v, ramp_secs, sample_rate);

        let mut filter = lowpass_hz(open, FILTER_IDLE_Q);
        filter.set_sample_rate(sample_rate as f64);

        Self {
            sample_rate,
            max_cutoff,
            crush_curve,
            gain: param(1.0),
            left: param(l),
            right: param(r),
            crush: param(0.0),
            gate_depth: param(0.0),
            gate_rate: param(GATE_RATE_HZ.0),
            ring_depth: param(0.0),
            ring_rate: param(RING_RATE_HZ.0),
            cutoff: param(open),
            q: param(FILTER_IDLE_Q),
            reverb_send: param(0.0),
            delay_send: param(0.0),
            gate: Lfo::new(),
            ring: Lfo::new(),
            filter,
            filter_countdown: 0,
        }
    }

    /// Retarget every stage. Values glide; nothing is assigned directly.
    pub fn apply(&mut self, params: &StripParams) {
        self.gain.set_target(params.gain.max(0.0));
        let (l, r) = pan_gains(params.pan);
        self.left.set_target(l);
        self.right.set_target(r);
        self.crush.set_target(params.crush.clamp(0.0, 1.0));

        match params.filter {
            Some(value) => {
                self.cutoff.set_target(filter_cutoff(value).min(self.max_cutoff));
                self.q.set_target(FILTER_ACTIVE_Q);
            }
            None => {
                self.cutoff.set_target(FILTER_OPEN_HZ.min(self.max_cutoff));
                self.q.set_target(FILTER_IDLE_Q);
            }
        }

        match params.gate {
            Some(value) => {
                self.gate.enabled = true;
                self.gate_depth.set_target(1.0);
                self.gate_rate.set_target(lfo_rate(value, GATE_RATE_HZ));
            }
            None => {
                self.gate.enabled = false;
                self.gate_depth.set_target(0.0);
            }
        }

        match params.ring {
            Some(value) => {
                self.ring.enabled = true;
                self.ring_depth.set_target(1.0);
                self.ring_rate.set_target(lfo_rate(value, RING_RATE_HZ));
            }
            None => {
                self.ring.enabled = false;
                self.ring_depth.set_target(0.0);
            }
        }

        self.reverb_send.set_target(params.reverb_send.clamp(0.0, 1.0));
        self.delay_send.set_target(params.delay_send.clamp(0.0, 1.0));
    }

    pub fn gain(&self) -> f32 {
        self.gain.value()
    }

    /// Current saturation wet mix
    pub fn crush_mix(&self) -> f32 {
        self.crush.value()
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff.value()
    }

    pub fn sends(&self) -> (f32, f32) {
        (self.reverb_send.value(), self.delay_send.value())
    }

    /// Wet/dry crossfade into the crush curve; a zero mix returns `x` untouched
    #[inline]
    fn saturate(&self, x: f32, mix: f32) -> f32 {
        x * (1.0 - mix) + self.crush_curve.shape(x) * mix
    }

    fn update_filter(&mut self, cutoff: f32, q: f32) {
        if self.filter_countdown == 0 {
            self.filter.set(Setting::center_q(cutoff, q));
            self.filter_countdown = FILTER_UPDATE;
        }
        self.filter_countdown -= 1;
    }

    /// Process `input` and add the result into the stereo and send buses
    pub fn process(
        &mut self,
        input: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
        reverb: &mut [f32],
        delay: &mut [f32],
    ) {
        let dt = 1.0 / self.sample_rate;
        for (i, &x) in input.iter().enumerate() {
            let mix = self.crush.next();
            let mut y = self.saturate(x, mix);

            let depth = self.gate_depth.next();
            let rate = self.gate_rate.next();
            if self.gate.enabled || depth > 0.0 {
                let high = if self.gate.advance(rate, dt) < 0.5 { 1.0 } else { 0.0 };
                y *= 1.0 - depth * (1.0 - high);
            } else {
                self.gate.phase = 0.0;
            }

            let depth = self.ring_depth.next();
            let rate = self.ring_rate.next();
            if self.ring.enabled || depth > 0.0 {
                let saw = 2.0 * self.ring.advance(rate, dt) - 1.0;
                y *= 1.0 - depth + depth * saw;
            } else {
                self.ring.phase = 0.0;
            }

            let cutoff = self.cutoff.next();
            let q = self.q.next();
            self.update_filter(cutoff, q);
            y = self.filter.tick(&Frame::from([y]))[0];

            let g = self.gain.next();
            let post = y * g;
            reverb[i] += post * self.reverb_send.next();
            delay[i] += post * self.delay_send.next();
            out_l[i] += post * self.left.next();
            out_r[i] += post * self.right.next();
        }
    }
}
