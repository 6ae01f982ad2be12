//! Per-voice state-variable filters (fundsp)

use fundsp::hacker::*;

use super::voice::{FreqEnv, SweepState};

/// Samples between coefficient updates while a cutoff is sweeping
const SWEEP_UPDATE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Declarative filter settings carried by a layer
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub mode: FilterMode,
    pub cutoff: FreqEnv,
    pub q: f32,
}

enum Node {
    Lowpass(An<FixedSvf<f64, LowpassMode<f64>>>),
    Highpass(An<FixedSvf<f64, HighpassMode<f64>>>),
    Bandpass(An<FixedSvf<f64, BandpassMode<f64>>>),
}

pub(crate) struct VoiceFilter {
    node: Node,
    sweep: Option<SweepState>,
    q: f32,
    nyquist_guard: f32,
    countdown: usize,
}

impl VoiceFilter {
    pub(crate) fn new(spec: &FilterSpec, sample_rate: f32) -> Self {
        let nyquist_guard = sample_rate * 0.45;
        let cutoff = spec.cutoff.start.clamp(10.0, nyquist_guard);
        let mut node = match spec.mode {
            FilterMode::Lowpass => Node::Lowpass(lowpass_hz(cutoff, spec.q)),
            FilterMode::Highpass => Node::Highpass(highpass_hz(cutoff, spec.q)),
            FilterMode::Bandpass => Node::Bandpass(bandpass_hz(cutoff, spec.q)),
        };
        match &mut node {
            Node::Lowpass(f) => f.set_sample_rate(sample_rate as f64),
            Node::Highpass(f) => f.set_sample_rate(sample_rate as f64),
            Node::Bandpass(f) => f.set_sample_rate(sample_rate as f64),
        }
        let sweep = (!spec.cutoff.is_fixed()).then(|| SweepState::new(&spec.cutoff, sample_rate));
        Self { node, sweep, q: spec.q, nyquist_guard, countdown: 0 }
    }

    pub(crate) fn tick(&mut self, x: f32) -> f32 {
        if let Some(sweep) = &mut self.sweep {
            let cutoff = sweep.next().clamp(10.0, self.nyquist_guard);
            if self.countdown == 0 {
                let setting = Setting::center_q(cutoff, self.q);
                match &mut self.node {
                    Node::Lowpass(f) => f.set(setting),
                    Node::Highpass(f) => f.set(setting),
                    Node::Bandpass(f) => f.set(setting),
                }
                self.countdown = SWEEP_UPDATE;
            }
            self.countdown -= 1;
        }

        let input = Frame::from([x]);
        let output = match &mut self.node {
            Node::Lowpass(f) => f.tick(&input),
            Node::Highpass(f) => f.tick(&input),
            Node::Bandpass(f) => f.tick(&input),
        };
        output[0]
    }
}
