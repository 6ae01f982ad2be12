//! Shared effect returns and the master output stage

use std::sync::Arc;

use fundsp::hacker::*;
use pulsegrid_core::{DelayConfig, MasterConfig, ReverbConfig};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::channel_strip::SmoothedParam;

/// Convolution block size in samples
pub const REVERB_BLOCK: usize = 512;
/// Delay length in beats
pub const DELAY_BEATS: f64 = 0.75;
pub const MAX_DELAY_SECS: f32 = 2.0;

const DELAY_GLIDE_SECS: f32 = 0.05;

/// Uniformly partitioned overlap-save convolution against the bank impulse.
///
/// Output lags input by one block.
pub struct ReverbBus {
    return_gain: f32,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    partitions: Vec<Vec<Complex<f32>>>,
    /// Spectra of recent input frames, newest at `head`
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    frame: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
    work: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for ReverbBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverbBus")
            .field("partitions", &self.partitions.len())
            .field("return_gain", &self.return_gain)
            .finish()
    }
}

impl ReverbBus {
    pub fn new(impulse: &[f32], config: &ReverbConfig) -> Self {
        let block = REVERB_BLOCK;
        let size = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = Ord::max(
            forward.get_inplace_scratch_len(),
            inverse.get_inplace_scratch_len(),
        );
        let mut scratch = vec![Complex::default(); scratch_len];

        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(block)
            .map(|chunk| {
                let mut spectrum = vec![Complex::default(); size];
                for (bin, &s) in spectrum.iter_mut().zip(chunk) {
                    *bin = Complex::new(s, 0.0);
                }
                forward.process_with_scratch(&mut spectrum, &mut scratch);
                spectrum
            })
            .collect();
        let count = Ord::max(partitions.len(), 1);

        Self {
            return_gain: config.return_gain,
            forward,
            inverse,
            partitions,
            history: vec![vec![Complex::default(); size]; count],
            head: 0,
            frame: vec![0.0; size],
            output: vec![0.0; block],
            pos: 0,
            work: vec![Complex::default(); size],
            acc: vec![Complex::default(); size],
            scratch,
        }
    }

    pub fn set_return_gain(&mut self, gain: f32) {
        self.return_gain = gain.max(0.0);
    }

    fn convolve_block(&mut self) {
        let block = REVERB_BLOCK;
        let size = block * 2;

        for (bin, &s) in self.work.iter_mut().zip(&self.frame) {
            *bin = Complex::new(s, 0.0);
        }
        self.forward.process_with_scratch(&mut self.work, &mut self.scratch);

        let count = self.history.len();
        self.head = (self.head + 1) % count;
        self.history[self.head].copy_from_slice(&self.work);

        self.acc.fill(Complex::default());
        for (k, partition) in self.partitions.iter().enumerate() {
            let spectrum = &self.history[(self.head + count - k) % count];
            for ((acc, x), h) in self.acc.iter_mut().zip(spectrum).zip(partition) {
                *acc += x * h;
            }
        }
        self.inverse.process_with_scratch(&mut self.acc, &mut self.scratch);

        let scale = 1.0 / size as f32;
        for (out, bin) in self.output.iter_mut().zip(&self.acc[block..]) {
            *out = bin.re * scale;
        }

        // Slide: the current block becomes the next frame's first half
        self.frame.copy_within(block.., 0);
    }

    /// Convolve the send bus and add the return into both outputs
    pub fn process(&mut self, send: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        for (i, &x) in send.iter().enumerate() {
            let y = self.output[self.pos] * self.return_gain;
            out_l[i] += y;
            out_r[i] += y;

            self.frame[REVERB_BLOCK + self.pos] = x;
            self.pos += 1;
            if self.pos == REVERB_BLOCK {
                self.pos = 0;
                self.convolve_block();
            }
        }
    }
}

/// Tempo-synced feedback delay
#[derive(Debug)]
pub struct DelayBus {
    sample_rate: f32,
    buffer: Vec<f32>,
    write: usize,
    delay: SmoothedParam,
    feedback: f32,
    return_gain: f32,
}

/// Delay time in seconds for a tempo, capped to the buffer
pub fn delay_secs(bpm: f64) -> f32 {
    ((DELAY_BEATS * 60.0 / bpm.max(1.0)) as f32).min(MAX_DELAY_SECS)
}

impl DelayBus {
    pub fn new(sample_rate: f32, bpm: f64, config: &DelayConfig) -> Self {
        let len = (MAX_DELAY_SECS * sample_rate) as usize + 2;
        Self {
            sample_rate,
            buffer: vec![0.0; len],
            write: 0,
            delay: SmoothedParam::new(
                delay_secs(bpm) * sample_rate,
                DELAY_GLIDE_SECS,
                sample_rate,
            ),
            feedback: config.feedback.clamp(0.0, 0.95),
            return_gain: config.return_gain,
        }
    }

    /// Retarget the delay time; it glides rather than jumping
    pub fn set_bpm(&mut self, bpm: f64) {
        self.delay.set_target(delay_secs(bpm) * self.sample_rate);
    }

    pub fn delay_frames(&self) -> f32 {
        self.delay.value()
    }

    fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let pos = self.write as f32 - delay;
        let pos = if pos < 0.0 { pos + len as f32 } else { pos };
        let i = pos.floor() as usize % len;
        let frac = pos - pos.floor();
        let a = self.buffer[i];
        let b = self.buffer[(i + 1) % len];
        a + (b - a) * frac
    }

    pub fn process(&mut self, send: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let len = self.buffer.len();
        for (i, &x) in send.iter().enumerate() {
            let delay = self.delay.next().clamp(1.0, (len - 2) as f32);
            let echo = self.read(delay);
            self.buffer[self.write] = x + echo * self.feedback;
            self.write = (self.write + 1) % len;

            let y = echo * self.return_gain;
            out_l[i] += y;
            out_r[i] += y;
        }
    }
}

/// Master gain followed by a stereo brickwall limiter
pub struct MasterBus {
    gain: SmoothedParam,
    limiter: An<Limiter<U2>>,
}

impl std::fmt::Debug for MasterBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterBus")
            .field("gain", &self.gain.target())
            .finish()
    }
}

impl MasterBus {
    pub fn new(sample_rate: f32, ramp_secs: f32, config: &MasterConfig) -> Self {
        let mut limiter = limiter_stereo(
            config.limiter_attack_ms / 1000.0,
            config.limiter_release_ms / 1000.0,
        );
        limiter.set_sample_rate(sample_rate as f64);
        Self {
            gain: SmoothedParam::new(config.gain, ramp_secs, sample_rate),
            limiter,
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_target(gain.max(0.0));
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let g = self.gain.next();
            let out = self.limiter.tick(&Frame::from([*l * g, *r * g]));
            *l = out[0];
            *r = out[1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_reverb(bus: &mut ReverbBus, input: &[f32]) -> Vec<f32> {
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        bus.process(input, &mut l, &mut r);
        assert_eq!(l, r);
        l
    }

    #[test]
    fn test_reverb_matches_direct_convolution() {
        let impulse: Vec<f32> = (0..1_300).map(|i| ((i as f32) * 0.37).sin() * 0.99f32.powi(i)).collect();
        let config = ReverbConfig { seconds: 0.0, return_gain: 1.0 };
        let mut bus = ReverbBus::new(&impulse, &config);

        let mut input = vec![0.0; 4_096];
        input[3] = 1.0;
        input[700] = -0.5;
        let out = run_reverb(&mut bus, &input);

        for n in (0..4_096).step_by(97) {
            let mut expected = 0.0;
            if n >= REVERB_BLOCK {
                let t = n - REVERB_BLOCK;
                for (k, &x) in input.iter().enumerate().take(t + 1) {
                    if let Some(h) = impulse.get(t - k) {
                        expected += x * h;
                    }
                }
            }
            assert!((out[n] - expected).abs() < 1e-3, "n={n} got {} want {expected}", out[n]);
        }
    }

    #[test]
    fn test_reverb_silent_on_silence() {
        let config = ReverbConfig { seconds: 0.5, return_gain: 0.5 };
        let mut bus = ReverbBus::new(&[0.5, 0.25, 0.1], &config);
        let out = run_reverb(&mut bus, &vec![0.0; 2_000]);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_delay_time_follows_tempo() {
        assert!((delay_secs(120.0) - 0.375).abs() < 1e-6);
        assert_eq!(delay_secs(10.0), MAX_DELAY_SECS);

        let config = DelayConfig { feedback: 0.0, return_gain: 1.0 };
        let mut bus = DelayBus::new(1_000.0, 120.0, &config);
        let mut input = vec![0.0; 1_000];
        input[0] = 1.0;
        let mut l = vec![0.0; 1_000];
        let mut r = vec![0.0; 1_000];
        bus.process(&input, &mut l, &mut r);
        let peak = l
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &s)| if s > best.1 { (i, s) } else { best });
        assert_eq!(peak.0, 375);
    }

    #[test]
    fn test_delay_glides_on_tempo_change() {
        let config = DelayConfig { feedback: 0.3, return_gain: 1.0 };
        let mut bus = DelayBus::new(1_000.0, 120.0, &config);
        bus.set_bpm(60.0);
        let silent = vec![0.0; 10];
        let (mut l, mut r) = (vec![0.0; 10], vec![0.0; 10]);
        bus.process(&silent, &mut l, &mut r);
        let frames = bus.delay_frames();
        assert!(frames > 375.0 && frames < 750.0);
    }

    #[test]
    fn test_master_limits_hot_signal() {
        let config = MasterConfig { gain: 1.0, limiter_attack_ms: 1.0, limiter_release_ms: 100.0 };
        let mut bus = MasterBus::new(44_100.0, 0.02, &config);
        let mut l: Vec<f32> = (0..44_100).map(|i| 4.0 * (i as f32 * 0.05).sin()).collect();
        let mut r = l.clone();
        bus.process(&mut l, &mut r);
        let tail_peak = l[22_050..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail_peak <= 1.05, "peak {tail_peak}");
    }
}
