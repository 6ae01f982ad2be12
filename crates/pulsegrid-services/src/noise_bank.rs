//! Precomputed noise buffers, shaping curves and the reverb impulse
//!
//! Built once per engine from a fixed seed and shared read-only through an
//! `Arc`. Voices take their own read position over the same samples.

use std::sync::Arc;

use tracing::debug;

/// Length of each noise buffer
pub const NOISE_SECONDS: f32 = 2.0;
/// Points per shaping curve; odd so that 0.0 maps to the exact center
pub const CURVE_POINTS: usize = 1025;

const SEED: u64 = 0x0808_0909;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

/// Non-linear transfer curve over the input range -1..1
#[derive(Debug, Clone)]
pub struct Curve {
    points: Arc<[f32]>,
}

impl Curve {
    fn from_fn(f: impl Fn(f32) -> f32) -> Self {
        let last = (CURVE_POINTS - 1) as f32;
        let points: Vec<f32> = (0..CURVE_POINTS)
            .map(|i| f(i as f32 / last * 2.0 - 1.0))
            .collect();
        Self { points: points.into() }
    }

    /// Look up `x`, clamped to -1..1, with linear interpolation
    pub fn shape(&self, x: f32) -> f32 {
        let last = self.points.len() - 1;
        let pos = (x.clamp(-1.0, 1.0) + 1.0) * 0.5 * last as f32;
        let i = (pos as usize).min(last - 1);
        let frac = pos - i as f32;
        self.points[i] + (self.points[i + 1] - self.points[i]) * frac
    }
}

#[derive(Debug)]
pub struct NoiseBank {
    sample_rate: u32,
    white: Arc<[f32]>,
    pink: Arc<[f32]>,
    brown: Arc<[f32]>,
    drive: Curve,
    crush: Curve,
    impulse: Arc<[f32]>,
}

impl NoiseBank {
    pub fn new(sample_rate: u32, reverb_seconds: f32) -> Self {
        let mut rng = fastrand::Rng::with_seed(SEED);
        let len = (NOISE_SECONDS * sample_rate as f32) as usize;

        let white: Vec<f32> = (0..len).map(|_| rng.f32() * 2.0 - 1.0).collect();
        let pink = pink_from_white(&white);
        let brown = brown_from_white(&white);
        let impulse = reverb_impulse(&mut rng, sample_rate, reverb_seconds);

        debug!(sample_rate, noise_len = len, impulse_len = impulse.len(), "Built noise bank");

        Self {
            sample_rate,
            white: white.into(),
            pink: pink.into(),
            brown: brown.into(),
            drive: Curve::from_fn(|x| (3.0 * x).tanh() / 3.0_f32.tanh()),
            crush: Curve::from_fn(|x| (x * 8.0).round() / 8.0),
            impulse: impulse.into(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn noise(&self, color: NoiseColor) -> Arc<[f32]> {
        match color {
            NoiseColor::White => self.white.clone(),
            NoiseColor::Pink => self.pink.clone(),
            NoiseColor::Brown => self.brown.clone(),
        }
    }

    /// Soft-clipping curve for drive/grit
    pub fn drive_curve(&self) -> &Curve {
        &self.drive
    }

    /// Staircase curve used for the bitcrush stage
    pub fn crush_curve(&self) -> &Curve {
        &self.crush
    }

    pub fn impulse(&self) -> Arc<[f32]> {
        self.impulse.clone()
    }
}

// Paul Kellet's economy pink filter
fn pink_from_white(white: &[f32]) -> Vec<f32> {
    let (mut b0, mut b1, mut b2) = (0.0f32, 0.0f32, 0.0f32);
    let mut out: Vec<f32> = white
        .iter()
        .map(|&w| {
            b0 = 0.99765 * b0 + w * 0.0990460;
            b1 = 0.96300 * b1 + w * 0.2965164;
            b2 = 0.57000 * b2 + w * 1.0526913;
            b0 + b1 + b2 + w * 0.1848
        })
        .collect();
    normalize(&mut out);
    out
}

fn brown_from_white(white: &[f32]) -> Vec<f32> {
    let mut acc = 0.0f32;
    let mut out: Vec<f32> = white
        .iter()
        .map(|&w| {
            acc = (acc + w * 0.02) * 0.998;
            acc
        })
        .collect();
    normalize(&mut out);
    out
}

fn reverb_impulse(rng: &mut fastrand::Rng, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = ((seconds.max(0.05) * sample_rate as f32) as usize).max(1);
    let fade_in = (0.005 * sample_rate as f32) as usize;
    // -60 dB at the end of the impulse
    let decay = 6.9 / len as f32;
    let mut out: Vec<f32> = (0..len)
        .map(|i| {
            let onset = if i < fade_in { i as f32 / fade_in as f32 } else { 1.0 };
            (rng.f32() * 2.0 - 1.0) * (-(i as f32) * decay).exp() * onset
        })
        .collect();

    let energy: f32 = out.iter().map(|s| s * s).sum();
    if energy > 0.0 {
        let scale = energy.sqrt().recip();
        out.iter_mut().for_each(|s| *s *= scale);
    }
    out
}

fn normalize(buf: &mut [f32]) {
    let peak = buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        buf.iter_mut().for_each(|s| *s /= peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_is_deterministic() {
        let a = NoiseBank::new(8_000, 0.2);
        let b = NoiseBank::new(8_000, 0.2);
        assert_eq!(a.noise(NoiseColor::White)[..64], b.noise(NoiseColor::White)[..64]);
        assert_eq!(a.noise(NoiseColor::Pink).len(), 16_000);
    }

    #[test]
    fn test_noise_is_bounded() {
        let bank = NoiseBank::new(8_000, 0.2);
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            assert!(bank.noise(color).iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn test_curves() {
        let bank = NoiseBank::new(8_000, 0.2);
        let drive = bank.drive_curve();
        assert!(drive.shape(0.0).abs() < 1e-6);
        assert!((drive.shape(1.0) - 1.0).abs() < 1e-6);
        assert!((drive.shape(5.0) - 1.0).abs() < 1e-6);
        assert!(drive.shape(0.2) > 0.2);

        let crush = bank.crush_curve();
        assert!((crush.shape(0.5) - 0.5).abs() < 1e-6);
        assert!((crush.shape(0.51) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_impulse_has_unit_energy() {
        let bank = NoiseBank::new(8_000, 0.5);
        let impulse = bank.impulse();
        assert_eq!(impulse.len(), 4_000);
        let energy: f32 = impulse.iter().map(|s| s * s).sum();
        assert!((energy - 1.0).abs() < 1e-3);
    }
}
