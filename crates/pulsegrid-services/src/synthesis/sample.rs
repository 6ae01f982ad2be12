//! Custom-sample playback: trimmed, rate-shifted one-shots with short fades

use std::sync::Arc;

use pulsegrid_core::CustomSample;

use super::voice::{Layer, Voice};

/// Fade applied at both ends of the trimmed region
pub const SAMPLE_FADE_SECS: f64 = 0.005;

/// Portion of a buffer to play and how fast to read it
#[derive(Debug, Clone)]
pub struct SampleRegion {
    data: Arc<[f32]>,
    /// First source frame (fractional)
    start: f64,
    /// End source frame (exclusive)
    end: f64,
    /// Source frames advanced per output frame
    rate: f64,
    fade: usize,
}

impl SampleRegion {
    /// Region for `sample` trimmed to its window, read at `2^pitch` and
    /// converted from the buffer's rate to `sample_rate`
    pub fn from_custom(sample: &CustomSample, pitch: f32, sample_rate: f32) -> Self {
        let len = sample.buffer.len() as f64;
        let rate = 2.0_f64.powf(pitch as f64) * sample.buffer.sample_rate as f64 / sample_rate as f64;
        let mut region = Self {
            data: sample.buffer.data.clone(),
            start: sample.trim_start as f64 * len,
            end: sample.trim_end as f64 * len,
            rate: rate.max(1e-6),
            fade: 0,
        };
        let fade = (SAMPLE_FADE_SECS * sample_rate as f64).round() as usize;
        region.fade = fade.min(region.frames() / 2);
        region
    }

    /// Output frames this region lasts
    pub fn frames(&self) -> usize {
        ((self.end - self.start).max(0.0) / self.rate).round() as usize
    }
}

pub(crate) struct SamplePlayer {
    region: SampleRegion,
    frames: usize,
    index: usize,
}

impl SamplePlayer {
    pub(crate) fn new(region: SampleRegion) -> Self {
        Self { frames: region.frames(), region, index: 0 }
    }

    pub(crate) fn next(&mut self) -> f32 {
        if self.index >= self.frames {
            return 0.0;
        }
        let pos = self.region.start + self.index as f64 * self.region.rate;
        let i = pos as usize;
        let frac = (pos - i as f64) as f32;
        let data = &self.region.data;
        let a = data.get(i).copied().unwrap_or(0.0);
        let b = data.get(i + 1).copied().unwrap_or(a);
        let sample = a + (b - a) * frac;

        let fade = self.region.fade;
        let gain = if fade == 0 {
            1.0
        } else {
            let fade_in = self.index as f32 / fade as f32;
            let fade_out = (self.frames - self.index) as f32 / fade as f32;
            fade_in.min(fade_out).min(1.0)
        };

        self.index += 1;
        sample * gain
    }
}

/// One-shot voice for a track's custom sample. The pitch-lock flag does not
/// change playback: the rate is always `2^pitch`.
pub fn sample_voice(sample: &CustomSample, pitch: f32, sample_rate: f32) -> Voice {
    Voice::new(sample_rate).with(Layer::sample(SampleRegion::from_custom(sample, pitch, sample_rate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsegrid_core::SampleBuffer;

    fn two_second_sample() -> CustomSample {
        let buffer = SampleBuffer::new(vec![0.5; 88_200], 44_100);
        CustomSample::new(buffer, 0.25, 0.75, false)
    }

    #[test]
    fn test_trimmed_sample_durations() {
        let sample = two_second_sample();
        let voice = sample_voice(&sample, 0.0, 44_100.0);
        assert!((voice.duration_secs() - 1.0).abs() < 1e-9);

        let voice = sample_voice(&sample, 1.0, 44_100.0);
        assert!((voice.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rate_follows_buffer_sample_rate() {
        let sample = two_second_sample();
        // Engine running at twice the buffer rate still plays 1.0 s
        let voice = sample_voice(&sample, 0.0, 88_200.0);
        assert!((voice.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fades_and_body() {
        let sample = two_second_sample();
        let mut voice = sample_voice(&sample, 0.0, 44_100.0);
        let mut out = vec![0.0; 44_100 + 100];
        voice.render_add(&mut out);

        let fade = (SAMPLE_FADE_SECS * 44_100.0).round() as usize;
        assert_eq!(out[0], 0.0);
        assert!(out[fade / 2] > 0.0 && out[fade / 2] < 0.5);
        assert!((out[22_050] - 0.5).abs() < 1e-6);
        assert!(out[44_099] < 0.01);
        assert!(out[44_100..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_empty_trim_is_silent() {
        let buffer = SampleBuffer::new(vec![1.0; 1_000], 44_100);
        let sample = CustomSample::new(buffer, 0.5, 0.5, true);
        let voice = sample_voice(&sample, 0.0, 44_100.0);
        assert_eq!(voice.len_frames(), 0);
        assert!(voice.is_finished());
    }
}
