//! Sample-counting audio clock shared by the output callback and the scheduler

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Frames rendered so far on the output device. The audio thread is the only
/// writer; everyone else reads seconds from it.
#[derive(Debug)]
pub struct AudioClock {
    frames: AtomicU64,
    sample_rate: AtomicU32,
    running: AtomicBool,
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate: AtomicU32::new(sample_rate.max(1)),
            running: AtomicBool::new(false),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Current time in seconds
    pub fn now_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate() as f64
    }

    /// Absolute frame for a time in seconds
    pub fn frame_at(&self, time: f64) -> u64 {
        (time.max(0.0) * self.sample_rate() as f64).round() as u64
    }

    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Only valid before the output stream starts; resets the frame count
    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate.max(1), Ordering::Release);
        self.frames.store(0, Ordering::Release);
    }

    /// True once the output device is producing audio
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_in_seconds() {
        let clock = AudioClock::new(48_000);
        assert_eq!(clock.now_secs(), 0.0);
        clock.advance(24_000);
        assert!((clock.now_secs() - 0.5).abs() < 1e-12);
        assert_eq!(clock.frame_at(1.0), 48_000);
        assert_eq!(clock.frame_at(-3.0), 0);
    }
}
