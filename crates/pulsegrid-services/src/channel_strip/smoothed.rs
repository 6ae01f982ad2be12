//! One-pole parameter smoothing

/// A parameter that approaches its target exponentially. Writes only move the
/// target; the value glides there over roughly `ramp_secs`.
#[derive(Debug, Clone, Copy)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coef: f32,
}

impl SmoothedParam {
    /// `ramp_secs` is the time to get within ~2% of a new target
    pub fn new(value: f32, ramp_secs: f32, sample_rate: f32) -> Self {
        let tau = (ramp_secs / 4.0).max(1e-6);
        Self {
            current: value,
            target: value,
            coef: 1.0 - (-1.0 / (tau * sample_rate)).exp(),
        }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    /// Jump straight to the target
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() <= 1e-6
    }

    /// Advance one sample
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            self.current += (self.target - self.current) * self.coef;
            if (self.current - self.target).abs() <= 1e-7 {
                self.current = self.target;
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaches_target_within_ramp() {
        let mut p = SmoothedParam::new(0.0, 0.02, 48_000.0);
        p.set_target(1.0);
        assert_eq!(p.value(), 0.0);
        for _ in 0..(0.02 * 48_000.0) as usize {
            p.next();
        }
        assert!(p.value() > 0.98 && p.value() <= 1.0);
    }

    #[test]
    fn test_never_jumps() {
        let mut p = SmoothedParam::new(1.0, 0.02, 48_000.0);
        p.set_target(0.0);
        let first = p.next();
        assert!(first < 1.0 && first > 0.9);
    }

    #[test]
    fn test_snap() {
        let mut p = SmoothedParam::new(0.0, 0.02, 48_000.0);
        p.set_target(0.5);
        p.snap();
        assert!(p.is_settled());
        assert_eq!(p.next(), 0.5);
    }
}
