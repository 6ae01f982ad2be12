//! Seam for the global performance-effects unit
//!
//! The unit is supplied from outside. The engine only forwards selection and
//! parameter calls to it and runs it on the master bus ahead of the limiter.

use std::fmt::Debug;

/// Parameter descriptor reported by a macro effect
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParam {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub unit: String,
}

impl EffectParam {
    pub fn new(name: &str, value: f32, min: f32, max: f32, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
            unit: unit.to_string(),
        }
    }
}

/// External stereo effects unit driven by effect-kind names
pub trait MacroEffects: Send + Debug {
    /// Latch exactly the listed effect kinds; everything else is released
    fn apply(&mut self, active: &[String]);
    fn params(&self, kind: &str) -> Vec<EffectParam>;
    fn set_param(&mut self, kind: &str, index: usize, value: f32);
    /// Process one block of the master bus in place
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);
    fn set_sample_rate(&mut self, _sample_rate: f32) {}
}
