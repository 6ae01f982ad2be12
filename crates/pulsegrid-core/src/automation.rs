//! Per-step automation resolver
//!
//! Layers, lowest first: track base values, the variation preset selected by
//! the pattern, the pattern-local pitch/pan override, then the automation lane
//! entry for the step. The resolver is pure so the scheduler and any preview
//! consumer see the same values.

use crate::effects::EffectSet;
use crate::pattern::{ParamKey, Pattern, STEPS_PER_PATTERN};
use crate::track::{MAX_PITCH, MAX_VOLUME, MIN_PITCH, Track};

/// Trigger-time parameter set for one track at one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveParams {
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
    pub effects: EffectSet,
    /// Synthesis variant / variation index (0-3)
    pub variation: usize,
}

impl EffectiveParams {
    /// Numeric view of a key; booleans read as 0/1
    pub fn value(&self, key: ParamKey) -> f32 {
        match key {
            ParamKey::Volume => self.volume,
            ParamKey::Pitch => self.pitch,
            ParamKey::Pan => self.pan,
            ParamKey::EffectActive(slot) => {
                if self.effects.is_active(slot) { 1.0 } else { 0.0 }
            }
            ParamKey::EffectValue(slot) => self.effects.value(slot),
        }
    }

    /// Overwrite a key from an automation value
    pub fn apply(&mut self, key: ParamKey, raw: f32) {
        match key {
            ParamKey::Volume => self.volume = raw.clamp(0.0, MAX_VOLUME),
            ParamKey::Pitch => self.pitch = raw.clamp(MIN_PITCH, MAX_PITCH),
            ParamKey::Pan => self.pan = raw.clamp(-1.0, 1.0),
            ParamKey::EffectActive(slot) => self.effects.set_active(slot, raw > 0.5),
            ParamKey::EffectValue(slot) => self.effects.set_value(slot, raw),
        }
    }
}

/// Base values before any per-step automation
pub fn base_params(track: &Track, pattern: &Pattern) -> EffectiveParams {
    let mut params = EffectiveParams {
        volume: track.volume,
        pitch: track.pitch,
        pan: track.pan,
        effects: track.effects,
        variation: pattern.variation,
    };

    if let Some(preset) = track.variation(pattern.variation) {
        params.volume = preset.volume;
        params.pan = preset.pan;
        params.pitch = preset.pitch;
        params.effects = preset.effects;
    }
    if let Some(pitch) = pattern.pitch {
        params.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
    }
    if let Some(pan) = pattern.pan {
        params.pan = pan.clamp(-1.0, 1.0);
    }

    params
}

/// Effective parameters for `step` (wrapped into 0..16)
pub fn resolve(track: &Track, pattern: &Pattern, step: usize) -> EffectiveParams {
    let step = step % STEPS_PER_PATTERN;
    let mut params = base_params(track, pattern);
    for key in ParamKey::ALL {
        if let Some(raw) = pattern.automation.get(key, step) {
            params.apply(key, raw);
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectSlot;
    use crate::genre::InstrumentRole;
    use crate::track::TrackId;

    fn track() -> Track {
        let mut track = Track::new(TrackId(1), InstrumentRole::Kick, "Kick");
        track.set_volume(0.7);
        track.set_pan(-0.25);
        track.set_pitch(0.5);
        track.effects.set_value(EffectSlot::Filter, 0.3);
        track
    }

    #[test]
    fn test_resolve_falls_back_to_base_for_every_key_and_step() {
        let mut track = track();
        let pattern = &mut track.patterns[0];
        // Sparse overrides on a few keys
        pattern.automation.set(ParamKey::Volume, 2, Some(0.1)).unwrap();
        pattern.automation.set(ParamKey::Pan, 9, Some(0.9)).unwrap();
        pattern.automation.set(ParamKey::EffectValue(EffectSlot::Filter), 15, Some(0.8)).unwrap();
        pattern.automation.set_flag(ParamKey::EffectActive(EffectSlot::Glitch), 4, Some(true)).unwrap();

        let pattern = track.pattern().clone();
        let base = base_params(&track, &pattern);
        for key in ParamKey::ALL {
            for step in 0..STEPS_PER_PATTERN {
                let resolved = resolve(&track, &pattern, step);
                let expected = match pattern.automation.get(key, step) {
                    Some(raw) if key.is_boolean() => if raw > 0.5 { 1.0 } else { 0.0 },
                    Some(raw) => raw,
                    None => base.value(key),
                };
                assert!(
                    (resolved.value(key) - expected).abs() < 1e-6,
                    "key {key} step {step}: {} != {expected}",
                    resolved.value(key)
                );
            }
        }
    }

    #[test]
    fn test_boolean_coercion() {
        let mut track = track();
        track.effects.set_active(EffectSlot::Delay, true);
        let key = ParamKey::EffectActive(EffectSlot::Delay);
        track.pattern_mut().automation.set(key, 0, Some(0.4)).unwrap();
        track.pattern_mut().automation.set(key, 1, Some(0.6)).unwrap();
        let pattern = track.pattern().clone();
        assert!(!resolve(&track, &pattern, 0).effects.is_active(EffectSlot::Delay));
        assert!(resolve(&track, &pattern, 1).effects.is_active(EffectSlot::Delay));
        assert!(resolve(&track, &pattern, 2).effects.is_active(EffectSlot::Delay));
    }

    #[test]
    fn test_variation_preset_and_pattern_override_layering() {
        let mut track = track();
        track.set_volume(0.2);
        track.set_pan(0.5);
        track.capture_variation(1).unwrap();
        track.set_volume(0.9);
        track.set_pan(0.0);

        let mut pattern = Pattern::new();
        assert_eq!(base_params(&track, &pattern).volume, 0.9);

        pattern.variation = 1;
        pattern.pan = Some(-1.0);
        let base = base_params(&track, &pattern);
        assert_eq!(base.volume, 0.2);
        assert_eq!(base.pan, -1.0);
        assert_eq!(base.variation, 1);

        pattern.automation.set(ParamKey::Volume, 3, Some(1.5)).unwrap();
        assert_eq!(resolve(&track, &pattern, 3).volume, 1.5);
        assert_eq!(resolve(&track, &pattern, 19).volume, 1.5);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let track = track();
        let pattern = track.pattern().clone();
        assert_eq!(resolve(&track, &pattern, 5), resolve(&track, &pattern, 5));
    }
}
