//! Step patterns and their automation lanes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::effects::EffectSlot;
use crate::error::{PulseGridError, Result};

/// Steps in one pattern cycle (4 beats of 16th notes)
pub const STEPS_PER_PATTERN: usize = 16;

/// Automatable parameter of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKey {
    Volume,
    Pitch,
    Pan,
    EffectActive(EffectSlot),
    EffectValue(EffectSlot),
}

impl ParamKey {
    pub const COUNT: usize = 3 + 2 * EffectSlot::COUNT;

    /// Every key, ordered by `index()`
    pub const ALL: [ParamKey; Self::COUNT] = [
        ParamKey::Volume,
        ParamKey::Pitch,
        ParamKey::Pan,
        ParamKey::EffectActive(EffectSlot::Filter),
        ParamKey::EffectValue(EffectSlot::Filter),
        ParamKey::EffectActive(EffectSlot::Reverb),
        ParamKey::EffectValue(EffectSlot::Reverb),
        ParamKey::EffectActive(EffectSlot::Delay),
        ParamKey::EffectValue(EffectSlot::Delay),
        ParamKey::EffectActive(EffectSlot::Bitcrush),
        ParamKey::EffectValue(EffectSlot::Bitcrush),
        ParamKey::EffectActive(EffectSlot::Stutter),
        ParamKey::EffectValue(EffectSlot::Stutter),
        ParamKey::EffectActive(EffectSlot::Glitch),
        ParamKey::EffectValue(EffectSlot::Glitch),
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Volume => 0,
            Self::Pitch => 1,
            Self::Pan => 2,
            Self::EffectActive(slot) => 3 + slot.index() * 2,
            Self::EffectValue(slot) => 4 + slot.index() * 2,
        }
    }

    /// Boolean keys are stored as 0/1 and read back with `> 0.5`
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::EffectActive(_))
    }

    /// Parse `volume`, `pitch`, `pan`, `effects.<slot>.active` or `effects.<slot>.value`
    pub fn parse(key: &str) -> Result<Self> {
        let unknown = || PulseGridError::UnknownParamKey(key.to_string());
        match key {
            "volume" => return Ok(Self::Volume),
            "pitch" => return Ok(Self::Pitch),
            "pan" => return Ok(Self::Pan),
            _ => {}
        }
        let mut parts = key.split('.');
        let (Some("effects"), Some(slot), Some(field), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(unknown());
        };
        let slot = EffectSlot::from_key(slot).map_err(|_| unknown())?;
        match field {
            "active" => Ok(Self::EffectActive(slot)),
            "value" => Ok(Self::EffectValue(slot)),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume => f.write_str("volume"),
            Self::Pitch => f.write_str("pitch"),
            Self::Pan => f.write_str("pan"),
            Self::EffectActive(slot) => write!(f, "effects.{}.active", slot.key()),
            Self::EffectValue(slot) => write!(f, "effects.{}.value", slot.key()),
        }
    }
}

impl FromStr for ParamKey {
    type Err = PulseGridError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Per-step override values for one key; `None` falls through to the base value
pub type Lane = [Option<f32>; STEPS_PER_PATTERN];

/// One fixed-length lane per `ParamKey`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    lanes: [Lane; ParamKey::COUNT],
}

impl Default for Automation {
    fn default() -> Self {
        Self { lanes: [[None; STEPS_PER_PATTERN]; ParamKey::COUNT] }
    }
}

impl Automation {
    pub fn get(&self, key: ParamKey, step: usize) -> Option<f32> {
        self.lanes[key.index()][step % STEPS_PER_PATTERN]
    }

    pub fn lane(&self, key: ParamKey) -> &Lane {
        &self.lanes[key.index()]
    }

    pub fn set(&mut self, key: ParamKey, step: usize, value: Option<f32>) -> Result<()> {
        if step >= STEPS_PER_PATTERN {
            return Err(PulseGridError::StepOutOfRange(step));
        }
        self.lanes[key.index()][step] = value;
        Ok(())
    }

    /// Store a boolean override as 0/1
    pub fn set_flag(&mut self, key: ParamKey, step: usize, value: Option<bool>) -> Result<()> {
        self.set(key, step, value.map(|on| if on { 1.0 } else { 0.0 }))
    }

    pub fn clear_lane(&mut self, key: ParamKey) {
        self.lanes[key.index()] = [None; STEPS_PER_PATTERN];
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().flatten().all(Option::is_none)
    }

    /// Keys that have at least one override
    pub fn automated_keys(&self) -> impl Iterator<Item = ParamKey> + '_ {
        ParamKey::ALL
            .into_iter()
            .filter(|key| self.lane(*key).iter().any(Option::is_some))
    }
}

/// A per-track pattern: 16 trigger slots plus automation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pattern {
    pub steps: [bool; STEPS_PER_PATTERN],
    /// Selected variation (0-3): synthesis variant and track variation preset
    pub variation: usize,
    /// Pattern-local pitch override (octaves)
    pub pitch: Option<f32>,
    /// Pattern-local pan override (-1.0 to 1.0)
    pub pan: Option<f32>,
    pub automation: Automation,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pattern from a step string like `"x...x...x...x..."`
    pub fn from_step_string(steps: &str) -> Self {
        Self {
            steps: parse_step_string(steps),
            ..Self::default()
        }
    }

    pub fn is_set(&self, step: usize) -> bool {
        self.steps[step % STEPS_PER_PATTERN]
    }

    pub fn set_step(&mut self, step: usize, on: bool) -> Result<()> {
        let slot = self.steps.get_mut(step).ok_or(PulseGridError::StepOutOfRange(step))?;
        *slot = on;
        Ok(())
    }

    pub fn toggle(&mut self, step: usize) -> Result<bool> {
        let slot = self.steps.get_mut(step).ok_or(PulseGridError::StepOutOfRange(step))?;
        *slot = !*slot;
        Ok(*slot)
    }

    pub fn set_variation(&mut self, variation: usize) -> Result<()> {
        if variation >= crate::track::VARIATIONS_PER_TRACK {
            return Err(PulseGridError::VariationOutOfRange(variation));
        }
        self.variation = variation;
        Ok(())
    }

    /// Clear triggers and automation, keep variation and overrides
    pub fn clear(&mut self) {
        self.steps = [false; STEPS_PER_PATTERN];
        self.automation.clear();
    }

    /// Write (or clear with `None`) one automation override
    pub fn set_automation(&mut self, key: ParamKey, step: usize, value: Option<f32>) -> Result<()> {
        self.automation.set(key, step, value)
    }

    pub fn clear_automation_lane(&mut self, key: ParamKey) {
        self.automation.clear_lane(key);
    }

    pub fn active_steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().enumerate().filter(|(_, on)| **on).map(|(i, _)| i)
    }

    pub fn is_empty(&self) -> bool {
        !self.steps.iter().any(|on| *on)
    }

    /// Render triggers back to `x`/`.` notation
    pub fn to_step_string(&self) -> String {
        self.steps.iter().map(|on| if *on { 'x' } else { '.' }).collect()
    }
}

/// Parse step notation: `x`, `X`, `o` or `1` is a hit, anything else a rest.
/// Short strings are padded with rests; characters past step 16 are ignored.
pub fn parse_step_string(steps: &str) -> [bool; STEPS_PER_PATTERN] {
    let mut out = [false; STEPS_PER_PATTERN];
    for (slot, c) in out.iter_mut().zip(steps.chars()) {
        *slot = matches!(c, 'x' | 'X' | 'o' | '1');
    }
    out
}
