//! Per-track effect slots

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PulseGridError, Result};

/// The six insert/send effects every track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectSlot {
    Filter,
    Reverb,
    Delay,
    Bitcrush,
    Stutter,
    Glitch,
}

impl EffectSlot {
    pub const COUNT: usize = 6;

    pub const ALL: [EffectSlot; Self::COUNT] = [
        EffectSlot::Filter,
        EffectSlot::Reverb,
        EffectSlot::Delay,
        EffectSlot::Bitcrush,
        EffectSlot::Stutter,
        EffectSlot::Glitch,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Filter => 0,
            Self::Reverb => 1,
            Self::Delay => 2,
            Self::Bitcrush => 3,
            Self::Stutter => 4,
            Self::Glitch => 5,
        }
    }

    /// Key segment used in automation keys (`effects.<key>.value`)
    pub fn key(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Reverb => "reverb",
            Self::Delay => "delay",
            Self::Bitcrush => "bitcrush",
            Self::Stutter => "stutter",
            Self::Glitch => "glitch",
        }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.key() == key)
            .ok_or_else(|| PulseGridError::UnknownParamKey(key.to_string()))
    }
}

impl fmt::Display for EffectSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// On/off state plus a normalized amount
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectState {
    pub active: bool,
    /// 0.0 to 1.0
    pub value: f32,
}

impl Default for EffectState {
    fn default() -> Self {
        Self { active: false, value: 0.5 }
    }
}

/// Fixed set of effect states, one per `EffectSlot`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectSet {
    slots: [EffectState; EffectSlot::COUNT],
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: EffectSlot) -> EffectState {
        self.slots[slot.index()]
    }

    pub fn is_active(&self, slot: EffectSlot) -> bool {
        self.slots[slot.index()].active
    }

    pub fn value(&self, slot: EffectSlot) -> f32 {
        self.slots[slot.index()].value
    }

    pub fn set_active(&mut self, slot: EffectSlot, active: bool) {
        self.slots[slot.index()].active = active;
    }

    /// Set the amount, clamped to 0.0-1.0
    pub fn set_value(&mut self, slot: EffectSlot, value: f32) {
        self.slots[slot.index()].value = value.clamp(0.0, 1.0);
    }

    /// Amount if the slot is active, otherwise zero (send levels, mix amounts)
    pub fn amount(&self, slot: EffectSlot) -> f32 {
        let state = self.get(slot);
        if state.active { state.value } else { 0.0 }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectSlot, EffectState)> + '_ {
        EffectSlot::ALL.into_iter().map(|slot| (slot, self.get(slot)))
    }
}
