//! Engine configuration, loaded by the player from TOML

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::transport::{DEFAULT_BPM, DEFAULT_LOOKAHEAD_SECS, DEFAULT_START_OFFSET_SECS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate used for offline renders; live playback follows the device
    pub sample_rate: u32,
    pub lookahead_secs: f64,
    pub start_offset_secs: f64,
    /// Smoothing time for every channel-strip parameter write
    pub ramp_secs: f64,
    pub history_depth: usize,
    pub preview_secs: f64,
    pub preview_debounce_ms: u64,
    pub default_bpm: f64,
    pub default_genre: String,
    pub metronome: bool,
    pub master: MasterConfig,
    pub delay: DelayConfig,
    pub reverb: ReverbConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            lookahead_secs: DEFAULT_LOOKAHEAD_SECS,
            start_offset_secs: DEFAULT_START_OFFSET_SECS,
            ramp_secs: 0.02,
            history_depth: DEFAULT_HISTORY_DEPTH,
            preview_secs: 0.5,
            preview_debounce_ms: 300,
            default_bpm: DEFAULT_BPM,
            default_genre: "808".to_string(),
            metronome: false,
            master: MasterConfig::default(),
            delay: DelayConfig::default(),
            reverb: ReverbConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Linear gain ahead of the limiter
    pub gain: f32,
    pub limiter_attack_ms: f32,
    pub limiter_release_ms: f32,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self { gain: 0.9, limiter_attack_ms: 1.0, limiter_release_ms: 100.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub feedback: f32,
    pub return_gain: f32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self { feedback: 0.35, return_gain: 0.6 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Length of the generated impulse response
    pub seconds: f32,
    pub return_gain: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self { seconds: 1.8, return_gain: 0.5 }
    }
}
