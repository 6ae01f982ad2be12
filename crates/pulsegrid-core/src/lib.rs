//! pulsegrid-core: Domain types for the pulsegrid step sequencer

pub mod automation;
mod config;
mod effects;
mod error;
mod genre;
mod history;
pub mod mixing;
pub mod pattern;
pub mod presets;
mod scene;
mod session;
mod track;
pub mod transport;

pub use automation::{EffectiveParams, base_params, resolve};
pub use config::{DelayConfig, EngineConfig, MasterConfig, ReverbConfig};
pub use effects::{EffectSet, EffectSlot, EffectState};
pub use error::{PulseGridError, Result};
pub use genre::{Genre, InstrumentRole, Variant};
pub use history::{DEFAULT_HISTORY_DEPTH, History};
pub use mixing::{gain_to_height, height_to_gain, pan_gains};
pub use pattern::{Automation, Lane, ParamKey, Pattern, STEPS_PER_PATTERN, parse_step_string};
pub use presets::{PRESETS, PresetPattern, apply_preset, find_preset};
pub use scene::{DEFAULT_SCENE_COUNT, Scene, SceneBank};
pub use session::{DEFAULT_KIT, SessionState};
pub use track::{
    CustomSample, MAX_PITCH, MAX_VOLUME, MIN_PITCH, PATTERNS_PER_TRACK, SampleBuffer,
    SoundSource, Track, TrackId, VARIATIONS_PER_TRACK, VariationPreset,
};
pub use transport::{
    DEFAULT_BPM, MAX_BPM, MIN_BPM, ScheduledStep, StepClock, TransportState, quantize_step,
    sanitize_bpm, seconds_per_step,
};
