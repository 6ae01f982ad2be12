//! Error types for pulsegrid

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseGridError {
    #[error("Track not found: {0}")]
    TrackNotFound(u64),
    #[error("Unknown genre: {0}")]
    UnknownGenre(String),
    #[error("Unknown automation key: {0}")]
    UnknownParamKey(String),
    #[error("Unknown preset pattern: {0}")]
    UnknownPreset(String),
    #[error("Step out of range: {0}")]
    StepOutOfRange(usize),
    #[error("Pattern slot out of range: {0}")]
    PatternOutOfRange(usize),
    #[error("Variation slot out of range: {0}")]
    VariationOutOfRange(usize),
    #[error("Scene out of range: {0}")]
    SceneOutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, PulseGridError>;
