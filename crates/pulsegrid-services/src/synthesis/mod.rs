//! Instrument synthesis library
//!
//! Recipes are plain functions keyed by `(Genre, InstrumentRole)` in a table
//! built once per engine. Each call returns a fresh `Voice` that the caller
//! hands to a `Destination`.

mod dispatch;
mod filter;
mod genres;
mod sample;
mod voice;

pub use dispatch::{
    Destination, MIN_FREQ, OfflineBuffer, RecipeContext, RecipeFn, RecipeTable, SynthLibrary,
};
pub use filter::FilterMode;
pub use sample::{SAMPLE_FADE_SECS, SampleRegion, sample_voice};
pub use voice::{AmpEnv, FreqEnv, Layer, Sweep, Voice, Waveform};
