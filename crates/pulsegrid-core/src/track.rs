//! Track representation

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::effects::EffectSet;
use crate::error::{PulseGridError, Result};
use crate::genre::{Genre, InstrumentRole};
use crate::pattern::Pattern;

/// Patterns held by every track
pub const PATTERNS_PER_TRACK: usize = 4;
/// Variation preset slots per track
pub const VARIATIONS_PER_TRACK: usize = 4;

pub const MAX_VOLUME: f32 = 2.0;
pub const MIN_PITCH: f32 = -3.0;
pub const MAX_PITCH: f32 = 3.0;

/// Unique identifier for tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// Decoded mono audio shared between the session, the mixer and previews
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub data: Arc<[f32]>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> Self {
        Self { data: data.into(), sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }
}

/// User sample assigned to a track, with its trim window
#[derive(Debug, Clone)]
pub struct CustomSample {
    pub buffer: SampleBuffer,
    /// Trim start as a fraction of the buffer (0.0-1.0)
    pub trim_start: f32,
    /// Trim end as a fraction of the buffer (0.0-1.0)
    pub trim_end: f32,
    /// Stored and toggled, but playback always scales rate by `2^pitch`
    pub pitch_lock: bool,
}

impl CustomSample {
    /// Clamp the trim fractions to 0-1 and order them
    pub fn new(buffer: SampleBuffer, trim_start: f32, trim_end: f32, pitch_lock: bool) -> Self {
        let a = trim_start.clamp(0.0, 1.0);
        let b = trim_end.clamp(0.0, 1.0);
        Self {
            buffer,
            trim_start: a.min(b),
            trim_end: a.max(b),
            pitch_lock,
        }
    }

    /// Length of the trimmed region in seconds at the original rate
    pub fn trimmed_secs(&self) -> f64 {
        (self.trim_end - self.trim_start) as f64 * self.buffer.duration_secs()
    }

    /// Audible length when played back at `2^pitch`
    pub fn playback_secs(&self, pitch: f32) -> f64 {
        self.trimmed_secs() / 2.0_f64.powf(pitch as f64)
    }
}

/// Replaces the kit sound a track would otherwise get from its role and the session genre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundSource {
    /// `None` follows the session genre
    pub genre: Option<Genre>,
    pub role: InstrumentRole,
}

/// Snapshot of the mix parameters, recallable per pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariationPreset {
    pub volume: f32,
    pub pan: f32,
    pub pitch: f32,
    pub effects: EffectSet,
}

/// A sequencer track (one pad)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub role: InstrumentRole,
    /// Display color (0xRRGGBB)
    pub color: u32,
    pub muted: bool,
    /// Linear gain (0.0 to 2.0)
    pub volume: f32,
    /// Pan (-1.0 left, 0.0 center, 1.0 right)
    pub pan: f32,
    /// Pitch in octaves (-3.0 to 3.0)
    pub pitch: f32,
    pub effects: EffectSet,
    pub variations: [Option<VariationPreset>; VARIATIONS_PER_TRACK],
    #[serde(skip)]
    pub sample: Option<CustomSample>,
    pub source: Option<SoundSource>,
    pub patterns: [Pattern; PATTERNS_PER_TRACK],
    pub active_pattern: usize,
}

impl Track {
    pub fn new(id: TrackId, role: InstrumentRole, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            color: role.color(),
            muted: false,
            volume: 0.8,
            pan: 0.0,
            pitch: 0.0,
            effects: EffectSet::new(),
            variations: [None; VARIATIONS_PER_TRACK],
            sample: None,
            source: None,
            patterns: std::array::from_fn(|_| Pattern::new()),
            active_pattern: 0,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.patterns[self.active_pattern]
    }

    pub fn pattern_mut(&mut self) -> &mut Pattern {
        &mut self.patterns[self.active_pattern]
    }

    pub fn set_active_pattern(&mut self, index: usize) -> Result<()> {
        if index >= PATTERNS_PER_TRACK {
            return Err(PulseGridError::PatternOutOfRange(index));
        }
        self.active_pattern = index;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
    }

    /// Store the current mix parameters into a variation slot
    pub fn capture_variation(&mut self, index: usize) -> Result<()> {
        let slot = self
            .variations
            .get_mut(index)
            .ok_or(PulseGridError::VariationOutOfRange(index))?;
        *slot = Some(VariationPreset {
            volume: self.volume,
            pan: self.pan,
            pitch: self.pitch,
            effects: self.effects,
        });
        Ok(())
    }

    pub fn clear_variation(&mut self, index: usize) -> Result<()> {
        let slot = self
            .variations
            .get_mut(index)
            .ok_or(PulseGridError::VariationOutOfRange(index))?;
        *slot = None;
        Ok(())
    }

    pub fn variation(&self, index: usize) -> Option<&VariationPreset> {
        self.variations.get(index).and_then(Option::as_ref)
    }

    /// Genre and role that should voice this track under the given session genre
    pub fn sound_source(&self, session_genre: Genre) -> (Genre, InstrumentRole) {
        match self.source {
            Some(source) => (source.genre.unwrap_or(session_genre), source.role),
            None => (session_genre, self.role),
        }
    }
}
