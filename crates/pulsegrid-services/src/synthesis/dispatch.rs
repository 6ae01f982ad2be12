//! Recipe table and dispatch into a destination

use std::collections::HashMap;
use std::sync::Arc;

use pulsegrid_core::{EffectiveParams, Genre, InstrumentRole, Track, Variant};
use tracing::warn;

use super::genres;
use super::sample::sample_voice;
use super::voice::{AmpEnv, FreqEnv, Layer, Voice, Waveform};
use crate::noise_bank::{NoiseBank, NoiseColor};

/// Lowest oscillator frequency a recipe may be tuned down to
pub const MIN_FREQ: f32 = 8.0;

/// Inputs every recipe receives
pub struct RecipeContext<'a> {
    pub sample_rate: f32,
    pub bank: &'a NoiseBank,
    pub variant: Variant,
    /// Pitch in octaves from the resolved track parameters
    pub pitch: f32,
    /// Start offset into the shared noise buffers
    pub noise_offset: usize,
}

impl RecipeContext<'_> {
    /// Percussion tuning: shift `base` by `hz_per_octave` for each octave of pitch
    pub fn tuned(&self, base: f32, hz_per_octave: f32) -> f32 {
        (base + self.pitch * hz_per_octave).max(MIN_FREQ)
    }

    /// Melodic tuning: scale `base` by `2^pitch`
    pub fn melodic(&self, base: f32) -> f32 {
        (base * self.pitch.exp2()).max(MIN_FREQ)
    }

    /// Pick the value for the current variant
    pub fn pick<T: Copy>(&self, options: [T; Variant::COUNT]) -> T {
        options[self.variant.index()]
    }

    pub fn noise(&self, color: NoiseColor) -> Layer {
        Layer::noise(self.bank.noise(color), self.noise_offset)
    }

    pub fn voice(&self) -> Voice {
        Voice::new(self.sample_rate)
    }
}

pub type RecipeFn = fn(&RecipeContext<'_>) -> Voice;
pub type RecipeTable = HashMap<(Genre, InstrumentRole), RecipeFn>;

/// Where a freshly built voice is sent
pub trait Destination {
    fn sample_rate(&self) -> f32;
    /// Start `voice` at `time` seconds on the destination's clock
    fn connect(&mut self, time: f64, voice: Voice);
}

/// Renders voices straight into a mono buffer
#[derive(Debug, Clone)]
pub struct OfflineBuffer {
    samples: Vec<f32>,
    sample_rate: f32,
    origin: f64,
}

impl OfflineBuffer {
    pub fn new(seconds: f64, sample_rate: f32) -> Self {
        let len = (seconds.max(0.0) * sample_rate as f64).round() as usize;
        Self { samples: vec![0.0; len], sample_rate, origin: 0.0 }
    }

    /// Time that maps to the first sample
    pub fn with_origin(mut self, origin: f64) -> Self {
        self.origin = origin;
        self
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

impl Destination for OfflineBuffer {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn connect(&mut self, time: f64, mut voice: Voice) {
        let offset = ((time - self.origin) * self.sample_rate as f64).round();
        if offset < 0.0 || offset as usize >= self.samples.len() {
            return;
        }
        voice.render_add(&mut self.samples[offset as usize..]);
    }
}

/// The recipe table plus the shared bank it draws from
pub struct SynthLibrary {
    table: RecipeTable,
    bank: Arc<NoiseBank>,
}

impl SynthLibrary {
    pub fn new(bank: Arc<NoiseBank>) -> Self {
        Self { table: genres::recipe_table(), bank }
    }

    pub fn bank(&self) -> &Arc<NoiseBank> {
        &self.bank
    }

    pub fn recipe(&self, genre: Genre, role: InstrumentRole) -> Option<RecipeFn> {
        self.table.get(&(genre, role)).copied()
    }

    /// Build the voice for a (role, genre, variant) at the given pitch
    pub fn build(
        &self,
        role: InstrumentRole,
        genre: Genre,
        variant: Variant,
        pitch: f32,
        time: f64,
        sample_rate: f32,
    ) -> Voice {
        let ctx = RecipeContext {
            sample_rate,
            bank: &self.bank,
            variant,
            pitch,
            noise_offset: (time.max(0.0) * sample_rate as f64) as usize * 31,
        };
        match self.recipe(genre, role) {
            Some(recipe) => recipe(&ctx),
            None => {
                warn!(%genre, %role, "No recipe registered; using 808 kit");
                match self.recipe(Genre::Tr808, role) {
                    Some(recipe) => recipe(&ctx),
                    None => ctx.voice(),
                }
            }
        }
    }

    pub fn dispatch(
        &self,
        role: InstrumentRole,
        genre: Genre,
        variant: Variant,
        pitch: f32,
        time: f64,
        dest: &mut dyn Destination,
    ) {
        let voice = self.build(role, genre, variant, pitch, time, dest.sample_rate());
        dest.connect(time, voice);
    }

    /// Voice a track with resolved parameters: its custom sample if one is
    /// assigned, otherwise the recipe for its sound source
    pub fn trigger_track(
        &self,
        track: &Track,
        params: &EffectiveParams,
        session_genre: Genre,
        time: f64,
        dest: &mut dyn Destination,
    ) {
        if let Some(sample) = &track.sample {
            let voice = sample_voice(sample, params.pitch, dest.sample_rate());
            dest.connect(time, voice);
            return;
        }
        let (genre, role) = track.sound_source(session_genre);
        self.dispatch(role, genre, Variant::new(params.variation), params.pitch, time, dest);
    }

    /// Metronome click, higher and louder on the downbeat
    pub fn click(&self, accent: bool, sample_rate: f32) -> Voice {
        let (freq, level) = if accent { (1_600.0, 0.5) } else { (1_100.0, 0.3) };
        Voice::new(sample_rate).with(
            Layer::osc(Waveform::Sine, FreqEnv::fixed(freq))
                .env(AmpEnv::perc(0.012))
                .level(level),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsegrid_core::{CustomSample, SampleBuffer, TrackId};

    fn library() -> SynthLibrary {
        SynthLibrary::new(Arc::new(NoiseBank::new(22_050, 0.2)))
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_every_pair_has_a_recipe() {
        let lib = library();
        for genre in Genre::ALL {
            for role in InstrumentRole::ALL {
                assert!(lib.recipe(genre, role).is_some(), "{genre} / {role}");
            }
        }
    }

    #[test]
    fn test_every_recipe_sounds_and_stops() {
        let lib = library();
        for genre in Genre::ALL {
            for role in InstrumentRole::ALL {
                for v in 0..Variant::COUNT {
                    let voice = lib.build(role, genre, Variant::new(v), 0.0, 0.0, 22_050.0);
                    let secs = voice.duration_secs();
                    assert!(secs > 0.0 && secs < 10.0, "{genre}/{role}/{v}: {secs}");

                    let mut dest = OfflineBuffer::new(secs + 0.1, 22_050.0);
                    dest.connect(0.0, voice);
                    let p = peak(dest.samples());
                    assert!(p > 0.01, "{genre}/{role}/{v} is silent");
                    assert!(p.is_finite() && p < 8.0, "{genre}/{role}/{v} peak {p}");
                }
            }
        }
    }

    #[test]
    fn test_variants_differ() {
        let lib = library();
        let a = lib.build(InstrumentRole::Kick, Genre::Tr808, Variant::new(0), 0.0, 0.0, 22_050.0);
        let b = lib.build(InstrumentRole::Kick, Genre::Tr808, Variant::new(2), 0.0, 0.0, 22_050.0);
        assert_ne!(a.len_frames(), b.len_frames());
    }

    #[test]
    fn test_percussion_pitch_is_additive() {
        let bank = NoiseBank::new(22_050, 0.2);
        let mut ctx = RecipeContext {
            sample_rate: 22_050.0,
            bank: &bank,
            variant: Variant::default(),
            pitch: 1.0,
            noise_offset: 0,
        };
        assert_eq!(ctx.tuned(100.0, 30.0), 130.0);
        assert_eq!(ctx.melodic(100.0), 200.0);
        ctx.pitch = -3.0;
        assert_eq!(ctx.tuned(50.0, 30.0), MIN_FREQ);
    }

    #[test]
    fn test_offline_buffer_offsets_by_time() {
        let lib = library();
        let mut dest = OfflineBuffer::new(0.5, 22_050.0).with_origin(1.0);
        lib.dispatch(InstrumentRole::Kick, Genre::Tr909, Variant::default(), 0.0, 1.25, &mut dest);
        let start = (0.25 * 22_050.0) as usize;
        assert!(dest.samples()[..start].iter().all(|s| *s == 0.0));
        assert!(peak(&dest.samples()[start..]) > 0.1);

        // Voices before the origin are dropped
        let mut early = OfflineBuffer::new(0.5, 22_050.0).with_origin(1.0);
        lib.dispatch(InstrumentRole::Kick, Genre::Tr909, Variant::default(), 0.0, 0.5, &mut early);
        assert_eq!(peak(early.samples()), 0.0);
    }

    #[test]
    fn test_custom_sample_bypasses_recipes() {
        let lib = library();
        let mut track = Track::new(TrackId(1), InstrumentRole::Kick, "Kick");
        let buffer = SampleBuffer::new(vec![0.25; 22_050], 22_050);
        track.sample = Some(CustomSample::new(buffer, 0.0, 0.5, false));
        let params = pulsegrid_core::resolve(&track, track.pattern(), 0);

        let mut dest = OfflineBuffer::new(1.0, 22_050.0);
        lib.trigger_track(&track, &params, Genre::Tr808, 0.0, &mut dest);
        let s = dest.samples();
        assert!((s[5_000] - 0.25).abs() < 1e-6);
        assert!(s[11_100..].iter().all(|x| *x == 0.0));
    }
}
