//! Recipe families, one module per emulated drum machine
//!
//! Every module registers a recipe for each `InstrumentRole`. Recipes branch
//! on the variant for decay, drive, noise color and oscillator shape; the
//! helpers here cover the building blocks they share.

mod cr78;
mod rave;
mod tr707;
mod tr808;
mod tr909;

use pulsegrid_core::InstrumentRole;

use super::dispatch::{RecipeContext, RecipeFn, RecipeTable};
use super::filter::FilterMode;
use super::voice::{AmpEnv, FreqEnv, Layer, Voice, Waveform};
use crate::noise_bank::NoiseColor;

/// Inharmonic square ratios of the classic six-oscillator metal circuit
const METAL_RATIOS: [f32; 6] = [1.0, 1.4827, 1.8002, 2.5460, 2.6303, 3.8966];

pub(crate) fn recipe_table() -> RecipeTable {
    let mut table = RecipeTable::new();
    tr808::register(&mut table);
    tr909::register(&mut table);
    tr707::register(&mut table);
    cr78::register(&mut table);
    rave::register(&mut table);
    table
}

/// Recipes for one genre, in `InstrumentRole::ALL` order
struct Family {
    kick: RecipeFn,
    snare: RecipeFn,
    clap: RecipeFn,
    closed_hat: RecipeFn,
    open_hat: RecipeFn,
    tom: RecipeFn,
    rim: RecipeFn,
    cowbell: RecipeFn,
    cymbal: RecipeFn,
    bass: RecipeFn,
}

impl Family {
    fn get(&self, role: InstrumentRole) -> RecipeFn {
        match role {
            InstrumentRole::Kick => self.kick,
            InstrumentRole::Snare => self.snare,
            InstrumentRole::Clap => self.clap,
            InstrumentRole::ClosedHat => self.closed_hat,
            InstrumentRole::OpenHat => self.open_hat,
            InstrumentRole::Tom => self.tom,
            InstrumentRole::Rim => self.rim,
            InstrumentRole::Cowbell => self.cowbell,
            InstrumentRole::Cymbal => self.cymbal,
            InstrumentRole::Bass => self.bass,
        }
    }

    fn register(&self, genre: pulsegrid_core::Genre, table: &mut RecipeTable) {
        for role in InstrumentRole::ALL {
            table.insert((genre, role), self.get(role));
        }
    }
}

/// Pitched body with an amplitude decay
fn body(waveform: Waveform, freq: FreqEnv, decay: f32) -> Layer {
    Layer::osc(waveform, freq).env(AmpEnv::perc(decay))
}

/// Short high transient layered on the attack
fn click(freq: f32, decay: f32, level: f32) -> Layer {
    Layer::osc(Waveform::Square, FreqEnv::fixed(freq))
        .filter(FilterMode::Highpass, freq * 0.5, 0.7)
        .env(AmpEnv::perc(decay))
        .level(level)
}

/// Filtered noise with its own decay
fn noise_burst(
    ctx: &RecipeContext<'_>,
    color: NoiseColor,
    mode: FilterMode,
    cutoff: f32,
    q: f32,
    decay: f32,
) -> Layer {
    ctx.noise(color).filter(mode, cutoff, q).env(AmpEnv::perc(decay))
}

/// `count` detuned squares (at most six) through a highpass
fn metal(base: f32, count: usize, cutoff: f32, decay: f32) -> Layer {
    let freqs: Vec<f32> = METAL_RATIOS.iter().take(count.clamp(1, 6)).map(|r| r * base).collect();
    Layer::metal(&freqs)
        .filter(FilterMode::Highpass, cutoff, 0.8)
        .env(AmpEnv::perc(decay))
}

/// Hand clap: `bursts` short noise hits `spacing` apart, then a diffuse tail
fn clap(
    ctx: &RecipeContext<'_>,
    bursts: usize,
    spacing: f32,
    cutoff: f32,
    q: f32,
    tail: f32,
) -> Voice {
    let mut voice = ctx.voice();
    for i in 0..bursts {
        voice.add(
            noise_burst(ctx, NoiseColor::White, FilterMode::Bandpass, cutoff, q, 0.006)
                .delay(i as f32 * spacing)
                .level(0.9),
        );
    }
    voice.add(
        noise_burst(ctx, NoiseColor::White, FilterMode::Bandpass, cutoff * 0.9, q * 0.7, tail)
            .delay(bursts as f32 * spacing)
            .level(0.7),
    );
    voice
}
