//! CR-78: soft preset-box sounds, heavily lowpassed, short noise hats

use pulsegrid_core::Genre;

use crate::noise_bank::NoiseColor;
use crate::synthesis::dispatch::{RecipeContext, RecipeTable};
use crate::synthesis::filter::FilterMode;
use crate::synthesis::voice::{AmpEnv, FreqEnv, Layer, Voice, Waveform};

use super::{Family, body, clap as clap_voice, noise_burst};

pub(super) fn register(table: &mut RecipeTable) {
    Family {
        kick,
        snare,
        clap,
        closed_hat,
        open_hat,
        tom,
        rim,
        cowbell,
        cymbal,
        bass,
    }
    .register(Genre::Cr78, table);
}

fn kick(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(68.0, 15.0);
    ctx.voice().with(
        body(Waveform::Sine, FreqEnv::exp(base * 1.3, base, 0.01), ctx.pick([0.15, 0.1, 0.25, 0.18]))
            .filter(FilterMode::Lowpass, 400.0, 0.7),
    )
}

fn snare(ctx: &RecipeContext<'_>) -> Voice {
    let color = ctx.pick([NoiseColor::Pink, NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown]);
    ctx.voice()
        .with(body(Waveform::Sine, FreqEnv::fixed(ctx.tuned(210.0, 30.0)), 0.03).level(0.5))
        .with(noise_burst(ctx, color, FilterMode::Lowpass, 5_000.0, 0.7, ctx.pick([0.06, 0.04, 0.1, 0.07])).level(0.6))
}

fn clap(ctx: &RecipeContext<'_>) -> Voice {
    clap_voice(ctx, 3, 0.014, ctx.tuned(1_000.0, 150.0), 0.9, ctx.pick([0.08, 0.05, 0.12, 0.08]))
}

fn closed_hat(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice().with(
        noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 5_000.0, 0.9, ctx.pick([0.02, 0.012, 0.035, 0.025]))
            .level(0.5),
    )
}

fn open_hat(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice().with(
        noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 5_000.0, 0.9, ctx.pick([0.15, 0.1, 0.25, 0.18]))
            .level(0.45),
    )
}

fn tom(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(170.0, 40.0);
    ctx.voice().with(
        body(Waveform::Sine, FreqEnv::exp(base * 1.15, base, 0.05), ctx.pick([0.2, 0.12, 0.3, 0.22]))
            .filter(FilterMode::Lowpass, 900.0, 0.7),
    )
}

/// Wooden "guiro"-ish rim from a bandpassed triangle
fn rim(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice().with(
        Layer::osc(Waveform::Triangle, FreqEnv::fixed(ctx.tuned(1_100.0, 120.0)))
            .filter(FilterMode::Bandpass, 1_200.0, 1.5)
            .env(AmpEnv::perc(ctx.pick([0.012, 0.008, 0.02, 0.012])))
            .level(0.8),
    )
}

fn cowbell(ctx: &RecipeContext<'_>) -> Voice {
    let freq = ctx.tuned(800.0, 80.0);
    ctx.voice().with(
        Layer::osc(Waveform::Triangle, FreqEnv::fixed(freq))
            .fm(1.48, ctx.pick([0.3, 0.2, 0.5, 0.8]))
            .env(AmpEnv::perc(ctx.pick([0.06, 0.04, 0.1, 0.06])))
            .level(0.6),
    )
}

fn cymbal(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([0.6, 0.4, 0.9, 0.7]);
    ctx.voice().with(
        noise_burst(ctx, NoiseColor::White, FilterMode::Bandpass, 7_000.0, 0.6, decay).level(0.5),
    )
}

fn bass(ctx: &RecipeContext<'_>) -> Voice {
    let note = ctx.melodic(55.0);
    ctx.voice().with(
        Layer::osc(Waveform::Triangle, FreqEnv::fixed(note))
            .env(AmpEnv::new(0.004, 0.06, ctx.pick([0.3, 0.2, 0.5, 0.35])))
            .level(0.8),
    )
}
