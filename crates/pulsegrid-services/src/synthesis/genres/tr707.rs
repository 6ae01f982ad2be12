//! TR-707: short, tight and bright; triangle bodies and little sustain

use pulsegrid_core::Genre;

use crate::noise_bank::NoiseColor;
use crate::synthesis::dispatch::{RecipeContext, RecipeTable};
use crate::synthesis::filter::FilterMode;
use crate::synthesis::voice::{AmpEnv, FreqEnv, Layer, Voice, Waveform};

use super::{Family, body, clap as clap_voice, click, metal, noise_burst};

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
    .register(Genre::Tr707, table);
}

fn kick(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(58.0, 16.0);
    let waveform = ctx.pick([Waveform::Sine, Waveform::Sine, Waveform::Triangle, Waveform::Sine]);
    let mut voice = ctx
        .voice()
        .with(body(waveform, FreqEnv::exp(base * 2.2, base, 0.015), ctx.pick([0.2, 0.12, 0.3, 0.22])))
        .with(click(2_400.0, 0.0015, 0.25));
    if ctx.variant.index() == 3 {
        voice.add(noise_burst(ctx, NoiseColor::Pink, FilterMode::Lowpass, 1_200.0, 0.7, 0.01).level(0.3));
    }
    voice
}

fn snare(ctx: &RecipeContext<'_>) -> Voice {
    let snappy = ctx.pick([0.5, 0.35, 0.7, 0.9]);
    ctx.voice()
        .with(body(Waveform::Triangle, FreqEnv::fixed(ctx.tuned(200.0, 30.0)), 0.035).level(0.5))
        .with(
            noise_burst(ctx, NoiseColor::White, FilterMode::Bandpass, 2_500.0, 0.8, ctx.pick([0.07, 0.05, 0.1, 0.08]))
                .level(snappy),
        )
}

fn clap(ctx: &RecipeContext<'_>) -> Voice {
    clap_voice(ctx, 2, 0.012, ctx.tuned(1_500.0, 200.0), 1.3, ctx.pick([0.1, 0.07, 0.16, 0.1]))
}

fn closed_hat(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([0.025, 0.015, 0.04, 0.03]);
    ctx.voice()
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 9_000.0, 0.8, decay).level(0.5))
        .with(metal(ctx.tuned(300.0, 50.0), 3, 8_000.0, decay).level(0.3))
}

fn open_hat(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([0.2, 0.12, 0.35, 0.25]);
    ctx.voice()
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 8_500.0, 0.8, decay).level(0.45))
        .with(metal(ctx.tuned(300.0, 50.0), 3, 7_500.0, decay).level(0.3))
}

fn tom(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(150.0, 45.0);
    ctx.voice().with(body(Waveform::Triangle, FreqEnv::exp(base * 1.5, base, 0.03), ctx.pick([0.18, 0.1, 0.28, 0.2])))
}

fn rim(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice().with(
        Layer::osc(Waveform::Square, FreqEnv::fixed(ctx.tuned(820.0, 100.0)))
            .filter(FilterMode::Bandpass, 1_600.0, 2.0)
            .env(AmpEnv::perc(ctx.pick([0.015, 0.01, 0.025, 0.015])))
            .level(0.7),
    )
}

fn cowbell(ctx: &RecipeContext<'_>) -> Voice {
    let shift = ctx.pitch * 70.0;
    let freqs = [(560.0 + shift).max(40.0), (835.0 + shift).max(60.0)];
    ctx.voice().with(
        Layer::metal(&freqs)
            .filter(FilterMode::Bandpass, 950.0, 1.8)
            .env(AmpEnv::perc(ctx.pick([0.06, 0.04, 0.1, 0.07])))
            .level(0.8),
    )
}

fn cymbal(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([0.9, 0.5, 1.3, 1.0]);
    ctx.voice()
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 6_500.0, 0.7, decay).level(0.45))
        .with(metal(ctx.tuned(250.0, 40.0), 4, 5_000.0, decay * 0.5).level(0.25))
}

fn bass(ctx: &RecipeContext<'_>) -> Voice {
    let note = ctx.melodic(55.0);
    let waveform = ctx.pick([Waveform::Square, Waveform::Triangle, Waveform::Square, Waveform::Saw]);
    ctx.voice().with(
        Layer::osc(waveform, FreqEnv::fixed(note))
            .filter(FilterMode::Lowpass, ctx.pick([900.0, 600.0, 1_400.0, 1_100.0]), 1.0)
            .env(AmpEnv::new(0.002, 0.08, ctx.pick([0.25, 0.15, 0.45, 0.3])))
            .level(0.6),
    )
}
