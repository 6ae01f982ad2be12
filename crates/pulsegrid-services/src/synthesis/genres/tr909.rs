//! TR-909: clicky driven kick, noisy snare, bright hats, acid bass

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
    .register(Genre::Tr909, table);
}

fn kick(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(55.0, 18.0);
    let drive = ctx.pick([1.5, 2.5, 1.2, 4.0]);
    let decay = ctx.pick([0.22, 0.15, 0.35, 0.25]);
    ctx.voice()
        .with(
            body(Waveform::Sine, FreqEnv::exp(base * 4.7, base, 0.02), decay)
                .drive(ctx.bank.drive_curve(), drive),
        )
        .with(click(3_000.0, 0.003, 0.35))
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Lowpass, 5_000.0, 0.7, 0.004).level(0.3))
}

fn snare(ctx: &RecipeContext<'_>) -> Voice {
    let noise_decay = ctx.pick([0.12, 0.08, 0.2, 0.15]);
    let mut noise = noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 2_000.0, 0.7, noise_decay);
    if ctx.variant.index() == 3 {
        noise = noise.drive(ctx.bank.drive_curve(), 2.5);
    }
    ctx.voice()
        .with(body(Waveform::Triangle, FreqEnv::exp(ctx.tuned(260.0, 40.0), ctx.tuned(185.0, 30.0), 0.015), 0.05).level(0.5))
        .with(body(Waveform::Triangle, FreqEnv::fixed(ctx.tuned(330.0, 40.0)), 0.04).level(0.3))
        .with(noise.level(0.6))
}

fn clap(ctx: &RecipeContext<'_>) -> Voice {
    let tail = ctx.pick([0.15, 0.1, 0.25, 0.15]);
    let bursts = ctx.pick([3, 3, 4, 5]);
    clap_voice(ctx, bursts, 0.009, ctx.tuned(1_300.0, 200.0), 1.0, tail)
}

fn hat(ctx: &RecipeContext<'_>, decay: f32) -> Voice {
    let base = ctx.tuned(205.3, 40.0) * 1.3;
    let color = ctx.pick([NoiseColor::White, NoiseColor::White, NoiseColor::Pink, NoiseColor::White]);
    ctx.voice()
        .with(metal(base, 6, 8_000.0, decay).level(0.4))
        .with(noise_burst(ctx, color, FilterMode::Highpass, 9_000.0, 0.7, decay).level(0.35))
}

fn closed_hat(ctx: &RecipeContext<'_>) -> Voice {
    hat(ctx, ctx.pick([0.03, 0.018, 0.05, 0.035]))
}

fn open_hat(ctx: &RecipeContext<'_>) -> Voice {
    hat(ctx, ctx.pick([0.3, 0.18, 0.5, 0.35]))
}

fn tom(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(110.0, 35.0);
    ctx.voice()
        .with(body(Waveform::Sine, FreqEnv::exp(base * 2.0, base, 0.04), ctx.pick([0.2, 0.12, 0.35, 0.25])))
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Bandpass, 1_500.0, 0.8, 0.03).level(0.2))
}

fn rim(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice()
        .with(body(Waveform::Sine, FreqEnv::fixed(ctx.tuned(500.0, 80.0)), 0.012).level(0.6))
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Bandpass, 3_000.0, 1.2, ctx.pick([0.008, 0.005, 0.015, 0.01])).level(0.5))
}

fn cowbell(ctx: &RecipeContext<'_>) -> Voice {
    let shift = ctx.pitch * 70.0;
    let freqs = [(587.0 + shift).max(40.0), (845.0 + shift).max(60.0)];
    ctx.voice().with(
        Layer::metal(&freqs)
            .filter(FilterMode::Bandpass, 1_000.0, 1.4)
            .env(AmpEnv::new(0.0, 0.004, ctx.pick([0.07, 0.045, 0.12, 0.09])))
            .level(0.8),
    )
}

fn cymbal(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([1.4, 0.8, 2.0, 1.4]);
    ctx.voice()
        .with(metal(ctx.tuned(205.3, 40.0) * 1.8, 6, 7_000.0, decay).level(0.35))
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 7_500.0, 0.7, decay).level(0.35))
}

/// Resonant saw with a closing filter sweep
fn bass(ctx: &RecipeContext<'_>) -> Voice {
    let note = ctx.melodic(55.0);
    let waveform = ctx.pick([Waveform::Saw, Waveform::Saw, Waveform::Saw, Waveform::Square]);
    let open = ctx.pick([2_000.0, 1_200.0, 3_500.0, 2_500.0]);
    ctx.voice().with(
        Layer::osc(waveform, FreqEnv::fixed(note))
            .sweep_filter(FilterMode::Lowpass, FreqEnv::exp(open, 300.0, 0.08), 2.0)
            .env(AmpEnv::new(0.002, 0.05, ctx.pick([0.3, 0.18, 0.5, 0.3])))
            .level(0.7),
    )
}
