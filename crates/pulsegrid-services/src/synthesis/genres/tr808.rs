//! TR-808: long sine booms, bridged-T toms, six-square metal

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
    .register(Genre::Tr808, table);
}

fn kick(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(50.0, 15.0);
    let decay = ctx.pick([0.35, 0.18, 0.7, 0.4]);
    let mut layer = body(Waveform::Sine, FreqEnv::exp(base * 2.6, base, 0.03), decay);
    if ctx.variant.index() == 3 {
        layer = layer.drive(ctx.bank.drive_curve(), 2.5);
    }
    let mut voice = ctx.voice().with(layer);
    if ctx.variant.index() == 1 {
        voice.add(click(1_800.0, 0.002, 0.3));
    }
    voice
}

fn snare(ctx: &RecipeContext<'_>) -> Voice {
    let tone_decay = ctx.pick([0.04, 0.03, 0.06, 0.04]);
    let color = ctx.pick([NoiseColor::White, NoiseColor::White, NoiseColor::Pink, NoiseColor::White]);
    let mut snap = noise_burst(ctx, color, FilterMode::Bandpass, 1_800.0, 0.9, ctx.pick([0.09, 0.06, 0.14, 0.1]));
    if ctx.variant.index() == 3 {
        snap = snap.drive(ctx.bank.drive_curve(), 2.0);
    }
    ctx.voice()
        .with(body(Waveform::Sine, FreqEnv::fixed(ctx.tuned(180.0, 30.0)), tone_decay).level(0.5))
        .with(body(Waveform::Sine, FreqEnv::fixed(ctx.tuned(330.0, 40.0)), tone_decay * 0.8).level(0.3))
        .with(snap.level(0.7))
}

fn clap(ctx: &RecipeContext<'_>) -> Voice {
    let tail = ctx.pick([0.12, 0.08, 0.2, 0.12]);
    let cutoff = ctx.tuned(1_100.0, 200.0);
    clap_voice(ctx, 4, 0.011, cutoff, 1.2, tail)
}

fn hat(ctx: &RecipeContext<'_>, decay: f32) -> Voice {
    let base = ctx.tuned(205.3, 40.0);
    let mut voice = ctx.voice().with(metal(base, 6, 7_000.0, decay).level(0.6));
    if ctx.variant.index() == 3 {
        voice.add(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 9_000.0, 0.7, decay * 0.6).level(0.3));
    }
    voice
}

fn closed_hat(ctx: &RecipeContext<'_>) -> Voice {
    hat(ctx, ctx.pick([0.035, 0.02, 0.06, 0.04]))
}

fn open_hat(ctx: &RecipeContext<'_>) -> Voice {
    hat(ctx, ctx.pick([0.25, 0.15, 0.45, 0.3]))
}

fn tom(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(130.0, 40.0);
    let waveform = ctx.pick([Waveform::Sine, Waveform::Sine, Waveform::Triangle, Waveform::Sine]);
    ctx.voice()
        .with(body(waveform, FreqEnv::exp(base * 1.3, base, 0.06), ctx.pick([0.25, 0.15, 0.4, 0.3])))
        .with(noise_burst(ctx, NoiseColor::Pink, FilterMode::Lowpass, 2_000.0, 0.7, 0.02).level(0.1))
}

fn rim(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice()
        .with(body(Waveform::Sine, FreqEnv::fixed(ctx.tuned(1_700.0, 200.0)), 0.01).level(0.5))
        .with(
            Layer::osc(Waveform::Triangle, FreqEnv::fixed(ctx.tuned(480.0, 60.0)))
                .filter(FilterMode::Highpass, 300.0, 0.7)
                .env(AmpEnv::perc(ctx.pick([0.02, 0.012, 0.035, 0.02])))
                .level(0.6),
        )
}

fn cowbell(ctx: &RecipeContext<'_>) -> Voice {
    let shift = ctx.pitch * 60.0;
    let freqs = [(540.0 + shift).max(40.0), (800.0 + shift).max(60.0)];
    ctx.voice().with(
        Layer::metal(&freqs)
            .filter(FilterMode::Bandpass, 900.0, 1.5)
            .env(AmpEnv::new(0.0, 0.005, ctx.pick([0.08, 0.05, 0.15, 0.1])))
            .level(0.8),
    )
}

fn cymbal(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([1.0, 0.6, 1.6, 1.2]);
    let base = ctx.tuned(205.3, 40.0) * 1.5;
    ctx.voice()
        .with(metal(base, 6, 6_000.0, decay).level(0.5))
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 8_000.0, 0.7, decay * 0.7).level(0.25))
}

fn bass(ctx: &RecipeContext<'_>) -> Voice {
    let note = ctx.melodic(55.0);
    let mut layer = Layer::osc(Waveform::Sine, FreqEnv::exp(note * 1.5, note, 0.02))
        .env(AmpEnv::new(0.002, 0.1, ctx.pick([0.5, 0.3, 0.9, 0.6])));
    if ctx.variant.index() == 3 {
        layer = layer.drive(ctx.bank.drive_curve(), 3.0);
    }
    ctx.voice().with(layer)
}
