//! Rave: distorted gabber kicks, crunchy snares and the hoover bass

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
    .register(Genre::Rave, table);
}

/// Gabber kick: steep sweep pushed hard into the drive curve
fn kick(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(52.0, 18.0);
    let drive = ctx.pick([6.0, 4.0, 9.0, 12.0]);
    ctx.voice()
        .with(
            body(Waveform::Sine, FreqEnv::exp(base * 7.5, base, 0.04), ctx.pick([0.4, 0.25, 0.6, 0.45]))
                .drive(ctx.bank.drive_curve(), drive)
                .level(0.8),
        )
        .with(click(4_000.0, 0.002, 0.3))
}

fn snare(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice()
        .with(
            body(Waveform::Saw, FreqEnv::exp(ctx.tuned(320.0, 40.0), ctx.tuned(200.0, 30.0), 0.02), 0.05)
                .drive(ctx.bank.drive_curve(), 3.0)
                .level(0.4),
        )
        .with(
            noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 1_500.0, 0.7, ctx.pick([0.14, 0.09, 0.22, 0.16]))
                .drive(ctx.bank.drive_curve(), ctx.pick([2.0, 1.5, 2.5, 5.0]))
                .level(0.6),
        )
}

fn clap(ctx: &RecipeContext<'_>) -> Voice {
    let mut voice = clap_voice(ctx, 5, 0.008, ctx.tuned(1_200.0, 200.0), 1.1, ctx.pick([0.25, 0.15, 0.4, 0.3]));
    if ctx.variant.index() == 3 {
        voice.add(
            noise_burst(ctx, NoiseColor::Pink, FilterMode::Lowpass, 3_000.0, 0.7, 0.08)
                .drive(ctx.bank.drive_curve(), 4.0)
                .level(0.3),
        );
    }
    voice
}

fn closed_hat(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([0.03, 0.02, 0.05, 0.03]);
    ctx.voice()
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 7_000.0, 1.2, decay).level(0.5))
        .with(metal(ctx.tuned(240.0, 40.0), 6, 6_000.0, decay).level(0.3))
}

fn open_hat(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([0.22, 0.14, 0.4, 0.3]);
    ctx.voice()
        .with(noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 6_500.0, 1.2, decay).level(0.45))
        .with(metal(ctx.tuned(240.0, 40.0), 6, 6_000.0, decay).level(0.3))
}

fn tom(ctx: &RecipeContext<'_>) -> Voice {
    let base = ctx.tuned(95.0, 30.0);
    ctx.voice().with(
        body(Waveform::Sine, FreqEnv::exp(base * 3.0, base, 0.05), ctx.pick([0.3, 0.2, 0.45, 0.35]))
            .drive(ctx.bank.drive_curve(), ctx.pick([2.0, 1.5, 3.0, 6.0])),
    )
}

fn rim(ctx: &RecipeContext<'_>) -> Voice {
    ctx.voice().with(
        Layer::osc(Waveform::Square, FreqEnv::exp(ctx.tuned(2_400.0, 200.0), ctx.tuned(900.0, 100.0), 0.004))
            .filter(FilterMode::Highpass, 600.0, 0.7)
            .env(AmpEnv::perc(ctx.pick([0.015, 0.01, 0.025, 0.02])))
            .level(0.6),
    )
}

/// Phase-modulated square bell instead of the usual square pair
fn cowbell(ctx: &RecipeContext<'_>) -> Voice {
    let freq = ctx.tuned(620.0, 70.0);
    ctx.voice().with(
        Layer::osc(Waveform::Square, FreqEnv::fixed(freq))
            .fm(1.37, ctx.pick([1.0, 0.6, 1.6, 2.4]))
            .filter(FilterMode::Bandpass, 1_100.0, 1.2)
            .env(AmpEnv::perc(ctx.pick([0.09, 0.06, 0.15, 0.1])))
            .level(0.7),
    )
}

fn cymbal(ctx: &RecipeContext<'_>) -> Voice {
    let decay = ctx.pick([1.2, 0.7, 1.8, 1.2]);
    ctx.voice()
        .with(metal(ctx.tuned(280.0, 40.0) * 1.6, 6, 5_500.0, decay).level(0.4))
        .with(
            noise_burst(ctx, NoiseColor::White, FilterMode::Highpass, 6_000.0, 0.7, decay)
                .drive(ctx.bank.drive_curve(), 1.5)
                .level(0.3),
        )
}

/// Hoover: detuned saws gliding up an octave with vibrato
fn bass(ctx: &RecipeContext<'_>) -> Voice {
    let note = ctx.melodic(55.0);
    let glide = ctx.pick([0.15, 0.08, 0.25, 0.15]);
    let depth = ctx.pick([0.3, 0.2, 0.5, 0.8]);
    let env = AmpEnv::new(0.01, 0.15, ctx.pick([0.35, 0.2, 0.6, 0.4]));
    let sweep = FreqEnv::linear(note * 0.5, note, glide);

    let mut voice = ctx.voice();
    for (detune, level) in [(1.0, 0.35), (1.012, 0.3), (0.497, 0.25)] {
        voice.add(
            Layer::osc(Waveform::Saw, sweep.scaled(detune))
                .vibrato(5.5, depth)
                .filter(FilterMode::Lowpass, 2_500.0, 1.0)
                .env(env)
                .level(level),
        );
    }
    if ctx.variant.index() == 3 {
        voice.add(
            Layer::osc(Waveform::Square, sweep.scaled(2.0))
                .vibrato(5.5, depth)
                .drive(ctx.bank.drive_curve(), 2.0)
                .env(env)
                .level(0.15),
        );
    }
    voice
}
