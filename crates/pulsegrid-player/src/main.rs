//! pulsegrid-player: Headless front end for the drum machine

mod config;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulsegrid_core::{EngineConfig, PRESETS};
use pulsegrid_services::{DrumMachine, EngineEvent, StatusKind};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between scheduler polls while playing live
const TICK: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "pulsegrid", version, about = "Step-sequenced drum machine")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a preset through the default output device
    Play {
        #[arg(default_value = "Four on the Floor")]
        preset: String,
        #[arg(long, default_value_t = 8.0)]
        seconds: f64,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Render a preset offline to a WAV file
    Export {
        #[arg(default_value = "Four on the Floor")]
        preset: String,
        #[arg(short, long, default_value = "pulsegrid.wav")]
        output: PathBuf,
        #[arg(long, default_value_t = 8.0)]
        seconds: f64,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// List the built-in preset patterns
    Presets,
    /// Write a default config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct Overrides {
    /// Kit to play the preset on instead of its own
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    bpm: Option<f64>,
    #[arg(long)]
    metronome: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulsegrid=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::config_path);

    match cli.command {
        Command::Play { preset, seconds, overrides } => {
            let config = config::load_config(&config_path);
            play(config, &preset, seconds, &overrides)
        }
        Command::Export { preset, output, seconds, overrides } => {
            let config = config::load_config(&config_path);
            export(config, &preset, seconds, &overrides, &output)
        }
        Command::Presets => {
            for preset in PRESETS {
                println!("{:<24} {:>6} {:>6.1} bpm", preset.name, preset.genre.name(), preset.bpm);
            }
            Ok(())
        }
        Command::InitConfig { force } => config::write_default_config(&config_path, force),
    }
}

fn prepare(config: EngineConfig, preset: &str, overrides: &Overrides) -> anyhow::Result<DrumMachine> {
    let mut machine = DrumMachine::new(config);
    machine.apply_preset(preset)?;
    if let Some(genre) = &overrides.genre {
        machine.set_genre(genre)?;
    }
    if let Some(bpm) = overrides.bpm {
        machine.set_tempo(bpm);
    }
    if overrides.metronome {
        machine.set_metronome(true);
    }
    Ok(machine)
}

fn play(config: EngineConfig, preset: &str, seconds: f64, overrides: &Overrides) -> anyhow::Result<()> {
    let mut machine = prepare(config, preset, overrides)?;
    machine.start();
    if !machine.is_playing() {
        let reason = machine
            .events()
            .try_iter()
            .find_map(|e| match e {
                EngineEvent::Status { kind: StatusKind::AudioUnavailable, message } => Some(message),
                _ => None,
            })
            .unwrap_or_else(|| "no output device".to_string());
        anyhow::bail!("Cannot start playback: {}", reason);
    }

    info!(preset, genre = %machine.state().genre, bpm = machine.state().bpm(), "Playing");
    let until = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    while Instant::now() < until {
        machine.tick();
        for event in machine.events().try_iter() {
            match event {
                EngineEvent::StepReached(report) => {
                    debug!(step = report.step, hits = report.triggered.len(), "Step");
                }
                EngineEvent::Status { kind, message } => warn!(?kind, "{}", message),
                EngineEvent::PreviewReady { .. } => {}
            }
        }
        std::thread::sleep(TICK);
    }
    machine.stop();
    info!("Stopped");
    Ok(())
}

fn export(
    config: EngineConfig,
    preset: &str,
    seconds: f64,
    overrides: &Overrides,
    output: &Path,
) -> anyhow::Result<()> {
    let sample_rate = config.sample_rate;
    let machine = prepare(config, preset, overrides)?;
    let audio = machine.render_offline(seconds);
    write_wav(output, &audio, sample_rate)?;
    info!(path = %output.display(), seconds, sample_rate, "Exported");
    Ok(())
}

/// Interleaved stereo as 32-bit float WAV
fn write_wav(path: &Path, interleaved: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in interleaved {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_export_overrides() {
        let cli = Cli::try_parse_from([
            "pulsegrid", "export", "Planet Rock", "-o", "out.wav", "--seconds", "2", "--genre",
            "909", "--bpm", "100",
        ])
        .unwrap();
        match cli.command {
            Command::Export { preset, output, seconds, overrides } => {
                assert_eq!(preset, "Planet Rock");
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(seconds, 2.0);
                assert_eq!(overrides.genre.as_deref(), Some("909"));
                assert_eq!(overrides.bpm, Some(100.0));
                assert!(!overrides.metronome);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_unknown_preset_is_an_error() {
        let overrides = Overrides { genre: None, bpm: None, metronome: false };
        assert!(prepare(EngineConfig::default(), "Polka", &overrides).is_err());
    }

    #[test]
    fn test_export_writes_stereo_wav() {
        let mut config = EngineConfig::default();
        config.sample_rate = 16_000;
        config.reverb.seconds = 0.2;
        let overrides = Overrides { genre: Some("rave".into()), bpm: Some(140.0), metronome: true };
        let path = std::env::temp_dir().join(format!("pulsegrid-export-{}.wav", std::process::id()));

        export(config, "Four on the Floor", 0.5, &overrides, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.duration(), 8_000);
        let _ = std::fs::remove_file(&path);
    }
}
