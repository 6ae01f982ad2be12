//! Live audio engine: mixer, clock and output stream

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Sender, unbounded};
use pulsegrid_core::EngineConfig;
use thiserror::Error;
use tracing::{info, warn};

use crate::audio_io::{AudioOutputError, RealtimeOutputStream, default_output_info};
use crate::clock::AudioClock;
use crate::commands::EngineCommand;
use crate::mixer::Mixer;
use crate::noise_bank::NoiseBank;

#[derive(Debug, Error)]
pub enum AudioEngineError {
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
    #[error("Engine already running")]
    AlreadyRunning,
    #[error("Engine not running")]
    NotRunning,
}

/// Owns the output stream. The mixer lives behind a mutex shared with the
/// stream callback; the control thread talks to it through `sender()`.
pub struct AudioEngine {
    clock: Arc<AudioClock>,
    mixer: Arc<Mutex<Mixer>>,
    commands: Sender<EngineCommand>,
    stream: Option<RealtimeOutputStream>,
}

impl AudioEngine {
    pub fn new(config: &EngineConfig, bank: Arc<NoiseBank>) -> Self {
        let clock = Arc::new(AudioClock::new(config.sample_rate));
        let (commands, rx) = unbounded();
        let mixer = Mixer::new(config, bank, clock.clone()).with_commands(rx);
        Self {
            clock,
            mixer: Arc::new(Mutex::new(mixer)),
            commands,
            stream: None,
        }
    }

    pub fn clock(&self) -> Arc<AudioClock> {
        self.clock.clone()
    }

    pub fn sender(&self) -> Sender<EngineCommand> {
        self.commands.clone()
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the default output and start pulling from the mixer
    pub fn start(&mut self) -> Result<(), AudioEngineError> {
        if self.stream.is_some() {
            return Err(AudioEngineError::AlreadyRunning);
        }

        let device = default_output_info()?;
        if let Ok(mut mixer) = self.mixer.lock() {
            if mixer.sample_rate() != device.sample_rate {
                mixer.set_sample_rate(device.sample_rate);
            }
        }

        let mixer = self.mixer.clone();
        let stream = RealtimeOutputStream::start(move |buffer, channels| {
            match mixer.lock() {
                Ok(mut mixer) => mixer.render(buffer, channels),
                Err(_) => buffer.fill(0.0),
            }
        })?;

        if stream.sample_rate() != self.clock.sample_rate() {
            warn!(
                stream = stream.sample_rate(),
                clock = self.clock.sample_rate(),
                "Output rate changed while opening the stream"
            );
        }

        self.stream = Some(stream);
        self.clock.set_running(true);
        info!("Audio engine started");
        Ok(())
    }

    /// Start unless a stream is already running
    pub fn ensure_running(&mut self) -> Result<(), AudioEngineError> {
        match self.start() {
            Ok(()) | Err(AudioEngineError::AlreadyRunning) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn stop(&mut self) -> Result<(), AudioEngineError> {
        let stream = self.stream.take().ok_or(AudioEngineError::NotRunning)?;
        stream.stop();
        self.clock.set_running(false);
        info!("Audio engine stopped");
        Ok(())
    }

    /// Run `f` against the mixer (locks out the audio callback meanwhile)
    pub fn with_mixer<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Mixer) -> R,
    {
        self.mixer.lock().ok().map(|mut m| f(&mut m))
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
