//! cpal output stream driving the mixer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to get default output config: {0}")]
    ConfigError(String),
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
}

/// Name, sample rate and channel count of the default output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

fn default_output() -> Result<(cpal::Device, cpal::SupportedStreamConfig), AudioOutputError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(AudioOutputError::NoDevices)?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;
    Ok((device, config))
}

pub fn default_output_info() -> Result<OutputDeviceInfo, AudioOutputError> {
    let (device, config) = default_output()?;
    Ok(OutputDeviceInfo {
        name: device.name().unwrap_or_default(),
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}

/// Output stream that pulls interleaved f32 frames from a callback. After
/// `stop` the callback is no longer invoked and the device gets silence.
pub struct RealtimeOutputStream {
    stopped: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl RealtimeOutputStream {
    pub fn start<F>(mut render: F) -> Result<Self, AudioOutputError>
    where
        F: FnMut(&mut [f32], u16) + Send + 'static,
    {
        let (device, supported) = default_output()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let config: StreamConfig = supported.into();

        let stopped = Arc::new(AtomicBool::new(false));
        let silenced = stopped.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if silenced.load(Ordering::Acquire) {
                        data.fill(0.0);
                    } else {
                        render(data, channels);
                    }
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "Output stream running"
        );
        Ok(Self { stopped, sample_rate, channels, _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl Drop for RealtimeOutputStream {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
    }
}
