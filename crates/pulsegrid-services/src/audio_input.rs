//! Sample recording from the default input device

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, StreamConfig};
use crossbeam_channel::{Receiver, Sender, unbounded};
use pulsegrid_core::SampleBuffer;
use tracing::{error, info, warn};

use crate::samples::{SampleError, to_mono};

/// Map a device error message onto the recording error taxonomy
pub(crate) fn classify_device_error(message: String) -> SampleError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        SampleError::Permission(message)
    } else {
        SampleError::Device(message)
    }
}

/// Captures the default input until `finish`. Dropping it discards the take.
pub struct SampleRecorder {
    stop_flag: Arc<AtomicBool>,
    chunks: Receiver<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl SampleRecorder {
    pub fn start() -> Result<Self, SampleError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SampleError::Device("No audio input devices found".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| classify_device_error(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "Starting sample recording"
        );

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (tx, chunks) = unbounded();
        let stream_config: StreamConfig = config.clone().into();

        let stream = match config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, tx, stop_flag.clone()),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, tx, stop_flag.clone()),
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, tx, stop_flag.clone()),
            format => {
                return Err(SampleError::Device(format!("Unsupported format: {:?}", format)));
            }
        }?;

        stream.play().map_err(|e| classify_device_error(e.to_string()))?;

        Ok(Self { stop_flag, chunks, sample_rate, channels, _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stop capturing and return the take as a mono buffer
    pub fn finish(self) -> Result<SampleBuffer, SampleError> {
        self.stop_flag.store(true, Ordering::SeqCst);
        let interleaved: Vec<f32> = self.chunks.try_iter().flatten().collect();
        let mono = to_mono(&interleaved, self.channels as usize);
        if mono.is_empty() {
            warn!("Recording stopped with no audio captured");
            return Err(SampleError::Device("No audio captured".into()));
        }
        info!(frames = mono.len(), "Recording finished");
        Ok(SampleBuffer::new(mono, self.sample_rate))
    }
}

impl Drop for SampleRecorder {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    tx: Sender<Vec<f32>>,
    stop_flag: Arc<AtomicBool>,
) -> Result<cpal::Stream, SampleError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                let samples: Vec<f32> = data.iter().map(|s| f32::from_sample_(*s)).collect();
                let _ = tx.send(samples);
            },
            |err| error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| classify_device_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_errors_are_classified() {
        let err = classify_device_error("Access denied by the system".into());
        assert!(matches!(err, SampleError::Permission(_)));
        let err = classify_device_error("The requested device is no longer available".into());
        assert!(matches!(err, SampleError::Device(_)));
    }
}
