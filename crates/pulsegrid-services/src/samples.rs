//! Decoding and resampling of user samples

use std::io::Cursor;

use pulsegrid_core::SampleBuffer;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Failed to decode sample: {0}")]
    Decode(String),
    #[error("Recording device unavailable: {0}")]
    Device(String),
    #[error("Recording permission denied: {0}")]
    Permission(String),
}

/// Average interleaved frames down to one channel
pub fn to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Decode an in-memory WAV file to a mono buffer at its native rate
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, SampleError> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| SampleError::Decode(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(SampleError::Decode("invalid WAV header".into()));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| SampleError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| SampleError::Decode(e.to_string()))?
        }
    };

    if samples.is_empty() {
        return Err(SampleError::Decode("WAV file has no samples".into()));
    }

    let mono = to_mono(&samples, spec.channels as usize);
    debug!(
        frames = mono.len(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "Decoded sample"
    );
    Ok(SampleBuffer::new(mono, spec.sample_rate))
}

/// Band-limited conversion of a buffer to `to_rate`
pub fn resample(buffer: &SampleBuffer, to_rate: u32) -> Result<SampleBuffer, SampleError> {
    if buffer.sample_rate == to_rate || buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / buffer.sample_rate as f64;
    let frames = (buffer.len() as f64 * ratio).round() as usize;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, buffer.len(), 1)
        .map_err(|e| SampleError::Decode(format!("Resample init error: {}", e)))?;

    let input = vec![buffer.data.to_vec()];
    let mut data = resampler
        .process(&input, None)
        .map_err(|e| SampleError::Decode(format!("Resample error: {}", e)))?
        .swap_remove(0);

    // Flush the filter so the end of the sample is not cut off
    let delay = resampler.output_delay();
    while data.len() < frames + delay {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| SampleError::Decode(format!("Resample error: {}", e)))?
            .swap_remove(0);
        if tail.is_empty() {
            break;
        }
        data.extend(tail);
    }

    data.drain(..delay.min(data.len()));
    data.resize(frames, 0.0);
    Ok(SampleBuffer::new(data, to_rate))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a WAV file in memory
    pub(crate) fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16, float: bool) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: if float { 32 } else { 16 },
            sample_format: if float { hound::SampleFormat::Float } else { hound::SampleFormat::Int },
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                if float {
                    writer.write_sample(s).unwrap();
                } else {
                    writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_float_mono() {
        let bytes = wav_bytes(&[0.0, 0.5, -0.5, 1.0], 22_050, 1, true);
        let buffer = decode_wav(&bytes).unwrap();
        assert_eq!(buffer.sample_rate, 22_050);
        assert_eq!(&buffer.data[..], &[0.0, 0.5, -0.5, 1.0]);
    }

    #[test]
    fn test_decode_int_stereo_mixes_down() {
        let bytes = wav_bytes(&[0.5, 0.0, -0.5, -0.5], 44_100, 2, false);
        let buffer = decode_wav(&bytes).unwrap();
        assert_eq!(buffer.len(), 2);
        assert!((buffer.data[0] - 0.25).abs() < 1e-3);
        assert!((buffer.data[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(decode_wav(b"not a wav file"), Err(SampleError::Decode(_))));
        let empty = wav_bytes(&[], 44_100, 1, true);
        assert!(matches!(decode_wav(&empty), Err(SampleError::Decode(_))));
    }

    #[test]
    fn test_resample_changes_rate_and_length() {
        let tone: Vec<f32> = (0..22_050).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let buffer = SampleBuffer::new(tone, 22_050);
        let up = resample(&buffer, 44_100).unwrap();
        assert_eq!(up.sample_rate, 44_100);
        assert_eq!(up.len(), 44_100);

        let same = resample(&buffer, 22_050).unwrap();
        assert_eq!(same.len(), buffer.len());
    }

    #[test]
    fn test_resample_keeps_full_length_and_alignment() {
        // Silent first half, constant second half
        let input: Vec<f32> = (0..44_100).map(|i| if i < 22_050 { 0.0 } else { 0.5 }).collect();
        let out = resample(&SampleBuffer::new(input, 44_100), 48_000).unwrap();
        assert_eq!(out.len(), 48_000);
        assert!((out.duration_secs() - 1.0).abs() < 1e-9);

        let edge = out.data.iter().position(|s| *s > 0.25).unwrap();
        assert!((edge as i64 - 24_000).abs() <= 4, "edge at {edge}");
        assert!(out.data[12_000].abs() < 1e-3);
        assert!((out.data[36_000] - 0.5).abs() < 1e-2);
        // The tail is still there right up to the last frame
        assert!((out.data[47_990] - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_to_mono() {
        assert_eq!(to_mono(&[1.0, 3.0, -2.0, 0.0], 2), vec![2.0, -1.0]);
        assert_eq!(to_mono(&[0.5, 0.25], 1), vec![0.5, 0.25]);
    }
}
