//! WAV file reading and writing.

use super::AudioBuffer;
use crate::error::Result;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Writes `buffer` as 16-bit PCM, keeping its channel count and rate.
///
/// # Errors
///
/// Returns [`crate::StoryError::Wav`] if the file cannot be created or written.
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in &buffer.samples {
        // Convert f32 (-1.0 to 1.0) to i16
        writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?;
    }
    writer.finalize()?;
    tracing::info!(
        "Wrote {:.2}s of audio to {}",
        buffer.duration_secs(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads a WAV file of any integer or float format into `[-1, 1]` samples.
///
/// # Errors
///
/// Returns [`crate::StoryError::Wav`] if the file is missing or malformed.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let buffer = AudioBuffer::new(samples, spec.channels, spec.sample_rate);
    tracing::info!(
        "Read {:.2}s of audio from {}",
        buffer.duration_secs(),
        path.as_ref().display()
    );
    Ok(buffer)
}
