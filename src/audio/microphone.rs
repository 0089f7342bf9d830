//! Microphone capture source.
//!
//! Opens the default input device through the cpal backend that rodio
//! re-exports and appends every callback's samples to a shared buffer.

use super::AudioBuffer;
use crate::error::{Result as StoryResult, StoryError};
use crate::session::AudioSource;
use anyhow::{anyhow, Context, Result};
use rodio::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rodio::cpal::{self, SampleFormat, SizedSample, Stream, SupportedStreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct MicShared {
    recording: AtomicBool,
    samples: Mutex<Vec<f32>>,
}

impl MicShared {
    fn push<T>(&self, data: &[T])
    where
        T: SizedSample,
        f32: cpal::FromSample<T>,
    {
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut samples) = self.samples.lock() {
            samples.extend(data.iter().map(|&s| <f32 as cpal::Sample>::from_sample(s)));
        }
    }

    fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Default input device, recorded at its native format.
pub struct Microphone {
    device: cpal::Device,
    config: SupportedStreamConfig,
    stream: Option<Stream>,
    shared: Arc<MicShared>,
}

impl Microphone {
    /// Finds the default input device.
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or it reports no usable config.
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No microphone input device available"))?;
        let config = device
            .default_input_config()
            .context("Failed to query microphone format")?;
        tracing::info!(
            "Microphone: {} ({} ch, {} Hz, {:?})",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.channels(),
            config.sample_rate().0,
            config.sample_format()
        );
        Ok(Self {
            device,
            config,
            stream: None,
            shared: Arc::new(MicShared {
                recording: AtomicBool::new(false),
                samples: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    fn build_stream<T>(&self) -> std::result::Result<Stream, cpal::BuildStreamError>
    where
        T: SizedSample,
        f32: cpal::FromSample<T>,
    {
        let shared = Arc::clone(&self.shared);
        self.device.build_input_stream(
            &self.config.config(),
            move |data: &[T], _: &cpal::InputCallbackInfo| shared.push(data),
            |err| tracing::error!("Microphone stream error: {}", err),
            None,
        )
    }
}

impl AudioSource for Microphone {
    fn start(&mut self) -> StoryResult<()> {
        let stream = match self.config.sample_format() {
            SampleFormat::F32 => self.build_stream::<f32>(),
            SampleFormat::I16 => self.build_stream::<i16>(),
            SampleFormat::U16 => self.build_stream::<u16>(),
            SampleFormat::I32 => self.build_stream::<i32>(),
            other => {
                return Err(StoryError::audio(format!(
                    "Unsupported microphone sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| StoryError::audio(format!("Failed to open microphone: {}", e)))?;

        if let Ok(mut samples) = self.shared.samples.lock() {
            samples.clear();
        }
        self.shared.recording.store(true, Ordering::Release);
        stream
            .play()
            .map_err(|e| StoryError::audio(format!("Failed to start microphone: {}", e)))?;
        self.stream = Some(stream);
        tracing::info!("Microphone recording started");
        Ok(())
    }

    fn stop(&mut self) -> AudioBuffer {
        self.shared.recording.store(false, Ordering::Release);
        self.stream = None;
        let samples = self
            .shared
            .samples
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default();
        AudioBuffer::new(samples, self.channels(), self.sample_rate())
    }

    fn elapsed_seconds(&self) -> f64 {
        let rate = self.sample_rate();
        if rate == 0 {
            return 0.0;
        }
        self.shared.len() as f64 / self.channels().max(1) as f64 / rate as f64
    }

    fn reset(&mut self) {
        self.shared.recording.store(false, Ordering::Release);
        self.stream = None;
        if let Ok(mut samples) = self.shared.samples.lock() {
            samples.clear();
        }
    }
}
