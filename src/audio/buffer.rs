//! Interleaved sample buffer shared by capture, preview, and WAV I/O.

use serde::{Deserialize, Serialize};

/// Interleaved `f32` samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::empty(2, super::SAMPLE_RATE)
    }
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn empty(channels: u16, sample_rate: u32) -> Self {
        Self::new(Vec::new(), channels, sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Drops the samples, keeping the format.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
