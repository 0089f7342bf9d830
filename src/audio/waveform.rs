//! Waveform overview for the preview strip.

use super::AudioBuffer;
use rayon::prelude::*;

/// Peak absolute amplitude of `buffer` in `bins` equal slices of time.
///
/// Channels are folded together. Returns an empty vector for an empty
/// buffer or zero bins.
pub fn peaks(buffer: &AudioBuffer, bins: usize) -> Vec<f32> {
    let frames = buffer.frames();
    if frames == 0 || bins == 0 {
        return Vec::new();
    }
    let channels = buffer.channels.max(1) as usize;
    let frames_per_bin = frames.div_ceil(bins);
    let usable = frames * channels;

    buffer.samples[..usable]
        .par_chunks(frames_per_bin * channels)
        .map(|chunk| chunk.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_per_bin() {
        let buffer = AudioBuffer::new(vec![0.1, -0.9, 0.2, 0.3, -0.4, 0.0, 0.5, -0.6], 1, 8);
        assert_eq!(peaks(&buffer, 4), vec![0.9, 0.3, 0.4, 0.6]);
        assert_eq!(peaks(&buffer, 2), vec![0.9, 0.6]);
    }

    #[test]
    fn test_stereo_frames_stay_together() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2, -0.8, 0.0], 2, 2);
        assert_eq!(peaks(&buffer, 2), vec![0.2, 0.8]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(peaks(&AudioBuffer::default(), 10).is_empty());
        let buffer = AudioBuffer::new(vec![0.5; 4], 1, 4);
        assert!(peaks(&buffer, 0).is_empty());
        // More bins than frames yields one bin per frame.
        assert_eq!(peaks(&buffer, 10).len(), 4);
    }
}
