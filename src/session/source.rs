//! Capture sources a session can record from.

use crate::audio::AudioBuffer;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Which input a recording takes its audio from. Exactly one is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingSource {
    /// The instrument bus: synthesized output plus a parallel MIDI capture.
    #[default]
    Instrument,
    /// The default microphone. No MIDI is captured.
    Microphone,
}

impl RecordingSource {
    pub fn toggle(self) -> Self {
        match self {
            RecordingSource::Instrument => RecordingSource::Microphone,
            RecordingSource::Microphone => RecordingSource::Instrument,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordingSource::Instrument => "Instrument",
            RecordingSource::Microphone => "Microphone",
        }
    }

    /// Whether recordings from this source carry MIDI.
    pub fn captures_midi(self) -> bool {
        self == RecordingSource::Instrument
    }
}

/// An audio input the session can start, poll, and finalize.
pub trait AudioSource {
    /// Clears any previous take and begins recording.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoryError::Audio`] if the device cannot be started.
    fn start(&mut self) -> Result<()>;

    /// Stops recording and hands over everything recorded.
    fn stop(&mut self) -> AudioBuffer;

    /// Seconds recorded so far.
    fn elapsed_seconds(&self) -> f64;

    /// Stops recording and drops the take.
    fn reset(&mut self);

    /// Tempo reported by the source's host, if it knows one.
    fn bpm(&self) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_midi() {
        assert_eq!(RecordingSource::default(), RecordingSource::Instrument);
        assert_eq!(RecordingSource::Instrument.toggle(), RecordingSource::Microphone);
        assert!(RecordingSource::Instrument.captures_midi());
        assert!(!RecordingSource::Microphone.captures_midi());
    }
}
