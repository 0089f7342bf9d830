//! Visible pitch range.

use crate::midi::NoteInterval;

/// Padding added above and below the observed pitches.
const PITCH_PADDING: i32 = 2;
/// Minimum span, one octave.
const MIN_SPAN: i32 = 12;

/// Inclusive range of pitches a renderer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchRange {
    pub low: i32,
    pub high: i32,
}

impl Default for PitchRange {
    /// C1 to C7.
    fn default() -> Self {
        Self { low: 24, high: 96 }
    }
}

impl PitchRange {
    /// A range clamped to MIDI note numbers with `high > low`.
    pub fn new(low: i32, high: i32) -> Self {
        let low = low.clamp(0, 126);
        let high = high.clamp(low + 1, 127);
        Self { low, high }
    }

    /// Range covering `notes`, padded and widened to at least an octave.
    /// Returns None for an empty slice so callers can keep their current range.
    pub fn fit(notes: &[NoteInterval]) -> Option<Self> {
        let min = notes.iter().map(|n| n.pitch).min()?;
        let max = notes.iter().map(|n| n.pitch).max()?;

        let mut low = min.saturating_sub(PITCH_PADDING).clamp(0, 127);
        let mut high = max.saturating_add(PITCH_PADDING).clamp(0, 127);

        if high - low < MIN_SPAN {
            let mid = (min.clamp(0, 127) + max.clamp(0, 127)) / 2;
            low = (mid - MIN_SPAN / 2).max(0);
            high = low + MIN_SPAN;
            if high > 127 {
                high = 127;
                low = 127 - MIN_SPAN;
            }
        }

        Some(Self { low, high })
    }

    pub fn contains(&self, pitch: i32) -> bool {
        pitch >= self.low && pitch <= self.high
    }

    /// Number of semitones between the ends.
    pub fn span(&self) -> i32 {
        self.high - self.low
    }

    /// Number of distinct pitches shown.
    pub fn rows(&self) -> i32 {
        self.span() + 1
    }
}
