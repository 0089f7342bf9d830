//! Compiled note intervals.
//!
//! A note interval is a closed start/end span for one sounded pitch,
//! produced by pairing note-on and note-off events.

use serde::{Deserialize, Serialize};

/// A single sounded note with start and end time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteInterval {
    /// Start time in seconds from the beginning of the stream.
    pub start_time: f64,

    /// End time in seconds. Never earlier than `start_time` for compiler output.
    pub end_time: f64,

    /// MIDI note number. 60 = Middle C (C4).
    pub pitch: i32,

    /// Velocity of the onset (0-127 for well-formed input).
    pub velocity: i32,

    /// MIDI channel the note was played on.
    pub channel: i32,
}

impl NoteInterval {
    /// Creates a new interval.
    ///
    /// # Arguments
    ///
    /// * `start_time` - Onset in seconds
    /// * `end_time` - Release in seconds
    /// * `pitch` - MIDI note number
    /// * `velocity` - Onset velocity
    /// * `channel` - MIDI channel
    ///
    /// # Examples
    ///
    /// ```
    /// use storyroll::midi::NoteInterval;
    ///
    /// let note = NoteInterval::new(0.0, 0.5, 60, 100, 0);
    /// assert!(note.is_active_at(0.25));
    /// ```
    pub fn new(start_time: f64, end_time: f64, pitch: i32, velocity: i32, channel: i32) -> Self {
        Self {
            start_time,
            end_time,
            pitch,
            velocity,
            channel,
        }
    }

    /// Length of the note in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Checks if this note is sounding at time `t`.
    ///
    /// The interval is half-open: active at its start, inactive at its end.
    pub fn is_active_at(&self, t: f64) -> bool {
        t >= self.start_time && t < self.end_time
    }

    /// Checks if any part of the note falls within `[start, end)`.
    pub fn overlaps_range(&self, start: f64, end: f64) -> bool {
        self.start_time < end && self.end_time > start
    }
}
