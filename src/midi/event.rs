//! Raw timestamped MIDI note events.
//!
//! Events arrive from a capture source or a payload and are not guaranteed
//! to be time-ordered. Integer fields are kept wide and unvalidated so
//! that out-of-range values pass through to the compiler unchanged.

use serde::{Deserialize, Serialize};

/// Whether an event starts or ends a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteOn,
    NoteOff,
}

impl EventKind {
    /// Wire name used in MIDI payloads (`note_on` / `note_off`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NoteOn => "note_on",
            EventKind::NoteOff => "note_off",
        }
    }

    /// Parses a wire name, returning None for anything else.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "note_on" => Some(EventKind::NoteOn),
            "note_off" => Some(EventKind::NoteOff),
            _ => None,
        }
    }
}

/// A single note-on or note-off at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Seconds from the start of the stream.
    #[serde(rename = "time")]
    pub time_seconds: f64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// MIDI note number. 60 = Middle C.
    #[serde(rename = "note")]
    pub pitch: i32,
    pub velocity: i32,
    pub channel: i32,
}

impl MidiEvent {
    /// Creates a note-on event.
    pub fn note_on(time_seconds: f64, pitch: i32, velocity: i32, channel: i32) -> Self {
        Self {
            time_seconds,
            kind: EventKind::NoteOn,
            pitch,
            velocity,
            channel,
        }
    }

    /// Creates a note-off event (velocity 0).
    pub fn note_off(time_seconds: f64, pitch: i32, channel: i32) -> Self {
        Self {
            time_seconds,
            kind: EventKind::NoteOff,
            pitch,
            velocity: 0,
            channel,
        }
    }

    /// True for a note-on with non-zero velocity.
    pub fn is_onset(&self) -> bool {
        self.kind == EventKind::NoteOn && self.velocity > 0
    }

    /// True for a note-off, or a note-on with velocity 0 (running-status release).
    pub fn is_release(&self) -> bool {
        match self.kind {
            EventKind::NoteOff => true,
            EventKind::NoteOn => self.velocity == 0,
        }
    }

    /// The `(channel, pitch)` pair that note-on and note-off events pair up on.
    pub fn key(&self) -> (i32, i32) {
        (self.channel, self.pitch)
    }
}
