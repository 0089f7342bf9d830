//! MIDI data for story capture and visualization.
//!
//! Raw [`MidiEvent`]s come from a [`MidiCapture`], a JSON [`MidiPayload`], or
//! an imported Standard MIDI File. [`compile`] pairs them into
//! [`NoteInterval`]s that the timeline renderers draw.

pub mod capture;
mod compile;
mod event;
mod midi_import;
mod note;
mod payload;

pub use capture::{ChannelMessage, MidiCapture, TimedMessage};
pub use compile::{compile, compile_with, PairingMode};
pub use event::{EventKind, MidiEvent};
pub use midi_import::{import_from_bytes, import_from_midi, MidiImportError};
pub use note::NoteInterval;
pub use payload::MidiPayload;

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// Values outside 0-127 are clamped first.
///
/// # Examples
///
/// ```
/// use storyroll::midi::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// ```
pub fn note_to_name(note: i32) -> String {
    let note = note.clamp(0, 127);
    let octave = note / 12 - 1; // MIDI octave convention
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Whether a pitch falls on a black key.
pub fn is_black_key(pitch: i32) -> bool {
    matches!(pitch.rem_euclid(12), 1 | 3 | 6 | 8 | 10)
}
