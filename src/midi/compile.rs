//! Event stream to note interval compiler.
//!
//! Pairs note-on and note-off events on a `(channel, pitch)` key and emits
//! closed intervals sorted by start time. Unmatched releases are dropped and
//! notes still held at the end of the stream are closed at the stream end.
//! Nothing here is an error: malformed or unpaired input degrades to fewer
//! notes.

use super::{MidiEvent, NoteInterval};
use std::collections::{HashMap, VecDeque};

/// How a second onset on a key that is already sounding is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingMode {
    /// The new onset replaces the pending one; the earlier onset is lost.
    #[default]
    Overwrite,
    /// Onsets queue up per key and each release closes the oldest.
    Queue,
}

/// Pending onsets keyed by `(channel, pitch)`.
type PendingNotes = HashMap<(i32, i32), VecDeque<NoteInterval>>;

/// Compiles events into note intervals using [`PairingMode::Overwrite`].
///
/// # Arguments
///
/// * `events` - Events in the order they were received
/// * `stream_end_time` - Time used to close notes that never receive a release
///
/// # Returns
///
/// Note intervals sorted ascending by start time
///
/// # Examples
///
/// ```
/// use storyroll::midi::{compile, MidiEvent};
///
/// let events = [MidiEvent::note_on(0.0, 60, 100, 0), MidiEvent::note_off(0.5, 60, 0)];
/// let notes = compile(&events, 1.0);
/// assert_eq!(notes.len(), 1);
/// assert_eq!(notes[0].end_time, 0.5);
/// ```
pub fn compile(events: &[MidiEvent], stream_end_time: f64) -> Vec<NoteInterval> {
    compile_with(events, stream_end_time, PairingMode::Overwrite)
}

/// Compiles events into note intervals with an explicit pairing mode.
///
/// End times are never allowed to precede their start, so a release that
/// arrives out of order, or a stream end earlier than a held onset, yields
/// a zero-length note rather than an inverted one.
pub fn compile_with(
    events: &[MidiEvent],
    stream_end_time: f64,
    mode: PairingMode,
) -> Vec<NoteInterval> {
    let mut pending: PendingNotes = HashMap::new();
    let mut notes = Vec::with_capacity(events.len() / 2);

    for event in events {
        if event.is_onset() {
            let interval = NoteInterval::new(
                event.time_seconds,
                event.time_seconds,
                event.pitch,
                event.velocity,
                event.channel,
            );
            let queue = pending.entry(event.key()).or_default();
            if mode == PairingMode::Overwrite {
                queue.clear();
            }
            queue.push_back(interval);
        } else if event.is_release() {
            let Some(queue) = pending.get_mut(&event.key()) else {
                continue;
            };
            if let Some(mut interval) = queue.pop_front() {
                interval.end_time = event.time_seconds.max(interval.start_time);
                notes.push(interval);
            }
            if queue.is_empty() {
                pending.remove(&event.key());
            }
        }
    }

    // Held notes are closed in a fixed order so equal start times sort deterministically.
    let mut held: Vec<NoteInterval> = pending.into_values().flatten().collect();
    held.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.channel.cmp(&b.channel))
            .then(a.pitch.cmp(&b.pitch))
    });
    for mut interval in held {
        interval.end_time = stream_end_time.max(interval.start_time);
        notes.push(interval);
    }

    notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_note_pair() {
        let events = [
            MidiEvent::note_on(0.0, 60, 100, 0),
            MidiEvent::note_off(0.5, 60, 0),
        ];
        let notes = compile(&events, 1.0);
        assert_eq!(notes, vec![NoteInterval::new(0.0, 0.5, 60, 100, 0)]);
    }

    #[test]
    fn test_unreleased_note_closes_at_stream_end() {
        let events = [MidiEvent::note_on(0.3, 60, 80, 0)];
        let notes = compile(&events, 2.0);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].start_time, 0.3);
        assert_eq!(notes[0].end_time, 2.0);
    }

    #[test]
    fn test_second_onset_overwrites_pending() {
        let events = [
            MidiEvent::note_on(0.0, 60, 100, 0),
            MidiEvent::note_on(0.2, 60, 90, 0),
            MidiEvent::note_off(0.5, 60, 0),
        ];
        let notes = compile(&events, 1.0);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].start_time, 0.2);
        assert_eq!(notes[0].velocity, 90);
        assert_eq!(notes[0].end_time, 0.5);
    }

    #[test]
    fn test_queue_mode_keeps_overlapping_onsets() {
        let events = [
            MidiEvent::note_on(0.0, 60, 100, 0),
            MidiEvent::note_on(0.2, 60, 90, 0),
            MidiEvent::note_off(0.5, 60, 0),
            MidiEvent::note_off(0.7, 60, 0),
        ];
        let notes = compile_with(&events, 1.0, PairingMode::Queue);
        assert_eq!(
            notes,
            vec![
                NoteInterval::new(0.0, 0.5, 60, 100, 0),
                NoteInterval::new(0.2, 0.7, 60, 90, 0),
            ]
        );
    }

    #[test]
    fn test_zero_velocity_note_on_releases() {
        let events = [
            MidiEvent::note_on(0.0, 64, 70, 1),
            MidiEvent::note_on(0.4, 64, 0, 1),
        ];
        let notes = compile(&events, 1.0);
        assert_eq!(notes, vec![NoteInterval::new(0.0, 0.4, 64, 70, 1)]);
    }

    #[test]
    fn test_unmatched_release_is_ignored() {
        let events = [
            MidiEvent::note_off(0.1, 60, 0),
            MidiEvent::note_on(0.2, 60, 100, 1),
            MidiEvent::note_off(0.3, 60, 0),
        ];
        let notes = compile(&events, 1.0);
        // The release on channel 0 does not close the channel 1 note.
        assert_eq!(notes, vec![NoteInterval::new(0.2, 1.0, 60, 100, 1)]);
    }

    #[test]
    fn test_output_sorted_by_start() {
        let events = [
            MidiEvent::note_on(0.5, 67, 100, 0),
            MidiEvent::note_on(0.1, 60, 100, 0),
            MidiEvent::note_off(0.2, 60, 0),
            MidiEvent::note_on(0.3, 64, 100, 0),
            MidiEvent::note_off(0.6, 64, 0),
        ];
        let notes = compile(&events, 1.0);
        let starts: Vec<f64> = notes.iter().map(|n| n.start_time).collect();
        assert_eq!(starts, vec![0.1, 0.3, 0.5]);
    }

    #[test]
    fn test_start_never_after_end() {
        let events = [
            MidiEvent::note_on(0.8, 60, 100, 0),
            MidiEvent::note_off(0.4, 60, 0),
            MidiEvent::note_on(3.0, 62, 100, 0),
        ];
        let notes = compile(&events, 2.0);
        assert_eq!(notes.len(), 2);
        for note in &notes {
            assert!(note.start_time <= note.end_time);
            assert!(!note.is_active_at(note.end_time));
        }
    }

    #[test]
    fn test_compiled_notes_active_at_start() {
        let events = [
            MidiEvent::note_on(0.0, 60, 100, 0),
            MidiEvent::note_on(0.25, 64, 100, 0),
            MidiEvent::note_off(0.5, 60, 0),
            MidiEvent::note_off(0.75, 64, 0),
        ];
        for note in compile(&events, 1.0) {
            assert!(note.is_active_at(note.start_time));
            assert!(!note.is_active_at(note.end_time));
        }
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        let events = [
            MidiEvent::note_on(0.0, 200, 300, 42),
            MidiEvent::note_off(1.0, 200, 42),
        ];
        let notes = compile(&events, 2.0);
        assert_eq!(notes, vec![NoteInterval::new(0.0, 1.0, 200, 300, 42)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(compile(&[], 5.0).is_empty());
    }
}
