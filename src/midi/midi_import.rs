//! Standard MIDI File (SMF) import.
//!
//! Reads .mid and .midi files into a [`MidiPayload`] so existing files can be
//! previewed on the story timelines. Supports SMF Format 0 (single track)
//! and Format 1 (multi-track) files with metrical timing.
//!
//! # Limitations
//!
//! - Only note on/off events are imported
//! - Tempo changes from every track form one global tempo map
//! - The first time signature found is kept
//! - SMPTE timecode and Format 2 files are rejected

use super::{MidiEvent, MidiPayload};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during MIDI import.
#[derive(Debug, Error)]
pub enum MidiImportError {
    /// File could not be read
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// MIDI parsing failed
    #[error("MIDI parse error: {0}")]
    ParseError(String),
    /// Unsupported MIDI format or timing
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Default tempo in microseconds per quarter note (120 BPM).
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// A tempo change at an absolute tick.
#[derive(Debug, Clone, Copy)]
struct TempoChange {
    tick: u64,
    usec_per_beat: u32,
}

/// Converts absolute ticks to seconds through a sorted tempo map.
struct TempoMap {
    ticks_per_beat: u64,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    fn new(ticks_per_beat: u64, mut changes: Vec<TempoChange>) -> Self {
        changes.sort_by_key(|c| c.tick);
        if changes.first().is_none_or(|c| c.tick > 0) {
            changes.insert(
                0,
                TempoChange {
                    tick: 0,
                    usec_per_beat: DEFAULT_USEC_PER_BEAT,
                },
            );
        }
        Self {
            ticks_per_beat: ticks_per_beat.max(1),
            changes,
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let mut seconds = 0.0;
        for (i, change) in self.changes.iter().enumerate() {
            if change.tick >= tick {
                break;
            }
            let segment_end = self
                .changes
                .get(i + 1)
                .map(|next| next.tick.min(tick))
                .unwrap_or(tick);
            let ticks = (segment_end - change.tick) as f64;
            seconds += ticks / self.ticks_per_beat as f64 * change.usec_per_beat as f64 / 1e6;
        }
        seconds
    }

    fn initial_bpm(&self) -> f64 {
        let usec = self
            .changes
            .first()
            .map(|c| c.usec_per_beat)
            .unwrap_or(DEFAULT_USEC_PER_BEAT);
        60_000_000.0 / usec as f64
    }
}

/// Imports a MIDI file as a payload with times in seconds.
///
/// # Arguments
///
/// * `path` - Path to the .mid or .midi file
///
/// # Returns
///
/// A payload whose `total_time` is the time of the last imported event
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed, or uses timecode
/// timing or Format 2.
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<MidiPayload, MidiImportError> {
    let data = fs::read(path.as_ref())?;
    import_from_bytes(&data)
}

/// Imports SMF bytes already in memory. See [`import_from_midi`].
pub fn import_from_bytes(data: &[u8]) -> Result<MidiPayload, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::ParseError(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u64,
        Timing::Timecode(_, _) => {
            return Err(MidiImportError::UnsupportedFormat(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };

    if smf.header.format == Format::Sequential {
        return Err(MidiImportError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut tempo_changes = Vec::new();
    let mut time_signature: Option<(u8, u8)> = None;
    // (absolute tick, order within file, event) so equal ticks keep file order
    let mut timed_events: Vec<(u64, usize, MidiEvent)> = Vec::new();

    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        for event in track {
            current_tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push(TempoChange {
                        tick: current_tick,
                        usec_per_beat: tempo.as_int().max(1),
                    });
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_power, _, _)) => {
                    // denom_power is power of 2 (e.g., 2 means quarter note)
                    let denom = 1u8.checked_shl(denom_power as u32).unwrap_or(4);
                    time_signature.get_or_insert((num, denom));
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int() as i32;
                    let parsed = match message {
                        MidiMessage::NoteOn { key, vel } => Some(MidiEvent::note_on(
                            0.0,
                            key.as_int() as i32,
                            vel.as_int() as i32,
                            ch,
                        )),
                        MidiMessage::NoteOff { key, .. } => {
                            Some(MidiEvent::note_off(0.0, key.as_int() as i32, ch))
                        }
                        _ => None, // Ignore other MIDI messages
                    };
                    if let Some(midi_event) = parsed {
                        let order = timed_events.len();
                        timed_events.push((current_tick, order, midi_event));
                    }
                }
                _ => {} // Ignore SysEx and other events
            }
        }
    }

    timed_events.sort_by_key(|(tick, order, _)| (*tick, *order));
    let tempo_map = TempoMap::new(ticks_per_beat, tempo_changes);

    let events: Vec<MidiEvent> = timed_events
        .into_iter()
        .map(|(tick, _, mut event)| {
            event.time_seconds = tempo_map.seconds_at(tick);
            event
        })
        .collect();

    let total_time = events.last().map(|e| e.time_seconds).unwrap_or(0.0);
    tracing::info!(
        "Imported {} MIDI events spanning {:.2}s",
        events.len(),
        total_time
    );

    Ok(MidiPayload {
        events,
        total_time,
        tempo: tempo_map.initial_bpm(),
        time_signature: time_signature.unwrap_or((4, 4)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Format 0 file at 480 ticks per beat: tempo 60 BPM, C4 held for one beat.
    fn one_note_file() -> Vec<u8> {
        let track: [u8; 20] = [
            0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // tempo 1_000_000 usec/beat
            0x00, 0x90, 0x3C, 0x64, // note on 60 vel 100
            0x83, 0x60, 0x80, 0x3C, 0x00, // +480 ticks, note off 60
            0x00, 0xFF, 0x2F, 0x00, // end of track
        ];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&480u16.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&track);
        bytes
    }

    #[test]
    fn test_tempo_map_segments() {
        let map = TempoMap::new(
            480,
            vec![TempoChange {
                tick: 960,
                usec_per_beat: 1_000_000,
            }],
        );
        // Two beats at 120 BPM, then one beat at 60 BPM.
        assert!((map.seconds_at(960) - 1.0).abs() < 1e-9);
        assert!((map.seconds_at(1440) - 2.0).abs() < 1e-9);
        assert_eq!(map.initial_bpm(), 120.0);
    }

    #[test]
    fn test_imports_notes_in_seconds() {
        let payload = import_from_bytes(&one_note_file()).unwrap();

        assert_eq!(payload.tempo, 60.0);
        assert_eq!(payload.events.len(), 2);
        assert_eq!(payload.events[1].time_seconds, 1.0);
        assert_eq!(payload.total_time, 1.0);

        let notes = payload.compile();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].velocity, 100);
    }

    #[test]
    fn test_import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mid");
        std::fs::write(&path, one_note_file()).unwrap();
        let payload = import_from_midi(&path).unwrap();
        assert_eq!(payload.events.len(), 2);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            import_from_bytes(b"not a midi file"),
            Err(MidiImportError::ParseError(_))
        ));
    }
}
