//! Sample-clocked MIDI capture.
//!
//! The audio side feeds note messages in blocks; each message is stamped
//! with `(block start sample + offset) / sample rate`. The UI side starts,
//! stops, and reads the capture through a cheap cloneable handle.
//!
//! Flags and clocks are atomics so the audio thread never waits on the UI.
//! The event list sits behind a mutex that is only held for appends and
//! copies.

use super::{EventKind, MidiEvent, MidiPayload, DEFAULT_TEMPO};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// A channel message delivered by the producer, with its offset in samples
/// from the start of the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedMessage {
    pub offset: usize,
    pub message: ChannelMessage,
}

/// The note messages the capture cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
}

impl ChannelMessage {
    fn to_event(self, time_seconds: f64) -> MidiEvent {
        match self {
            ChannelMessage::NoteOn {
                channel,
                pitch,
                velocity,
            } => MidiEvent::note_on(
                time_seconds,
                pitch as i32,
                velocity as i32,
                channel as i32,
            ),
            ChannelMessage::NoteOff { channel, pitch } => {
                MidiEvent::note_off(time_seconds, pitch as i32, channel as i32)
            }
        }
    }
}

struct CaptureShared {
    capturing: AtomicBool,
    sample_rate: AtomicU32,
    /// Samples elapsed since capture started.
    sample_position: AtomicU64,
    /// Tempo stored as `f64::to_bits`.
    tempo_bits: AtomicU64,
    sig_numerator: AtomicU8,
    sig_denominator: AtomicU8,
    events: Mutex<Vec<MidiEvent>>,
}

/// Handle to a MIDI capture. Clones share the same capture.
#[derive(Clone)]
pub struct MidiCapture {
    shared: Arc<CaptureShared>,
}

impl Default for MidiCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiCapture {
    /// Creates an idle capture at 44.1 kHz and 120 BPM.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(CaptureShared {
                capturing: AtomicBool::new(false),
                sample_rate: AtomicU32::new(44_100),
                sample_position: AtomicU64::new(0),
                tempo_bits: AtomicU64::new(DEFAULT_TEMPO.to_bits()),
                sig_numerator: AtomicU8::new(4),
                sig_denominator: AtomicU8::new(4),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Sets the sample rate used to convert sample positions to seconds.
    pub fn prepare(&self, sample_rate: u32) {
        self.shared.sample_rate.store(sample_rate, Ordering::Relaxed);
    }

    /// Clears events and the sample clock, and begins stamping messages.
    pub fn start_capture(&self) {
        self.clear_events();
        self.shared.sample_position.store(0, Ordering::Relaxed);
        self.shared.capturing.store(true, Ordering::Release);
        tracing::info!("MIDI capture started");
    }

    /// Stops stamping messages and returns a copy of what was captured.
    pub fn stop_capture(&self) -> Vec<MidiEvent> {
        self.shared.capturing.store(false, Ordering::Release);
        let events = self.events();
        tracing::info!(
            "MIDI capture stopped: {} events over {:.2}s",
            events.len(),
            self.total_time()
        );
        events
    }

    /// Stops capturing and discards everything captured so far.
    pub fn reset(&self) {
        self.shared.capturing.store(false, Ordering::Release);
        self.shared.sample_position.store(0, Ordering::Relaxed);
        self.clear_events();
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.capturing.load(Ordering::Acquire)
    }

    /// Records one block of messages from the producer.
    ///
    /// Stamps every message relative to the block start, then advances the
    /// sample clock by `num_samples`. Does nothing while not capturing.
    pub fn capture_block(&self, messages: &[TimedMessage], num_samples: usize) {
        if !self.is_capturing() {
            return;
        }

        let block_start = self.shared.sample_position.load(Ordering::Relaxed);
        if !messages.is_empty() {
            let sample_rate = self.shared.sample_rate.load(Ordering::Relaxed);
            if let Ok(mut events) = self.shared.events.lock() {
                for timed in messages {
                    let time = samples_to_seconds(block_start + timed.offset as u64, sample_rate);
                    events.push(timed.message.to_event(time));
                }
            }
        }
        self.shared
            .sample_position
            .store(block_start + num_samples as u64, Ordering::Relaxed);
    }

    /// Seconds covered by the capture clock.
    pub fn total_time(&self) -> f64 {
        samples_to_seconds(
            self.shared.sample_position.load(Ordering::Relaxed),
            self.shared.sample_rate.load(Ordering::Relaxed),
        )
    }

    pub fn event_count(&self) -> usize {
        self.shared.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Copy of the raw captured events.
    pub fn events(&self) -> Vec<MidiEvent> {
        self.shared
            .events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.shared.tempo_bits.store(bpm.to_bits(), Ordering::Relaxed);
    }

    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.shared.tempo_bits.load(Ordering::Relaxed))
    }

    pub fn set_time_signature(&self, numerator: u8, denominator: u8) {
        self.shared.sig_numerator.store(numerator, Ordering::Relaxed);
        self.shared
            .sig_denominator
            .store(denominator, Ordering::Relaxed);
    }

    pub fn time_signature(&self) -> (u8, u8) {
        (
            self.shared.sig_numerator.load(Ordering::Relaxed),
            self.shared.sig_denominator.load(Ordering::Relaxed),
        )
    }

    /// The raw capture as a payload.
    pub fn payload(&self) -> MidiPayload {
        self.build_payload(self.events())
    }

    /// The capture shifted to start at zero and cleaned by [`validate_events`].
    pub fn normalized_payload(&self) -> MidiPayload {
        let events = validate_events(&normalize_timing(&self.events()));
        self.build_payload(events)
    }

    fn build_payload(&self, events: Vec<MidiEvent>) -> MidiPayload {
        MidiPayload {
            events,
            total_time: self.total_time(),
            tempo: self.tempo(),
            time_signature: self.time_signature(),
        }
    }

    fn clear_events(&self) {
        if let Ok(mut events) = self.shared.events.lock() {
            events.clear();
        }
    }
}

fn samples_to_seconds(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate > 0 {
        samples as f64 / sample_rate as f64
    } else {
        0.0
    }
}

/// Shifts events so the earliest sits at 0.0 and rounds times to the millisecond.
pub fn normalize_timing(events: &[MidiEvent]) -> Vec<MidiEvent> {
    let Some(min_time) = events
        .iter()
        .map(|e| e.time_seconds)
        .min_by(|a, b| a.total_cmp(b))
    else {
        return Vec::new();
    };

    events
        .iter()
        .map(|e| MidiEvent {
            time_seconds: ((e.time_seconds - min_time) * 1000.0).round() / 1000.0,
            ..*e
        })
        .collect()
}

/// Cleans a captured event list before it leaves the capture.
///
/// - drops events whose pitch or velocity is outside 0..=127 or channel outside 0..=15
/// - drops near-duplicates sharing a 0.1 ms time bucket, kind, pitch, and channel
/// - drops releases with no sounding note and rewrites velocity-0 note-ons as note-offs
/// - appends note-offs at the last event time for notes still sounding
pub fn validate_events(events: &[MidiEvent]) -> Vec<MidiEvent> {
    let mut validated = Vec::with_capacity(events.len());
    let mut sounding: BTreeSet<(i32, i32)> = BTreeSet::new();
    let mut seen: HashSet<(i64, EventKind, i32, i32)> = HashSet::new();

    for event in events {
        if !(0..=127).contains(&event.pitch) {
            tracing::debug!("Dropping event with invalid note {}", event.pitch);
            continue;
        }
        if !(0..=127).contains(&event.velocity) {
            tracing::debug!("Dropping event with invalid velocity {}", event.velocity);
            continue;
        }
        if !(0..=15).contains(&event.channel) {
            tracing::debug!("Dropping event with invalid channel {}", event.channel);
            continue;
        }

        let bucket = (event.time_seconds * 10_000.0) as i64;
        if !seen.insert((bucket, event.kind, event.pitch, event.channel)) {
            tracing::debug!("Dropping duplicate event for note {}", event.pitch);
            continue;
        }

        if event.is_onset() {
            sounding.insert(event.key());
            validated.push(*event);
        } else if sounding.remove(&event.key()) {
            validated.push(MidiEvent {
                kind: EventKind::NoteOff,
                ..*event
            });
        } else {
            tracing::debug!("Dropping orphan note-off for note {}", event.pitch);
        }
    }

    if let Some(end_time) = validated.last().map(|e| e.time_seconds) {
        for (channel, pitch) in sounding {
            validated.push(MidiEvent::note_off(end_time, pitch, channel));
        }
    }

    tracing::debug!(
        "Validated {} of {} captured events",
        validated.len(),
        events.len()
    );
    validated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(channel: u8, pitch: u8, offset: usize) -> TimedMessage {
        TimedMessage {
            offset,
            message: ChannelMessage::NoteOn {
                channel,
                pitch,
                velocity: 100,
            },
        }
    }

    fn off(channel: u8, pitch: u8, offset: usize) -> TimedMessage {
        TimedMessage {
            offset,
            message: ChannelMessage::NoteOff { channel, pitch },
        }
    }

    #[test]
    fn test_ignores_blocks_while_idle() {
        let capture = MidiCapture::new();
        capture.capture_block(&[on(0, 60, 0)], 512);
        assert_eq!(capture.event_count(), 0);
        assert_eq!(capture.total_time(), 0.0);
    }

    #[test]
    fn test_stamps_messages_with_sample_clock() {
        let capture = MidiCapture::new();
        capture.prepare(1000);
        capture.start_capture();
        capture.capture_block(&[on(0, 60, 0)], 500);
        capture.capture_block(&[off(0, 60, 250)], 500);

        let events = capture.stop_capture();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time_seconds, 0.0);
        assert_eq!(events[1].time_seconds, 0.75);
        assert_eq!(events[1].kind, EventKind::NoteOff);
        assert_eq!(capture.total_time(), 1.0);
        assert!(!capture.is_capturing());
    }

    #[test]
    fn test_clones_share_state() {
        let capture = MidiCapture::new();
        let producer = capture.clone();
        capture.start_capture();
        producer.capture_block(&[on(2, 64, 0)], 64);
        assert_eq!(capture.event_count(), 1);
        capture.reset();
        assert_eq!(producer.event_count(), 0);
        assert!(!producer.is_capturing());
    }

    #[test]
    fn test_normalize_timing_shifts_and_rounds() {
        let events = [
            MidiEvent::note_on(2.5004, 60, 100, 0),
            MidiEvent::note_off(3.12345, 60, 0),
        ];
        let normalized = normalize_timing(&events);
        assert_eq!(normalized[0].time_seconds, 0.0);
        assert_eq!(normalized[1].time_seconds, 0.623);
        assert!(normalize_timing(&[]).is_empty());
    }

    #[test]
    fn test_validate_filters_out_of_range() {
        let events = [
            MidiEvent::note_on(0.0, 128, 100, 0),
            MidiEvent::note_on(0.0, 60, 130, 0),
            MidiEvent::note_on(0.0, 60, 100, 16),
            MidiEvent::note_on(0.0, 61, 100, 15),
            MidiEvent::note_off(0.5, 61, 15),
        ];
        let validated = validate_events(&events);
        assert_eq!(validated.len(), 2);
        assert_eq!(validated[0].channel, 15);
    }

    #[test]
    fn test_validate_drops_duplicates_and_orphans() {
        let events = [
            MidiEvent::note_off(0.0, 62, 0),
            MidiEvent::note_on(0.1, 60, 100, 0),
            MidiEvent::note_on(0.10001, 60, 100, 0),
            MidiEvent::note_on(0.4, 60, 0, 0),
        ];
        let validated = validate_events(&events);
        assert_eq!(
            validated,
            vec![
                MidiEvent::note_on(0.1, 60, 100, 0),
                MidiEvent::note_off(0.4, 60, 0),
            ]
        );
    }

    #[test]
    fn test_validate_closes_held_notes_at_last_event() {
        let events = [
            MidiEvent::note_on(0.0, 64, 100, 1),
            MidiEvent::note_on(0.2, 60, 100, 0),
            MidiEvent::note_off(0.9, 60, 0),
        ];
        let validated = validate_events(&events);
        assert_eq!(validated.len(), 4);
        assert_eq!(validated[3], MidiEvent::note_off(0.9, 64, 1));
    }

    #[test]
    fn test_normalized_payload_carries_tempo_and_signature() {
        let capture = MidiCapture::new();
        capture.prepare(100);
        capture.set_tempo(90.0);
        capture.set_time_signature(3, 4);
        capture.start_capture();
        capture.capture_block(&[], 10);
        capture.capture_block(&[on(0, 60, 0)], 10);
        capture.capture_block(&[off(0, 60, 5)], 10);

        let payload = capture.normalized_payload();
        assert_eq!(payload.tempo, 90.0);
        assert_eq!(payload.time_signature, (3, 4));
        assert!((payload.total_time - 0.3).abs() < 1e-9);
        assert_eq!(payload.events[0].time_seconds, 0.0);
        assert_eq!(payload.events[1].time_seconds, 0.15);
    }
}
