//! Recording session state machine.
//!
//! A [`RecordingSession`] moves through `Idle -> Recording -> Preview` and
//! back to `Idle` on discard or confirm. It owns the MIDI capture, one audio
//! source per [`RecordingSource`], and the preview player.
//!
//! # Confirm hand-off
//!
//! [`RecordingSession::confirm`] always runs in this order:
//!
//! 1. move the recorded audio, MIDI and metadata into a new [`CaptureBundle`]
//! 2. reset the session to `Idle`
//! 3. hand the bundle to the caller
//!
//! The bundle shares nothing with the session, so whatever the caller does
//! with it (write it, upload it on another thread) cannot race a later tick
//! or UI action. [`RecordingSession::confirm_with`] runs a callback at step 3
//! and the callback already sees the session as `Idle`.

mod bundle;
mod source;

pub use bundle::{BundleFormat, BundleWriter, CaptureBundle, StoryManifest};
pub use source::{AudioSource, RecordingSource};

use crate::audio::{AudioBuffer, PreviewPlayer};
use crate::config::StoryConfig;
use crate::midi::{MidiCapture, MidiPayload, NoteInterval};
use std::collections::HashMap;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Preview,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Preview => "Preview",
        }
    }
}

/// User-entered story tags, cleared on every reset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoryMetadata {
    /// Filled from the source's tempo on stop when the source knows one.
    pub bpm: Option<u32>,
    pub key: Option<String>,
    pub genres: Vec<String>,
}

type DiscardCallback = Box<dyn FnMut()>;

pub struct RecordingSession {
    state: SessionState,
    source: RecordingSource,
    sources: HashMap<RecordingSource, Box<dyn AudioSource>>,
    capture: MidiCapture,
    preview: Box<dyn PreviewPlayer>,
    min_duration: f64,
    max_duration: f64,
    elapsed: f64,
    midi_activity: bool,
    recorded: AudioBuffer,
    payload: MidiPayload,
    notes: Vec<NoteInterval>,
    metadata: StoryMetadata,
    on_discard: Option<DiscardCallback>,
}

impl RecordingSession {
    /// Minimum take length before a manual stop is honored.
    pub const DEFAULT_MIN_DURATION: f64 = 5.0;
    /// Length at which a take stops on its own.
    pub const DEFAULT_MAX_DURATION: f64 = 60.0;

    /// A session with no audio sources registered yet.
    pub fn new(capture: MidiCapture, preview: Box<dyn PreviewPlayer>) -> Self {
        Self {
            state: SessionState::Idle,
            source: RecordingSource::default(),
            sources: HashMap::new(),
            capture,
            preview,
            min_duration: Self::DEFAULT_MIN_DURATION,
            max_duration: Self::DEFAULT_MAX_DURATION,
            elapsed: 0.0,
            midi_activity: false,
            recorded: AudioBuffer::default(),
            payload: MidiPayload::default(),
            notes: Vec::new(),
            metadata: StoryMetadata::default(),
            on_discard: None,
        }
    }

    /// Applies the duration limits from `config`.
    pub fn with_config(self, config: &StoryConfig) -> Self {
        self.with_limits(config.min_duration_secs, config.max_duration_secs)
    }

    pub fn with_limits(mut self, min_duration: f64, max_duration: f64) -> Self {
        self.min_duration = min_duration.max(0.0);
        self.max_duration = max_duration.max(self.min_duration);
        self
    }

    /// Registers the audio input used when `kind` is selected.
    pub fn with_source(mut self, kind: RecordingSource, source: Box<dyn AudioSource>) -> Self {
        self.sources.insert(kind, source);
        self
    }

    /// Sets the callback fired after every discard.
    pub fn set_on_discard<F: FnMut() + 'static>(&mut self, callback: F) {
        self.on_discard = Some(Box::new(callback));
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn recording_source(&self) -> RecordingSource {
        self.source
    }

    pub fn has_source(&self, kind: RecordingSource) -> bool {
        self.sources.contains_key(&kind)
    }

    /// Selects the input for the next take. Only allowed while idle, and
    /// only for a registered source.
    pub fn set_recording_source(&mut self, source: RecordingSource) -> bool {
        if self.state != SessionState::Idle {
            tracing::warn!("Cannot change recording source while {}", self.state.name());
            return false;
        }
        if !self.has_source(source) {
            tracing::warn!("Recording source {} is not available", source.name());
            return false;
        }
        self.source = source;
        tracing::info!("Recording source set to {}", source.name());
        true
    }

    /// Begins a take from the selected source.
    ///
    /// Returns false if not idle or if the source fails to start; the
    /// session then stays `Idle`.
    pub fn start(&mut self) -> bool {
        if self.state != SessionState::Idle {
            tracing::warn!("Cannot start recording while {}", self.state.name());
            return false;
        }
        let Some(source) = self.sources.get_mut(&self.source) else {
            tracing::warn!("No {} source to record from", self.source.name());
            return false;
        };
        if let Err(e) = source.start() {
            tracing::error!("Failed to start {} recording: {}", self.source.name(), e);
            return false;
        }
        if self.source.captures_midi() {
            self.capture.start_capture();
        }

        self.state = SessionState::Recording;
        self.elapsed = 0.0;
        self.midi_activity = false;
        tracing::info!("Recording started from {}", self.source.name());
        true
    }

    /// Polls the active source. Stops the take once it reaches the maximum
    /// duration.
    pub fn tick(&mut self) {
        if self.state != SessionState::Recording {
            return;
        }
        if let Some(source) = self.sources.get(&self.source) {
            self.elapsed = source.elapsed_seconds();
        }
        self.midi_activity = self.source.captures_midi()
            && self.capture.is_capturing()
            && self.capture.event_count() > 0;

        if self.elapsed >= self.max_duration {
            tracing::info!("Auto-stopping at max duration {:.0}s", self.max_duration);
            self.finish_recording();
        }
    }

    /// Whether a manual stop would be honored now.
    pub fn can_stop(&self) -> bool {
        self.state == SessionState::Recording && self.elapsed >= self.min_duration
    }

    /// Ends the take and moves to `Preview`.
    ///
    /// A no-op returning false unless recording for at least the minimum
    /// duration.
    pub fn stop(&mut self) -> bool {
        if self.state != SessionState::Recording {
            tracing::warn!("Cannot stop while {}", self.state.name());
            return false;
        }
        if !self.can_stop() {
            tracing::warn!(
                "Stop refused at {:.1}s; minimum is {:.0}s",
                self.elapsed,
                self.min_duration
            );
            return false;
        }
        self.finish_recording();
        true
    }

    fn finish_recording(&mut self) {
        let Some(source) = self.sources.get_mut(&self.source) else {
            return;
        };
        self.recorded = source.stop();
        let bpm = source.bpm();

        if self.source.captures_midi() {
            self.capture.stop_capture();
            self.payload = self.capture.normalized_payload();
            self.notes = self.payload.compile();
        } else {
            self.payload = MidiPayload::default();
            self.notes.clear();
        }

        if let Some(bpm) = bpm.filter(|b| b.is_finite() && *b > 0.0) {
            self.metadata.bpm = Some(bpm.round() as u32);
        }

        if !self.recorded.is_empty() {
            self.preview.load(&self.recorded);
        }

        self.state = SessionState::Preview;
        tracing::info!(
            "Recording stopped: {:.2}s of audio, {} notes",
            self.recorded.duration_secs(),
            self.notes.len()
        );
    }

    /// Throws the take away and returns to `Idle`, then fires the discard
    /// callback. Works from `Recording` or `Preview`.
    pub fn discard(&mut self) -> bool {
        if self.state == SessionState::Idle {
            tracing::warn!("Nothing to discard");
            return false;
        }
        tracing::info!("Discarding recording");
        self.reset();
        if let Some(on_discard) = self.on_discard.as_mut() {
            on_discard();
        }
        true
    }

    /// Confirms the take from `Preview`, returning the owned bundle.
    ///
    /// Snapshot, then reset, then return. A take with no samples resets the
    /// session and yields None. Outside `Preview` nothing happens.
    pub fn confirm(&mut self) -> Option<CaptureBundle> {
        if self.state != SessionState::Preview {
            tracing::warn!("Cannot confirm while {}", self.state.name());
            return None;
        }

        let bundle = if self.recorded.is_empty() {
            tracing::info!("Confirmed an empty recording; nothing to hand off");
            None
        } else {
            Some(self.snapshot())
        };
        self.reset();
        bundle
    }

    /// [`RecordingSession::confirm`], then `on_complete` with the bundle.
    ///
    /// `on_complete` runs at most once, after the reset, and not at all when
    /// there was nothing to hand off. Returns whether it ran.
    pub fn confirm_with<F>(&mut self, on_complete: F) -> bool
    where
        F: FnOnce(&RecordingSession, CaptureBundle),
    {
        match self.confirm() {
            Some(bundle) => {
                tracing::info!("Handing off story {}", bundle.id);
                on_complete(self, bundle);
                true
            }
            None => false,
        }
    }

    /// Moves the take out of the session.
    fn snapshot(&mut self) -> CaptureBundle {
        let audio = std::mem::take(&mut self.recorded);
        let metadata = std::mem::take(&mut self.metadata);
        CaptureBundle {
            id: CaptureBundle::new_id(),
            duration_seconds: audio.duration_secs(),
            audio,
            midi: std::mem::take(&mut self.payload),
            notes: std::mem::take(&mut self.notes),
            bpm: metadata.bpm,
            key: metadata.key,
            genres: metadata.genres,
            source: self.source,
        }
    }

    fn reset(&mut self) {
        self.preview.stop();
        self.preview.clear();
        if let Some(source) = self.sources.get_mut(&self.source) {
            source.reset();
        }
        self.capture.reset();

        self.state = SessionState::Idle;
        self.elapsed = 0.0;
        self.midi_activity = false;
        self.recorded = AudioBuffer::default();
        self.payload = MidiPayload::default();
        self.notes.clear();
        self.metadata = StoryMetadata::default();
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    pub fn max_duration(&self) -> f64 {
        self.max_duration
    }

    pub fn has_midi_activity(&self) -> bool {
        self.midi_activity
    }

    /// Notes compiled from the last take.
    pub fn notes(&self) -> &[NoteInterval] {
        &self.notes
    }

    /// Normalized MIDI of the last take.
    pub fn payload(&self) -> &MidiPayload {
        &self.payload
    }

    pub fn recorded_audio(&self) -> &AudioBuffer {
        &self.recorded
    }

    /// Live view of the MIDI being captured, for drawing while recording.
    pub fn live_payload(&self) -> MidiPayload {
        self.capture.payload()
    }

    pub fn metadata(&self) -> &StoryMetadata {
        &self.metadata
    }

    pub fn set_bpm(&mut self, bpm: Option<u32>) {
        self.metadata.bpm = bpm.filter(|b| *b > 0);
    }

    /// Sets the musical key; blank text clears it.
    pub fn set_key(&mut self, key: &str) {
        let key = key.trim();
        self.metadata.key = (!key.is_empty()).then(|| key.to_string());
    }

    pub fn set_genres(&mut self, genres: Vec<String>) {
        self.metadata.genres = genres;
    }

    /// Plays or pauses the preview, rewinding first if it ran to the end.
    pub fn toggle_preview(&mut self) {
        if self.state != SessionState::Preview || !self.preview.has_buffer() {
            return;
        }
        if self.preview.is_playing() {
            self.preview.pause();
        } else {
            if self.preview.position() >= self.preview.duration() {
                self.preview.seek(0.0);
            }
            self.preview.play();
        }
    }

    pub fn seek_preview(&mut self, seconds: f64) {
        if self.state == SessionState::Preview {
            self.preview.seek(seconds);
        }
    }

    pub fn preview_position(&self) -> f64 {
        match self.state {
            SessionState::Preview => self.preview.position(),
            _ => 0.0,
        }
    }

    pub fn is_preview_playing(&self) -> bool {
        self.state == SessionState::Preview && self.preview.is_playing()
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("state", &self.state)
            .field("source", &self.source)
            .field("elapsed", &self.elapsed)
            .field("notes", &self.notes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentPreview;
    use crate::error::StoryError;
    use crate::midi::{ChannelMessage, TimedMessage};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Source whose clock and samples are set by the test.
    #[derive(Default)]
    struct FakeSource {
        clock: Rc<Cell<f64>>,
        samples: usize,
        bpm: Option<f64>,
        fail_start: bool,
        resets: Rc<Cell<usize>>,
    }

    impl AudioSource for FakeSource {
        fn start(&mut self) -> crate::error::Result<()> {
            if self.fail_start {
                return Err(StoryError::audio("no device"));
            }
            self.clock.set(0.0);
            Ok(())
        }

        fn stop(&mut self) -> AudioBuffer {
            AudioBuffer::new(vec![0.1; self.samples], 1, 100)
        }

        fn elapsed_seconds(&self) -> f64 {
            self.clock.get()
        }

        fn reset(&mut self) {
            self.resets.set(self.resets.get() + 1);
        }

        fn bpm(&self) -> Option<f64> {
            self.bpm
        }
    }

    struct Rig {
        session: RecordingSession,
        clock: Rc<Cell<f64>>,
        mic_clock: Rc<Cell<f64>>,
        capture: MidiCapture,
    }

    fn rig(samples: usize) -> Rig {
        let clock = Rc::new(Cell::new(0.0));
        let mic_clock = Rc::new(Cell::new(0.0));
        let capture = MidiCapture::new();
        capture.prepare(100);
        let session = RecordingSession::new(capture.clone(), Box::new(SilentPreview::new()))
            .with_source(
                RecordingSource::Instrument,
                Box::new(FakeSource {
                    clock: Rc::clone(&clock),
                    samples,
                    bpm: Some(97.6),
                    ..FakeSource::default()
                }),
            )
            .with_source(
                RecordingSource::Microphone,
                Box::new(FakeSource {
                    clock: Rc::clone(&mic_clock),
                    samples,
                    ..FakeSource::default()
                }),
            );
        Rig {
            session,
            clock,
            mic_clock,
            capture,
        }
    }

    fn play_note(capture: &MidiCapture) {
        let on = TimedMessage {
            offset: 10,
            message: ChannelMessage::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 100,
            },
        };
        let off = TimedMessage {
            offset: 60,
            message: ChannelMessage::NoteOff {
                channel: 0,
                pitch: 60,
            },
        };
        capture.capture_block(&[on, off], 100);
    }

    fn record_for(rig: &mut Rig, seconds: f64) {
        assert!(rig.session.start());
        rig.clock.set(seconds);
        rig.session.tick();
    }

    #[test]
    fn test_stop_before_minimum_is_refused() {
        let mut rig = rig(500);
        record_for(&mut rig, 3.0);
        assert!(!rig.session.can_stop());
        assert!(!rig.session.stop());
        assert_eq!(rig.session.state(), SessionState::Recording);

        rig.clock.set(5.0);
        rig.session.tick();
        assert!(rig.session.stop());
        assert_eq!(rig.session.state(), SessionState::Preview);
    }

    #[test]
    fn test_auto_stop_at_maximum() {
        let mut rig = rig(500);
        record_for(&mut rig, 59.9);
        assert_eq!(rig.session.state(), SessionState::Recording);
        rig.clock.set(60.0);
        rig.session.tick();
        assert_eq!(rig.session.state(), SessionState::Preview);
    }

    #[test]
    fn test_confirm_resets_before_callback() {
        let mut rig = rig(500);
        record_for(&mut rig, 6.0);
        play_note(&rig.capture);
        rig.session.tick();
        assert!(rig.session.has_midi_activity());
        assert!(rig.session.stop());
        rig.session.set_key("C major");
        rig.session.set_genres(vec!["jazz".to_string()]);

        let calls = Cell::new(0);
        let seen = RefCell::new(None);
        let ran = rig.session.confirm_with(|session, bundle| {
            calls.set(calls.get() + 1);
            assert_eq!(session.state(), SessionState::Idle);
            assert!(session.recorded_audio().is_empty());
            assert!(session.notes().is_empty());
            *seen.borrow_mut() = Some(bundle);
        });

        assert!(ran);
        assert_eq!(calls.get(), 1);
        let bundle = seen.into_inner().unwrap();
        assert_eq!(bundle.audio.samples.len(), 500);
        assert_eq!(bundle.duration_seconds, 5.0);
        assert_eq!(bundle.bpm, Some(98));
        assert_eq!(bundle.key.as_deref(), Some("C major"));
        assert_eq!(bundle.genres, vec!["jazz".to_string()]);
        assert_eq!(bundle.notes.len(), 1);
        assert_eq!(bundle.notes[0].start_time, 0.0);
        assert!((bundle.notes[0].end_time - 0.5).abs() < 1e-9);
        assert_eq!(rig.session.metadata(), &StoryMetadata::default());
    }

    #[test]
    fn test_empty_take_confirms_without_bundle() {
        let mut rig = rig(0);
        record_for(&mut rig, 10.0);
        assert!(rig.session.stop());
        let ran = rig.session.confirm_with(|_, _| panic!("no bundle expected"));
        assert!(!ran);
        assert_eq!(rig.session.state(), SessionState::Idle);
    }

    #[test]
    fn test_confirm_only_from_preview() {
        let mut rig = rig(500);
        assert!(rig.session.confirm().is_none());
        record_for(&mut rig, 1.0);
        assert!(rig.session.confirm().is_none());
        assert_eq!(rig.session.state(), SessionState::Recording);
    }

    #[test]
    fn test_discard_fires_callback() {
        let mut rig = rig(500);
        let discarded = Rc::new(Cell::new(0));
        let counter = Rc::clone(&discarded);
        rig.session.set_on_discard(move || counter.set(counter.get() + 1));

        assert!(!rig.session.discard());
        record_for(&mut rig, 2.0);
        assert!(rig.session.discard());
        assert_eq!(rig.session.state(), SessionState::Idle);
        assert_eq!(rig.session.elapsed(), 0.0);

        record_for(&mut rig, 8.0);
        rig.session.stop();
        rig.session.set_bpm(Some(120));
        assert!(rig.session.discard());
        assert_eq!(discarded.get(), 2);
        assert_eq!(rig.session.metadata().bpm, None);
        assert!(!rig.capture.is_capturing());
    }

    #[test]
    fn test_source_change_only_when_idle() {
        let mut rig = rig(500);
        assert!(rig.session.set_recording_source(RecordingSource::Microphone));
        record_for(&mut rig, 0.0);
        assert!(!rig.session.set_recording_source(RecordingSource::Instrument));
        assert_eq!(rig.session.recording_source(), RecordingSource::Microphone);
    }

    #[test]
    fn test_microphone_take_has_no_midi() {
        let mut rig = rig(500);
        rig.session.set_recording_source(RecordingSource::Microphone);
        assert!(rig.session.start());
        assert!(!rig.capture.is_capturing());
        rig.mic_clock.set(7.0);
        rig.session.tick();
        assert_eq!(rig.session.elapsed(), 7.0);
        assert!(rig.session.stop());

        let bundle = rig.session.confirm().unwrap();
        assert_eq!(bundle.source, RecordingSource::Microphone);
        assert!(bundle.midi.is_empty());
        assert_eq!(bundle.bpm, None);
    }

    #[test]
    fn test_unregistered_or_failing_source() {
        let mut session =
            RecordingSession::new(MidiCapture::new(), Box::new(SilentPreview::new()));
        assert!(!session.set_recording_source(RecordingSource::Microphone));
        assert!(!session.start());

        let mut session = session.with_source(
            RecordingSource::Instrument,
            Box::new(FakeSource {
                fail_start: true,
                ..FakeSource::default()
            }),
        );
        assert!(!session.start());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_preview_transport() {
        let mut rig = rig(500);
        record_for(&mut rig, 5.0);
        rig.session.stop();

        rig.session.seek_preview(2.0);
        assert_eq!(rig.session.preview_position(), 2.0);
        rig.session.toggle_preview();
        assert!(rig.session.is_preview_playing());
        rig.session.toggle_preview();
        assert!(!rig.session.is_preview_playing());

        rig.session.seek_preview(5.0);
        rig.session.toggle_preview();
        assert!(rig.session.preview_position() < 1.0);
    }

    #[test]
    fn test_limits_from_config() {
        let config = StoryConfig {
            min_duration_secs: 1.0,
            max_duration_secs: 2.0,
            ..StoryConfig::default()
        };
        let mut rig = rig(500);
        rig.session = rig.session.with_config(&config);
        assert_eq!(rig.session.min_duration(), 1.0);
        record_for(&mut rig, 2.0);
        assert_eq!(rig.session.state(), SessionState::Preview);
    }
}
