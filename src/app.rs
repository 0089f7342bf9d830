//! Application state and event handling.
//!
//! [`App`] ties one [`Timeline`] to either a live [`RecordingSession`]
//! (record mode) or a [`LoadedStory`] (view mode). Each tick it pushes the
//! current clock into the timeline: elapsed time while recording, the
//! preview position otherwise.

use crate::audio::{waveform, AudioBuffer, AudioEngine, PreviewPlayer};
use crate::config::StoryConfig;
use crate::midi::NoteInterval;
use crate::render::{Timeline, TimelineOptions};
use crate::session::{
    BundleWriter, RecordingSession, RecordingSource, SessionState, StoryMetadata,
};
use crate::ui::canvas;
use ratatui::layout::Rect;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Keyboard to MIDI note mapping (piano layout).
///
/// Lower row (Z-M) covers C3 to B3, upper row (Q-I) C4 to C5, with the
/// black keys on the row above each.
pub const KEYBOARD_MAP: [(char, u8); 25] = [
    // Lower row (Z-M) = C3 to B3
    ('z', 48),
    ('s', 49),
    ('x', 50),
    ('d', 51),
    ('c', 52),
    ('v', 53),
    ('g', 54),
    ('b', 55),
    ('h', 56),
    ('n', 57),
    ('j', 58),
    ('m', 59),
    // Upper row (Q-U) = C4 to B4
    ('q', 60), // Middle C
    ('2', 61),
    ('w', 62),
    ('3', 63),
    ('e', 64),
    ('r', 65),
    ('5', 66),
    ('t', 67),
    ('6', 68),
    ('y', 69),
    ('7', 70),
    ('u', 71),
    ('i', 72),
];

/// Velocity of notes played from the computer keyboard.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Terminals without key release events only repeat presses, so a held note
/// is released once no press has refreshed it for this long.
const NOTE_HOLD: Duration = Duration::from_millis(600);

const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Number of bars in the waveform strip.
pub const WAVEFORM_BINS: usize = 256;

/// Keys offered when tagging a story.
pub const KEY_NAMES: [&str; 24] = [
    "C major", "C minor", "C# major", "C# minor", "D major", "D minor", "Eb major", "Eb minor",
    "E major", "E minor", "F major", "F minor", "F# major", "F# minor", "G major", "G minor",
    "Ab major", "Ab minor", "A major", "A minor", "Bb major", "Bb minor", "B major", "B minor",
];

/// A story opened for viewing: notes, optional audio, and a player for it.
pub struct LoadedStory {
    pub title: String,
    pub notes: Vec<NoteInterval>,
    pub duration: f64,
    pub audio: AudioBuffer,
    pub metadata: StoryMetadata,
    preview: Box<dyn PreviewPlayer>,
}

impl LoadedStory {
    /// Wraps a story; `preview` is loaded with `audio` when there is any.
    pub fn new(
        title: impl Into<String>,
        notes: Vec<NoteInterval>,
        duration: f64,
        audio: AudioBuffer,
        mut preview: Box<dyn PreviewPlayer>,
    ) -> Self {
        if !audio.is_empty() {
            preview.load(&audio);
        }
        let duration = duration.max(audio.duration_secs());
        Self {
            title: title.into(),
            notes,
            duration,
            audio,
            metadata: StoryMetadata::default(),
            preview,
        }
    }

    pub fn with_metadata(mut self, metadata: StoryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn position(&self) -> f64 {
        self.preview.position()
    }

    pub fn is_playing(&self) -> bool {
        self.preview.is_playing()
    }
}

/// Main application state.
pub struct App {
    pub timeline: Timeline,
    /// Present in record mode.
    pub session: Option<RecordingSession>,
    /// The instrument, when a SoundFont was loaded.
    pub engine: Option<AudioEngine>,
    /// Present in view mode.
    pub story: Option<LoadedStory>,
    pub config: StoryConfig,
    writer: BundleWriter,
    /// Tags applied to every new take.
    defaults: StoryMetadata,
    /// Manifests written during this run.
    pub saved: Vec<PathBuf>,
    pub status_message: Option<(String, Instant)>,
    pub show_help: bool,
    pub help_scroll: u16,
    /// Octave offset for keyboard input (-3 to +3).
    pub octave_offset: i8,
    held_notes: HashMap<u8, Instant>,
    canvas_area: Rect,
    last_state: SessionState,
    last_tick: Instant,
    waveform: Vec<f32>,
}

impl App {
    fn with_timeline(config: StoryConfig, writer: BundleWriter) -> Self {
        let options = TimelineOptions {
            lookahead_secs: config.lookahead_secs,
            radial_style: config.radial_style,
            color_mode: config.color_mode,
        };
        Self {
            timeline: Timeline::with_options(config.renderer, options),
            session: None,
            engine: None,
            story: None,
            config,
            writer,
            defaults: StoryMetadata::default(),
            saved: Vec::new(),
            status_message: None,
            show_help: false,
            help_scroll: 0,
            octave_offset: 0,
            held_notes: HashMap::new(),
            canvas_area: Rect::default(),
            last_state: SessionState::Idle,
            last_tick: Instant::now(),
            waveform: Vec::new(),
        }
    }

    /// Record mode around a session whose sources are already registered.
    ///
    /// # Arguments
    ///
    /// * `config` - Settings the session was built from
    /// * `session` - The recording session
    /// * `engine` - The instrument engine, if one was started
    /// * `writer` - Where confirmed stories go
    /// * `defaults` - Tags applied to every take
    pub fn record(
        config: StoryConfig,
        mut session: RecordingSession,
        engine: Option<AudioEngine>,
        writer: BundleWriter,
        defaults: StoryMetadata,
    ) -> Self {
        if !session.has_source(session.recording_source()) {
            let other = session.recording_source().toggle();
            session.set_recording_source(other);
        }
        let mut app = Self::with_timeline(config, writer);
        app.last_state = session.state();
        app.session = Some(session);
        app.engine = engine;
        app.defaults = defaults;
        app
    }

    /// View mode for a loaded story.
    pub fn view(config: StoryConfig, story: LoadedStory) -> Self {
        let writer = BundleWriter::new(config.output_dir.clone());
        let mut app = Self::with_timeline(config, writer);
        app.timeline.load_notes(story.notes.clone(), story.duration);
        app.waveform = waveform::peaks(&story.audio, WAVEFORM_BINS);
        app.story = Some(story);
        app
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    /// Session state, or None in view mode.
    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state())
    }

    pub fn waveform(&self) -> &[f32] {
        &self.waveform
    }

    /// Position of the clock driving the timeline.
    pub fn position_seconds(&self) -> f64 {
        self.timeline.playback_position()
    }

    pub fn is_playing(&self) -> bool {
        match (&self.session, &self.story) {
            (Some(session), _) => session.is_preview_playing(),
            (None, Some(story)) => story.is_playing(),
            _ => false,
        }
    }

    /// Stores the canvas rect from the last draw and resizes the timeline.
    pub fn set_canvas_area(&mut self, area: Rect) {
        self.canvas_area = area;
        self.timeline.set_bounds(canvas::bounds_for(area));
    }

    pub fn canvas_area(&self) -> Rect {
        self.canvas_area
    }

    /// Advances everything by one UI tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        self.clear_expired_status();
        self.release_stale_notes(now);

        if let Some(session) = self.session.as_mut() {
            session.tick();
        }
        self.sync_state();

        let position = match (&self.session, &self.story) {
            (Some(session), _) => match session.state() {
                SessionState::Recording => {
                    let live = session.live_payload();
                    self.timeline
                        .update_live(live.compile(), session.max_duration());
                    Some(session.elapsed())
                }
                SessionState::Preview => Some(session.preview_position()),
                SessionState::Idle => None,
            },
            (None, Some(story)) => Some(story.position()),
            _ => None,
        };
        if let Some(position) = position {
            self.timeline.set_playback_position(position);
        }
        self.timeline.tick(delta);
    }

    /// Reacts to session state changes, including the auto-stop at max
    /// duration which happens inside `tick`.
    fn sync_state(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let state = session.state();
        if state == self.last_state {
            return;
        }
        self.last_state = state;

        match state {
            SessionState::Recording | SessionState::Idle => {
                self.timeline.clear();
                self.waveform.clear();
            }
            SessionState::Preview => {
                if session.metadata().bpm.is_none() {
                    session.set_bpm(self.defaults.bpm);
                }
                if let Some(key) = self.defaults.key.as_deref() {
                    session.set_key(key);
                }
                session.set_genres(self.defaults.genres.clone());

                let duration = session
                    .recorded_audio()
                    .duration_secs()
                    .max(session.payload().total_time);
                let notes = session.notes().to_vec();
                let count = notes.len();
                self.timeline.load_notes(notes, duration);
                self.timeline.set_playback_position(0.0);
                self.waveform = waveform::peaks(session.recorded_audio(), WAVEFORM_BINS);
                self.release_all_notes();
                self.set_status(format!(
                    "Recorded {:.1}s, {} notes. Enter saves, Backspace discards",
                    duration, count
                ));
            }
        }
    }

    /// Starts or stops a take.
    pub fn toggle_recording(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.state() {
            SessionState::Idle => {
                if session.start() {
                    let source = session.recording_source().name();
                    self.set_status(format!("Recording from {}", source));
                } else {
                    self.set_status("Could not start recording");
                }
            }
            SessionState::Recording => {
                if !session.stop() {
                    let remaining = (session.min_duration() - session.elapsed()).max(0.0);
                    self.set_status(format!("Keep going: {:.0}s until stop", remaining.ceil()));
                }
            }
            SessionState::Preview => {
                self.set_status("Save or discard this take first");
            }
        }
        self.sync_state();
    }

    /// Enter: record, stop, or save depending on the state.
    pub fn primary_action(&mut self) {
        match self.state() {
            Some(SessionState::Preview) => self.confirm(),
            Some(_) => self.toggle_recording(),
            None => self.toggle_preview(),
        }
    }

    /// Confirms the take and writes it to the output directory.
    pub fn confirm(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state() != SessionState::Preview {
            return;
        }
        let writer = &self.writer;
        let mut written = None;
        let handed_off = session.confirm_with(|_, bundle| {
            written = Some(writer.write(&bundle));
        });

        match written {
            Some(Ok(path)) => {
                self.set_status(format!("Saved {}", path.display()));
                self.saved.push(path);
            }
            Some(Err(e)) => {
                tracing::error!("Failed to write story: {}", e);
                self.set_status(format!("Save failed: {}", e));
            }
            None if !handed_off => self.set_status("Nothing was recorded"),
            None => {}
        }
        self.sync_state();
    }

    /// Drops the current take.
    pub fn discard(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.discard() {
            self.release_all_notes();
            self.set_status("Take discarded");
        }
        self.sync_state();
    }

    /// Switches between instrument and microphone.
    pub fn toggle_source(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let next = session.recording_source().toggle();
        if session.set_recording_source(next) {
            self.set_status(format!("Source: {}", next.name()));
        } else if session.state() != SessionState::Idle {
            self.set_status("Source can only change while idle");
        } else {
            self.set_status(format!("{} is not available", next.name()));
        }
    }

    pub fn recording_source(&self) -> Option<RecordingSource> {
        self.session.as_ref().map(|s| s.recording_source())
    }

    /// Space: play or pause the preview.
    pub fn toggle_preview(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.toggle_preview();
            return;
        }
        if let Some(story) = self.story.as_mut() {
            let preview = &mut story.preview;
            if !preview.has_buffer() {
                self.set_status("No audio to play");
                return;
            }
            if preview.is_playing() {
                preview.pause();
            } else {
                if preview.position() >= preview.duration() {
                    preview.seek(0.0);
                }
                preview.play();
            }
        }
    }

    /// Seeks whichever preview is active.
    pub fn seek(&mut self, seconds: f64) {
        if let Some(session) = self.session.as_mut() {
            if session.state() != SessionState::Preview {
                return;
            }
            session.seek_preview(seconds);
        } else if let Some(story) = self.story.as_mut() {
            story.preview.seek(seconds);
        }
        self.timeline.set_playback_position(seconds);
    }

    /// Mouse click at a terminal cell; seeks when it lands on the timeline.
    ///
    /// Returns true if a seek happened.
    pub fn handle_canvas_click(&mut self, column: u16, row: u16) -> bool {
        if self.state() == Some(SessionState::Recording) {
            return false;
        }
        let Some(point) = canvas::cell_to_point(self.canvas_area, column, row) else {
            return false;
        };
        match self.timeline.click(point) {
            Some(time) => {
                self.seek(time);
                true
            }
            None => false,
        }
    }

    pub fn cycle_renderer(&mut self) {
        let next = self.timeline.kind().next();
        self.timeline.set_kind(next);
        self.config.renderer = next;
        self.set_status(format!("Renderer: {}", next.name()));
    }

    pub fn cycle_color_mode(&mut self) {
        let next = self.timeline.color_mode().next();
        self.timeline.set_color_mode(next);
        self.config.color_mode = next;
        self.set_status(format!("Color: {}", next.name()));
    }

    pub fn cycle_radial_style(&mut self) {
        let next = self.timeline.radial_style().next();
        self.timeline.set_radial_style(next);
        self.config.radial_style = next;
        self.set_status(format!("Radial style: {}", next.name()));
    }

    pub fn zoom(&mut self, factor: f64) {
        self.timeline.zoom_by(factor);
    }

    pub fn scroll(&mut self, steps: f64) {
        self.timeline.scroll_by(steps);
    }

    /// Changes the tagged tempo of the take under preview.
    pub fn adjust_bpm(&mut self, delta: i32) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state() != SessionState::Preview {
            return;
        }
        let current = session.metadata().bpm.unwrap_or(120) as i32;
        let bpm = (current + delta).clamp(20, 300) as u32;
        session.set_bpm(Some(bpm));
    }

    /// Steps the tagged key of the take under preview through [`KEY_NAMES`],
    /// ending with no key.
    pub fn cycle_key(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state() != SessionState::Preview {
            return;
        }
        let next = match session.metadata().key.as_deref() {
            None => KEY_NAMES[0],
            Some(current) => KEY_NAMES
                .iter()
                .position(|k| *k == current)
                .and_then(|i| KEY_NAMES.get(i + 1))
                .copied()
                .unwrap_or(""),
        };
        session.set_key(next);
    }

    /// Metadata shown in the transport bar.
    pub fn metadata(&self) -> Option<&StoryMetadata> {
        match (&self.session, &self.story) {
            (Some(session), _) => Some(session.metadata()),
            (None, Some(story)) => Some(&story.metadata),
            _ => None,
        }
    }

    fn note_for_key(&self, key: char) -> Option<u8> {
        let key_lower = key.to_ascii_lowercase();
        KEYBOARD_MAP
            .iter()
            .find(|(k, _)| *k == key_lower)
            .map(|(_, base)| *base as i16 + self.octave_offset as i16 * 12)
            .filter(|note| (0..=127).contains(note))
            .map(|note| note as u8)
    }

    /// Handles a keyboard key press for note input.
    ///
    /// Returns true if the key was handled as a note.
    pub fn handle_note_key(&mut self, key: char) -> bool {
        if self.state() == Some(SessionState::Preview) {
            return false;
        }
        let Some(engine) = self.engine.as_ref() else {
            return false;
        };
        let Some(note) = self.note_for_key(key) else {
            return false;
        };
        // A repeat while held only keeps the note alive.
        if self.held_notes.insert(note, Instant::now()).is_none() {
            engine.note_on(0, note, DEFAULT_VELOCITY);
        }
        true
    }

    /// Handles a keyboard key release.
    pub fn handle_note_key_release(&mut self, key: char) {
        let Some(note) = self.note_for_key(key) else {
            return;
        };
        if self.held_notes.remove(&note).is_some() {
            if let Some(engine) = self.engine.as_ref() {
                engine.note_off(0, note);
            }
        }
    }

    fn release_stale_notes(&mut self, now: Instant) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        self.held_notes.retain(|&note, pressed| {
            let keep = now.duration_since(*pressed) < NOTE_HOLD;
            if !keep {
                engine.note_off(0, note);
            }
            keep
        });
    }

    /// Releases all held notes.
    pub fn release_all_notes(&mut self) {
        if let Some(engine) = self.engine.as_ref() {
            for (note, _) in self.held_notes.drain() {
                engine.note_off(0, note);
            }
        } else {
            self.held_notes.clear();
        }
    }

    pub fn is_note_held(&self, note: u8) -> bool {
        self.held_notes.contains_key(&note)
    }

    pub fn octave_up(&mut self) {
        if self.octave_offset < 3 {
            self.release_all_notes();
            self.octave_offset += 1;
            self.set_status(format!("Octave {:+}", self.octave_offset));
        }
    }

    pub fn octave_down(&mut self) {
        if self.octave_offset > -3 {
            self.release_all_notes();
            self.octave_offset -= 1;
            self.set_status(format!("Octave {:+}", self.octave_offset));
        }
    }

    /// Steps the instrument program by `delta`, wrapping around 0-127.
    pub fn change_program(&mut self, delta: i16) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let program = (engine.program() as i16 + delta).rem_euclid(128) as u8;
        engine.set_program(program);
        let name = engine.instrument_name().to_string();
        self.set_status(format!("Instrument: {}", name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentPreview;
    use crate::error::Result as StoryResult;
    use crate::midi::MidiCapture;
    use crate::render::RendererKind;
    use crate::session::AudioSource;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Microphone stand-in whose clock the test drives.
    struct ClockSource {
        clock: Rc<Cell<f64>>,
    }

    impl AudioSource for ClockSource {
        fn start(&mut self) -> StoryResult<()> {
            self.clock.set(0.0);
            Ok(())
        }

        fn stop(&mut self) -> AudioBuffer {
            let frames = (self.clock.get() * 100.0) as usize;
            AudioBuffer::new(vec![0.25; frames], 1, 100)
        }

        fn elapsed_seconds(&self) -> f64 {
            self.clock.get()
        }

        fn reset(&mut self) {
            self.clock.set(0.0);
        }
    }

    fn record_app(dir: &std::path::Path) -> (App, Rc<Cell<f64>>) {
        let clock = Rc::new(Cell::new(0.0));
        let session = RecordingSession::new(MidiCapture::new(), Box::new(SilentPreview::new()))
            .with_limits(1.0, 10.0)
            .with_source(
                RecordingSource::Microphone,
                Box::new(ClockSource {
                    clock: Rc::clone(&clock),
                }),
            );
        let defaults = StoryMetadata {
            bpm: Some(90),
            key: Some("D minor".to_string()),
            genres: vec!["ambient".to_string()],
        };
        let app = App::record(
            StoryConfig::default(),
            session,
            None,
            BundleWriter::new(dir),
            defaults,
        );
        (app, clock)
    }

    #[test]
    fn test_record_falls_back_to_registered_source() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = record_app(dir.path());
        assert_eq!(app.recording_source(), Some(RecordingSource::Microphone));
    }

    #[test]
    fn test_record_preview_confirm_writes_story() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, clock) = record_app(dir.path());

        app.primary_action();
        assert_eq!(app.state(), Some(SessionState::Recording));

        clock.set(0.5);
        app.tick();
        app.primary_action();
        assert_eq!(app.state(), Some(SessionState::Recording));

        clock.set(2.0);
        app.tick();
        app.primary_action();
        assert_eq!(app.state(), Some(SessionState::Preview));
        assert!(!app.waveform().is_empty());

        let metadata = app.metadata().unwrap();
        assert_eq!(metadata.bpm, Some(90));
        assert_eq!(metadata.key.as_deref(), Some("D minor"));

        app.adjust_bpm(5);
        assert_eq!(app.metadata().unwrap().bpm, Some(95));

        app.primary_action();
        assert_eq!(app.state(), Some(SessionState::Idle));
        assert_eq!(app.saved.len(), 1);
        assert!(app.saved[0].exists());
        assert!(app.waveform().is_empty());
    }

    #[test]
    fn test_auto_stop_moves_to_preview() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, clock) = record_app(dir.path());
        app.toggle_recording();
        clock.set(10.0);
        app.tick();
        assert_eq!(app.state(), Some(SessionState::Preview));
        assert_eq!(app.timeline.total_duration(), 10.0);
    }

    #[test]
    fn test_discard_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, clock) = record_app(dir.path());
        app.toggle_recording();
        clock.set(3.0);
        app.toggle_recording();
        app.discard();
        assert_eq!(app.state(), Some(SessionState::Idle));
        assert!(app.saved.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cycle_key_wraps_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, clock) = record_app(dir.path());
        app.toggle_recording();
        clock.set(2.0);
        app.toggle_recording();
        app.session.as_mut().unwrap().set_key("");

        for _ in 0..=KEY_NAMES.len() {
            app.cycle_key();
        }
        assert_eq!(app.metadata().unwrap().key, None);
        app.cycle_key();
        assert_eq!(app.metadata().unwrap().key.as_deref(), Some("C major"));
    }

    #[test]
    fn test_view_mode_click_seeks() {
        let notes = vec![NoteInterval::new(0.0, 1.0, 60, 100, 0)];
        let story = LoadedStory::new(
            "demo",
            notes,
            4.0,
            AudioBuffer::default(),
            Box::new(SilentPreview::with_duration(4.0)),
        );
        let mut app = App::view(StoryConfig::default(), story);
        app.timeline.set_kind(RendererKind::Radial);
        app.set_canvas_area(Rect::new(0, 0, 50, 25));

        // Rightmost column of the middle row: three o'clock, a quarter in.
        assert!(app.handle_canvas_click(45, 12));
        assert!((app.position_seconds() - 1.0).abs() < 0.2);
        assert!(!app.handle_canvas_click(80, 12));
    }

    #[test]
    fn test_cycling_view_settings_updates_config() {
        let story = LoadedStory::new(
            "demo",
            Vec::new(),
            0.0,
            AudioBuffer::default(),
            Box::new(SilentPreview::new()),
        );
        let mut app = App::view(StoryConfig::default(), story);
        app.cycle_renderer();
        assert_eq!(app.config.renderer, RendererKind::Waterfall);
        app.cycle_color_mode();
        assert_eq!(app.config.color_mode, app.timeline.color_mode());
    }
}
