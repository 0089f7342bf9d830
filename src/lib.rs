//! storyroll - record short music stories and watch their notes.
//!
//! The library holds the pieces the terminal app is built from:
//! - [`midi`]: event payloads, live capture, and the note-interval compiler
//! - [`render`]: the timeline with linear, waterfall, and radial layouts
//! - [`session`]: the recording state machine and the story bundle it hands off
//! - [`audio`]: instrument engine, microphone, preview players, WAV I/O

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod render;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use app::{App, LoadedStory};
pub use audio::{AudioBuffer, AudioEngine, PreviewPlayer};
pub use config::StoryConfig;
pub use error::{Result, StoryError};
pub use midi::{compile, MidiEvent, MidiPayload, NoteInterval};
pub use render::{RendererKind, Timeline};
pub use session::{CaptureBundle, RecordingSession, RecordingSource, SessionState};
