//! Audio capture, synthesis and preview playback.
//!
//! This module provides the concrete collaborators of a recording session:
//! - The instrument engine (rustysynth + rodio), which is also the
//!   instrument-bus capture source
//! - Microphone capture from the default input device
//! - Preview players for recorded buffers
//! - WAV reading/writing and offline rendering of MIDI payloads

mod buffer;
pub mod engine;
pub mod microphone;
pub mod preview;
pub mod render;
pub mod wav;
pub mod waveform;

pub use buffer::AudioBuffer;
pub use engine::{AudioEngine, InstrumentCapture, SAMPLE_RATE};
pub use microphone::Microphone;
pub use preview::{PreviewPlayer, SilentPreview, SinkPreview};
pub use render::render_payload;
pub use wav::{read_wav, write_wav};
