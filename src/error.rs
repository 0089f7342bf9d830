//! Library error type.
//!
//! Only resource and persistence failures surface as errors. Malformed
//! payloads and rejected state transitions degrade to empty results or
//! no-ops and are logged where they happen.

use crate::midi::MidiImportError;

/// Result alias that carries [`StoryError`].
pub type Result<T> = std::result::Result<T, StoryError>;

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error(transparent)]
    MidiImport(#[from] MidiImportError),
    /// An audio device or synthesizer could not be opened.
    #[error("audio error: {0}")]
    Audio(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoryError {
    pub fn audio<T: Into<String>>(msg: T) -> Self {
        Self::Audio(msg.into())
    }
}
