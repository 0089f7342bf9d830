//! Confirmed recordings and the outbox they are written to.
//!
//! A [`CaptureBundle`] is the owned hand-off produced by
//! [`super::RecordingSession::confirm`]. [`BundleWriter`] stores one as
//! `<id>.wav` next to a manifest, `<id>.json` or `<id>.story` (bincode),
//! which is also what `storyroll view` reads back.

use super::RecordingSource;
use crate::audio::{write_wav, AudioBuffer};
use crate::error::Result;
use crate::midi::{MidiPayload, NoteInterval};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Everything captured for one story, owned outright by whoever receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureBundle {
    pub id: String,
    pub audio: AudioBuffer,
    /// Normalized MIDI capture; empty for microphone recordings.
    pub midi: MidiPayload,
    /// `midi` compiled into intervals.
    pub notes: Vec<NoteInterval>,
    pub duration_seconds: f64,
    pub bpm: Option<u32>,
    pub key: Option<String>,
    pub genres: Vec<String>,
    pub source: RecordingSource,
}

impl CaptureBundle {
    /// Generates a fresh random id.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// On-disk description of a story. The audio lives in a sibling WAV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryManifest {
    pub id: String,
    /// File name of the audio next to the manifest, if any audio was recorded.
    pub audio_file: Option<String>,
    pub duration_seconds: f64,
    pub bpm: Option<u32>,
    pub key: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub source: RecordingSource,
    pub midi: MidiPayload,
    #[serde(default)]
    pub notes: Vec<NoteInterval>,
}

impl StoryManifest {
    /// Reads a manifest; `.story` files are bincode, anything else JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let manifest = match BundleFormat::from_path(path) {
            BundleFormat::Binary => bincode::deserialize_from(reader)?,
            BundleFormat::Json => serde_json::from_reader(reader)?,
        };
        Ok(manifest)
    }

    /// Path of the audio file for a manifest stored at `manifest_path`.
    pub fn audio_path(&self, manifest_path: &Path) -> Option<PathBuf> {
        let name = self.audio_file.as_ref()?;
        Some(
            manifest_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(name),
        )
    }
}

/// Manifest encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleFormat {
    #[default]
    Json,
    Binary,
}

impl BundleFormat {
    pub fn extension(self) -> &'static str {
        match self {
            BundleFormat::Json => "json",
            BundleFormat::Binary => "story",
        }
    }

    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("story") => BundleFormat::Binary,
            _ => BundleFormat::Json,
        }
    }
}

/// Writes confirmed bundles into an output directory.
#[derive(Debug, Clone)]
pub struct BundleWriter {
    dir: PathBuf,
    format: BundleFormat,
}

impl BundleWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            format: BundleFormat::default(),
        }
    }

    pub fn with_format(mut self, format: BundleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores `bundle` and returns the manifest path.
    ///
    /// # Errors
    ///
    /// Returns error if the directory, audio, or manifest cannot be written.
    pub fn write(&self, bundle: &CaptureBundle) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let audio_file = if bundle.audio.is_empty() {
            None
        } else {
            let name = format!("{}.wav", bundle.id);
            write_wav(self.dir.join(&name), &bundle.audio)?;
            Some(name)
        };

        let manifest = StoryManifest {
            id: bundle.id.clone(),
            audio_file,
            duration_seconds: bundle.duration_seconds,
            bpm: bundle.bpm,
            key: bundle.key.clone(),
            genres: bundle.genres.clone(),
            source: bundle.source,
            midi: bundle.midi.clone(),
            notes: bundle.notes.clone(),
        };

        let path = self
            .dir
            .join(format!("{}.{}", bundle.id, self.format.extension()));
        let writer = BufWriter::new(File::create(&path)?);
        match self.format {
            BundleFormat::Json => serde_json::to_writer_pretty(writer, &manifest)?,
            BundleFormat::Binary => bincode::serialize_into(writer, &manifest)?,
        }

        tracing::info!("Story {} written to {}", bundle.id, path.display());
        Ok(path)
    }
}
