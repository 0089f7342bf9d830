//! Preview playback of a recorded buffer.
//!
//! [`SinkPreview`] plays through a rodio `Sink`. [`SilentPreview`] only runs
//! a clock, for viewing stories without an output device and for tests.

use super::AudioBuffer;
use crate::error::{Result, StoryError};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::{Duration, Instant};

/// Transport for the recorded buffer shown in preview.
pub trait PreviewPlayer {
    /// Replaces the loaded buffer and rewinds. Playback starts paused.
    fn load(&mut self, buffer: &AudioBuffer);

    /// Drops the loaded buffer.
    fn clear(&mut self);

    fn has_buffer(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    /// Pauses and rewinds to the start.
    fn stop(&mut self);

    /// Moves to `seconds`, clamped to the buffer.
    fn seek(&mut self, seconds: f64);

    /// Current position in seconds.
    fn position(&self) -> f64;

    /// Length of the loaded buffer in seconds.
    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;
}

/// Clock-only player. Time advances with the wall clock while playing.
#[derive(Debug, Default)]
pub struct SilentPreview {
    duration: f64,
    loaded: bool,
    /// Position when the clock was last started or moved.
    offset: f64,
    started: Option<Instant>,
}

impl SilentPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock over `duration` seconds with nothing to play, used for MIDI-only stories.
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            loaded: duration > 0.0,
            ..Self::default()
        }
    }
}

impl PreviewPlayer for SilentPreview {
    fn load(&mut self, buffer: &AudioBuffer) {
        self.duration = buffer.duration_secs();
        self.loaded = !buffer.is_empty();
        self.offset = 0.0;
        self.started = None;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn has_buffer(&self) -> bool {
        self.loaded
    }

    fn play(&mut self) {
        if self.loaded && self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.started = None;
    }

    fn stop(&mut self) {
        self.offset = 0.0;
        self.started = None;
    }

    fn seek(&mut self, seconds: f64) {
        self.offset = seconds.clamp(0.0, self.duration);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        let running = self
            .started
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.offset + running).min(self.duration)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.started.is_some() && self.position() < self.duration
    }
}

/// Plays the buffer on an audio output through a rodio `Sink`.
pub struct SinkPreview {
    /// Only set when this player opened its own output stream.
    _stream: Option<OutputStream>,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    source: Option<AudioBuffer>,
}

impl SinkPreview {
    /// Plays through an existing output, such as the instrument engine's.
    pub fn with_handle(handle: OutputStreamHandle) -> Self {
        Self {
            _stream: None,
            handle,
            sink: None,
            source: None,
        }
    }

    /// Opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Audio`] if no output device can be opened.
    pub fn open_default() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| StoryError::audio(format!("Failed to open audio output: {}", e)))?;
        Ok(Self {
            _stream: Some(stream),
            ..Self::with_handle(handle)
        })
    }

    /// Builds a paused sink holding a fresh copy of the source buffer.
    fn rebuild_sink(&mut self) {
        let Some(buffer) = self.source.as_ref() else {
            return;
        };
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.pause();
                sink.append(SamplesBuffer::new(
                    buffer.channels,
                    buffer.sample_rate,
                    buffer.samples.clone(),
                ));
                self.sink = Some(sink);
            }
            Err(e) => {
                tracing::error!("Failed to create preview sink: {}", e);
                self.sink = None;
            }
        }
    }
}

impl PreviewPlayer for SinkPreview {
    fn load(&mut self, buffer: &AudioBuffer) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        if buffer.is_empty() {
            self.source = None;
            return;
        }
        self.source = Some(buffer.clone());
        self.rebuild_sink();
        tracing::info!(
            "Preview loaded {:.2}s at {} Hz",
            buffer.duration_secs(),
            buffer.sample_rate
        );
    }

    fn clear(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.source = None;
    }

    fn has_buffer(&self) -> bool {
        self.source.is_some()
    }

    fn play(&mut self) {
        // A sink that ran to the end has dropped its source.
        if self.sink.as_ref().map_or(true, Sink::empty) {
            self.rebuild_sink();
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if self.sink.is_some() {
            self.rebuild_sink();
        }
    }

    fn seek(&mut self, seconds: f64) {
        let target = Duration::from_secs_f64(seconds.clamp(0.0, self.duration()));
        if self.sink.as_ref().map_or(true, Sink::empty) {
            self.rebuild_sink();
        }
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.try_seek(target) {
                tracing::warn!("Preview seek failed: {:?}", e);
            }
        }
    }

    fn position(&self) -> f64 {
        match &self.sink {
            Some(sink) if !sink.empty() => sink.get_pos().as_secs_f64().min(self.duration()),
            Some(_) => self.duration(),
            None => 0.0,
        }
    }

    fn duration(&self) -> f64 {
        self.source
            .as_ref()
            .map(AudioBuffer::duration_secs)
            .unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second() -> AudioBuffer {
        AudioBuffer::new(vec![0.0; 8_000], 1, 8_000)
    }

    #[test]
    fn test_silent_preview_transport() {
        let mut player = SilentPreview::new();
        assert!(!player.has_buffer());
        player.play();
        assert!(!player.is_playing());

        player.load(&one_second());
        assert!(player.has_buffer());
        assert_eq!(player.duration(), 1.0);

        player.seek(0.75);
        assert_eq!(player.position(), 0.75);
        player.seek(5.0);
        assert_eq!(player.position(), 1.0);

        player.stop();
        assert_eq!(player.position(), 0.0);
        player.play();
        assert!(player.is_playing());
        player.pause();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_silent_preview_clear() {
        let mut player = SilentPreview::new();
        player.load(&one_second());
        player.clear();
        assert!(!player.has_buffer());
        assert_eq!(player.duration(), 0.0);
    }

    #[test]
    fn test_midi_only_clock() {
        let player = SilentPreview::with_duration(4.0);
        assert!(player.has_buffer());
        assert_eq!(player.duration(), 4.0);
        assert!(!SilentPreview::with_duration(0.0).has_buffer());
    }
}
