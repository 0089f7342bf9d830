//! Instrument engine: real-time synthesis that doubles as a capture source.
//!
//! Notes played on the computer keyboard are queued for the audio thread,
//! which applies them to the rustysynth synthesizer at the start of the next
//! block. The same block feeds the MIDI capture clock and, while recording,
//! is tapped into a sample buffer. That makes the engine the instrument-bus
//! source of a recording session.

use super::AudioBuffer;
use crate::error::Result as StoryResult;
use crate::midi::{ChannelMessage, MidiCapture, TimedMessage};
use crate::session::AudioSource;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// State shared between the engine, its capture handles, and the audio thread.
struct EngineShared {
    /// Whether rendered blocks are being tapped.
    recording: AtomicBool,
    /// Interleaved stereo samples rendered since recording started.
    recorded: Mutex<Vec<f32>>,
    /// Messages waiting for the next block.
    pending: Mutex<Vec<ChannelMessage>>,
    capture: MidiCapture,
    /// Host tempo as `f64::to_bits`, or 0 when unknown.
    bpm_bits: AtomicU64,
}

impl EngineShared {
    fn new(capture: MidiCapture) -> Self {
        Self {
            recording: AtomicBool::new(false),
            recorded: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            capture,
            bpm_bits: AtomicU64::new(0),
        }
    }

    fn queue(&self, message: ChannelMessage) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(message);
        }
    }

    /// Takes the queued messages, stamped at the start of the block.
    fn take_pending(&self) -> Vec<TimedMessage> {
        self.pending
            .lock()
            .map(|mut pending| {
                pending
                    .drain(..)
                    .map(|message| TimedMessage { offset: 0, message })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Feeds a rendered block to the MIDI capture and the recording tap.
    fn finish_block(&self, messages: &[TimedMessage], left: &[f32], right: &[f32]) {
        self.capture.capture_block(messages, left.len());
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.reserve(left.len() * 2);
            for (l, r) in left.iter().zip(right) {
                recorded.push(*l);
                recorded.push(*r);
            }
        }
    }

    fn recorded_seconds(&self) -> f64 {
        let samples = self.recorded.lock().map(|r| r.len()).unwrap_or(0);
        samples as f64 / 2.0 / SAMPLE_RATE as f64
    }

    fn bpm(&self) -> Option<f64> {
        let bits = self.bpm_bits.load(Ordering::Relaxed);
        (bits != 0).then(|| f64::from_bits(bits))
    }
}

/// Audio source that generates samples from the synthesizer.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    synth: Arc<Mutex<Synthesizer>>,
    shared: Arc<EngineShared>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    /// Current position in the buffer.
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(synth: Arc<Mutex<Synthesizer>>, shared: Arc<EngineShared>) -> Self {
        Self {
            synth,
            shared,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }

    fn render_block(&mut self) {
        let messages = self.shared.take_pending();
        if let Ok(mut synth) = self.synth.lock() {
            for timed in &messages {
                match timed.message {
                    ChannelMessage::NoteOn {
                        channel,
                        pitch,
                        velocity,
                    } => synth.note_on(channel as i32, pitch as i32, velocity as i32),
                    ChannelMessage::NoteOff { channel, pitch } => {
                        synth.note_off(channel as i32, pitch as i32)
                    }
                }
            }
            synth.render(&mut self.left_buf, &mut self.right_buf);
        } else {
            // Only fill with silence if we can't get the lock
            self.left_buf.fill(0.0);
            self.right_buf.fill(0.0);
        }
        self.shared
            .finish_block(&messages, &self.left_buf, &self.right_buf);
        self.buf_pos = 0;
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            self.render_block();
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2 // Stereo
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// Loads a SoundFont file.
///
/// # Errors
///
/// Returns error if the file cannot be opened or is not a valid SoundFont.
pub fn load_soundfont<P: AsRef<Path>>(path: P) -> Result<Arc<SoundFont>> {
    let mut file = BufReader::new(File::open(path.as_ref()).with_context(|| {
        format!("Failed to open SoundFont: {}", path.as_ref().display())
    })?);
    let soundfont = SoundFont::new(&mut file)
        .map_err(|e| anyhow::anyhow!("Failed to load SoundFont: {:?}", e))?;
    Ok(Arc::new(soundfont))
}

/// The live instrument: synthesizer, output stream, and capture tap.
pub struct AudioEngine {
    /// The synthesizer (wrapped for sharing with audio thread).
    synth: Arc<Mutex<Synthesizer>>,
    shared: Arc<EngineShared>,
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    /// Instrument names extracted from the loaded SoundFont.
    /// Indexed by program number (0-127). Falls back to "Program N" if not found.
    instrument_names: [String; 128],
    program: u8,
}

impl AudioEngine {
    /// Creates a new audio engine with the specified SoundFont.
    ///
    /// # Arguments
    ///
    /// * `soundfont_path` - Path to the SoundFont file (.sf2)
    /// * `capture` - MIDI capture fed by the engine's sample clock
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The SoundFont file cannot be read
    /// - The SoundFont is invalid
    /// - Audio output cannot be initialized
    pub fn new<P: AsRef<Path>>(soundfont_path: P, capture: MidiCapture) -> Result<Self> {
        let soundfont = load_soundfont(soundfont_path)?;
        let instrument_names = Self::extract_instrument_names(&soundfont);

        let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let synth = Synthesizer::new(&soundfont, &settings)
            .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;
        let synth = Arc::new(Mutex::new(synth));

        capture.prepare(SAMPLE_RATE);
        let shared = Arc::new(EngineShared::new(capture));

        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;

        let source = SynthSource::new(Arc::clone(&synth), Arc::clone(&shared));
        stream_handle
            .play_raw(source)
            .context("Failed to start audio playback")?;

        tracing::info!("Audio engine started at {} Hz", SAMPLE_RATE);

        Ok(Self {
            synth,
            shared,
            _stream: stream,
            stream_handle,
            instrument_names,
            program: 0,
        })
    }

    /// Maps program numbers (0-127) to preset names from bank 0 (General MIDI bank).
    /// If a program number has no preset in the SoundFont, falls back to "Program N".
    fn extract_instrument_names(soundfont: &SoundFont) -> [String; 128] {
        let mut names: [String; 128] = std::array::from_fn(|i| format!("Program {}", i));

        for preset in soundfont.get_presets() {
            let bank = preset.get_bank_number();
            let program = preset.get_patch_number();

            if bank == 0 && (0..128).contains(&program) {
                names[program as usize] = preset.get_name().to_string();
            }
        }

        names
    }

    /// Name of the instrument currently selected on channel 0.
    pub fn instrument_name(&self) -> &str {
        &self.instrument_names[self.program as usize]
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    /// Plays a note at the start of the next audio block.
    ///
    /// # Arguments
    ///
    /// * `channel` - MIDI channel (0-15)
    /// * `note` - MIDI note number (0-127)
    /// * `velocity` - Note velocity (0-127)
    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) {
        self.shared.queue(ChannelMessage::NoteOn {
            channel,
            pitch: note,
            velocity,
        });
    }

    /// Releases a note at the start of the next audio block.
    pub fn note_off(&self, channel: u8, note: u8) {
        self.shared.queue(ChannelMessage::NoteOff {
            channel,
            pitch: note,
        });
    }

    /// Stops all playing notes.
    ///
    /// # Arguments
    ///
    /// * `immediate` - If true, notes stop immediately without release
    pub fn all_notes_off(&self, immediate: bool) {
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.clear();
        }
        if let Ok(mut synth) = self.synth.lock() {
            synth.note_off_all(immediate);
        }
    }

    /// Sets the instrument (program) on channel 0, wrapping at 128.
    pub fn set_program(&mut self, program: u8) {
        self.program = program % 128;
        if let Ok(mut synth) = self.synth.lock() {
            // Program change is MIDI command 0xC0 (192)
            synth.process_midi_message(0, 0xC0, self.program as i32, 0);
        }
        tracing::debug!("Program set to {} ({})", self.program, self.instrument_name());
    }

    /// Declares the host tempo so recordings can fill in their BPM.
    pub fn set_bpm(&self, bpm: f64) {
        if bpm.is_finite() && bpm > 0.0 {
            self.shared.bpm_bits.store(bpm.to_bits(), Ordering::Relaxed);
            self.shared.capture.set_tempo(bpm);
        }
    }

    /// Output handle for players that share this engine's device.
    pub fn output_handle(&self) -> OutputStreamHandle {
        self.stream_handle.clone()
    }

    /// A capture source over this engine's output for a recording session.
    pub fn capture_source(&self) -> InstrumentCapture {
        InstrumentCapture {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Records the engine's rendered output. Cheap to create; all handles share
/// the engine's tap.
pub struct InstrumentCapture {
    shared: Arc<EngineShared>,
}

impl AudioSource for InstrumentCapture {
    fn start(&mut self) -> StoryResult<()> {
        if let Ok(mut recorded) = self.shared.recorded.lock() {
            recorded.clear();
        }
        self.shared.recording.store(true, Ordering::Release);
        tracing::info!("Instrument recording started");
        Ok(())
    }

    fn stop(&mut self) -> AudioBuffer {
        self.shared.recording.store(false, Ordering::Release);
        let samples = self
            .shared
            .recorded
            .lock()
            .map(|mut recorded| std::mem::take(&mut *recorded))
            .unwrap_or_default();
        AudioBuffer::new(samples, 2, SAMPLE_RATE)
    }

    fn elapsed_seconds(&self) -> f64 {
        self.shared.recorded_seconds()
    }

    fn reset(&mut self) {
        self.shared.recording.store(false, Ordering::Release);
        if let Ok(mut recorded) = self.shared.recorded.lock() {
            recorded.clear();
        }
    }

    fn bpm(&self) -> Option<f64> {
        self.shared.bpm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_for(shared: &Arc<EngineShared>) -> InstrumentCapture {
        InstrumentCapture {
            shared: Arc::clone(shared),
        }
    }

    #[test]
    fn test_blocks_feed_capture_and_tap() {
        let capture = MidiCapture::new();
        capture.prepare(SAMPLE_RATE);
        let shared = Arc::new(EngineShared::new(capture.clone()));
        let mut source = capture_for(&shared);

        capture.start_capture();
        source.start().unwrap();
        shared.queue(ChannelMessage::NoteOn {
            channel: 0,
            pitch: 60,
            velocity: 100,
        });

        let silence = vec![0.25f32; BUFFER_SIZE];
        let first = shared.take_pending();
        assert_eq!(first.len(), 1);
        shared.finish_block(&first, &silence, &silence);
        let second = shared.take_pending();
        assert!(second.is_empty());
        shared.finish_block(&second, &silence, &silence);

        assert_eq!(capture.event_count(), 1);
        let expected = 2.0 * BUFFER_SIZE as f64 / SAMPLE_RATE as f64;
        assert!((source.elapsed_seconds() - expected).abs() < 1e-12);

        let buffer = source.stop();
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.frames(), 2 * BUFFER_SIZE);
        assert_eq!(source.elapsed_seconds(), 0.0);
    }

    #[test]
    fn test_tap_idle_until_started() {
        let shared = Arc::new(EngineShared::new(MidiCapture::new()));
        let block = vec![0.0f32; BUFFER_SIZE];
        shared.finish_block(&[], &block, &block);
        assert_eq!(shared.recorded_seconds(), 0.0);
    }

    #[test]
    fn test_bpm_unknown_until_set() {
        let shared = Arc::new(EngineShared::new(MidiCapture::new()));
        let source = capture_for(&shared);
        assert_eq!(source.bpm(), None);
        shared.bpm_bits.store(98.0f64.to_bits(), Ordering::Relaxed);
        assert_eq!(source.bpm(), Some(98.0));
    }
}
