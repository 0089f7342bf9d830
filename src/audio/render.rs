//! Offline synthesis of a MIDI payload.
//!
//! Used to give MIDI-only stories (imported `.mid` files, or stories saved
//! without audio) something to play in preview.

use super::engine::{load_soundfont, SAMPLE_RATE};
use super::AudioBuffer;
use crate::midi::{EventKind, MidiPayload};
use anyhow::Result;
use rustysynth::{Synthesizer, SynthesizerSettings};
use std::path::Path;

/// Buffer size for rendering chunks.
const RENDER_BUFFER_SIZE: usize = 4096;

/// Seconds rendered past the end so releases ring out.
const RELEASE_TAIL: f64 = 2.0;

/// Renders `payload` through a SoundFont into a stereo buffer.
///
/// # Arguments
///
/// * `payload` - Events to play; they need not be sorted
/// * `soundfont_path` - Path to the SoundFont file (.sf2)
///
/// # Errors
///
/// Returns error if the SoundFont cannot be loaded or the synthesizer
/// cannot be created.
pub fn render_payload<P: AsRef<Path>>(payload: &MidiPayload, soundfont_path: P) -> Result<AudioBuffer> {
    let soundfont = load_soundfont(soundfont_path)?;
    let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
    let mut synth = Synthesizer::new(&soundfont, &settings)
        .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;

    let last_event = payload
        .events
        .iter()
        .map(|e| e.time_seconds)
        .fold(0.0, f64::max);
    let duration = payload.total_time.max(last_event) + RELEASE_TAIL;
    let total_samples = (duration * SAMPLE_RATE as f64) as usize;

    // Releases sort ahead of onsets at the same instant.
    let mut events = payload.events.clone();
    events.sort_by(|a, b| {
        a.time_seconds
            .total_cmp(&b.time_seconds)
            .then_with(|| a.is_onset().cmp(&b.is_onset()))
    });

    let mut left_buf = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut right_buf = vec![0.0f32; RENDER_BUFFER_SIZE];
    let mut samples = Vec::with_capacity(total_samples * 2);
    let mut current_sample = 0usize;
    let mut event_idx = 0usize;

    while current_sample < total_samples {
        let now = current_sample as f64 / SAMPLE_RATE as f64;
        while event_idx < events.len() && events[event_idx].time_seconds <= now {
            let event = &events[event_idx];
            match event.kind {
                EventKind::NoteOn if event.velocity > 0 => {
                    synth.note_on(event.channel, event.pitch, event.velocity);
                }
                _ => synth.note_off(event.channel, event.pitch),
            }
            event_idx += 1;
        }

        let samples_to_render = (total_samples - current_sample).min(RENDER_BUFFER_SIZE);
        synth.render(
            &mut left_buf[..samples_to_render],
            &mut right_buf[..samples_to_render],
        );
        for i in 0..samples_to_render {
            samples.push(left_buf[i]);
            samples.push(right_buf[i]);
        }
        current_sample += samples_to_render;
    }

    tracing::info!(
        "Rendered {} events into {:.2}s of audio",
        events.len(),
        duration
    );
    Ok(AudioBuffer::new(samples, 2, SAMPLE_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiEvent;
    use std::path::PathBuf;

    #[test]
    fn test_missing_soundfont_is_error() {
        let payload = MidiPayload::default();
        assert!(render_payload(&payload, "/no/such/font.sf2").is_err());
    }

    #[test]
    #[ignore] // Requires SoundFont file
    fn test_render_length_includes_tail() {
        let payload = MidiPayload {
            events: vec![
                MidiEvent::note_on(0.0, 60, 100, 0),
                MidiEvent::note_off(1.0, 60, 0),
            ],
            total_time: 1.0,
            ..MidiPayload::default()
        };
        let sf_path = PathBuf::from("assets/TimGM6mb.sf2");
        let buffer = render_payload(&payload, sf_path).unwrap();
        assert!((buffer.duration_secs() - 3.0).abs() < 1e-3);
    }
}
