//! Note colors.

use crate::midi::NoteInterval;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// From a `0xRRGGBB` value.
    pub const fn from_hex(hex: u32) -> Self {
        Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Linear blend toward `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(
            mix(self.0, other.0),
            mix(self.1, other.1),
            mix(self.2, other.2),
        )
    }

    /// Moves toward white; `amount` of 1.0 goes half way.
    pub fn brighter(self, amount: f64) -> Rgb {
        let amount = amount.max(0.0);
        self.lerp(Rgb::WHITE, amount / (1.0 + amount))
    }
}

/// Resting note color.
pub const NOTE_COLOR: Rgb = Rgb::from_hex(0x7c4dff);
/// Full-velocity / highlighted note color.
pub const ACTIVE_NOTE_COLOR: Rgb = Rgb::from_hex(0xb388ff);
/// Playhead and sweep line color.
pub const PLAYHEAD_COLOR: Rgb = Rgb::from_hex(0xff5252);
/// Grid lines, rings, and other reference marks.
pub const GRID_COLOR: Rgb = Rgb::from_hex(0x3a3a4a);

/// Per-channel colors, indexed by `channel % 10`.
pub const CHANNEL_PALETTE: [Rgb; 10] = [
    Rgb::from_hex(0x7c4dff),
    Rgb::from_hex(0x00bcd4),
    Rgb::from_hex(0x4caf50),
    Rgb::from_hex(0xffc107),
    Rgb::from_hex(0xe91e63),
    Rgb::from_hex(0x2196f3),
    Rgb::from_hex(0xff5722),
    Rgb::from_hex(0x9c27b0),
    Rgb::from_hex(0x00e676),
    Rgb::from_hex(0xff9800),
];

/// How notes are colored and sized. The modes are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// One color and size for every note.
    Flat,
    /// Color and size follow velocity.
    #[default]
    Velocity,
    /// Color follows channel.
    Channel,
}

impl ColorMode {
    pub fn next(self) -> Self {
        match self {
            ColorMode::Flat => ColorMode::Velocity,
            ColorMode::Velocity => ColorMode::Channel,
            ColorMode::Channel => ColorMode::Flat,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorMode::Flat => "Flat",
            ColorMode::Velocity => "Velocity",
            ColorMode::Channel => "Channel",
        }
    }

    /// Parses a CLI color mode name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "flat" => Some(ColorMode::Flat),
            "velocity" => Some(ColorMode::Velocity),
            "channel" => Some(ColorMode::Channel),
            _ => None,
        }
    }

    /// Base color for a note under this mode.
    pub fn note_color(self, note: &NoteInterval) -> Rgb {
        match self {
            ColorMode::Flat => NOTE_COLOR,
            ColorMode::Velocity => NOTE_COLOR.lerp(ACTIVE_NOTE_COLOR, velocity_fraction(note)),
            ColorMode::Channel => CHANNEL_PALETTE[note.channel.rem_euclid(10) as usize],
        }
    }

    /// Size factor in `[0, 1]` used to scale note marks, or None when size is fixed.
    pub fn size_fraction(self, note: &NoteInterval) -> Option<f64> {
        match self {
            ColorMode::Velocity => Some(velocity_fraction(note)),
            ColorMode::Flat | ColorMode::Channel => None,
        }
    }
}

fn velocity_fraction(note: &NoteInterval) -> f64 {
    (note.velocity as f64 / 127.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_interpolates() {
        let soft = NoteInterval::new(0.0, 1.0, 60, 0, 0);
        let loud = NoteInterval::new(0.0, 1.0, 60, 127, 0);
        assert_eq!(ColorMode::Velocity.note_color(&soft), NOTE_COLOR);
        assert_eq!(ColorMode::Velocity.note_color(&loud), ACTIVE_NOTE_COLOR);
        assert_eq!(ColorMode::Velocity.size_fraction(&loud), Some(1.0));
    }

    #[test]
    fn test_channel_palette_wraps() {
        let a = NoteInterval::new(0.0, 1.0, 60, 100, 1);
        let b = NoteInterval::new(0.0, 1.0, 60, 100, 11);
        assert_eq!(ColorMode::Channel.note_color(&a), Rgb::from_hex(0x00bcd4));
        assert_eq!(ColorMode::Channel.note_color(&a), ColorMode::Channel.note_color(&b));
        assert_eq!(ColorMode::Channel.size_fraction(&a), None);
    }

    #[test]
    fn test_brighter_moves_toward_white() {
        let c = Rgb(0, 0, 0).brighter(1.0);
        assert_eq!(c, Rgb(128, 128, 128));
        assert_eq!(NOTE_COLOR.brighter(0.0), NOTE_COLOR);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(ColorMode::from_name("Channel"), Some(ColorMode::Channel));
        assert_eq!(ColorMode::from_name("rainbow"), None);
        assert_eq!(ColorMode::Channel.next(), ColorMode::Flat);
    }
}
