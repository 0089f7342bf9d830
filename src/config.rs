//! Persistent settings.
//!
//! Stored as pretty JSON. Every field has a default so partial files load,
//! and a missing file loads as [`StoryConfig::default`].

use crate::error::{Result, StoryError};
use crate::render::{ColorMode, RadialStyle, RendererKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "storyroll.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Manual stop is refused before this many seconds.
    pub min_duration_secs: f64,
    /// Recording stops on its own at this many seconds.
    pub max_duration_secs: f64,
    /// UI and session poll rate.
    pub tick_hz: u32,
    pub renderer: RendererKind,
    pub color_mode: ColorMode,
    pub radial_style: RadialStyle,
    /// Waterfall lookahead window in seconds.
    pub lookahead_secs: f64,
    /// Where confirmed stories are written.
    pub output_dir: PathBuf,
    pub soundfont: Option<PathBuf>,
    pub sample_rate: u32,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 5.0,
            max_duration_secs: 60.0,
            tick_hz: 30,
            renderer: RendererKind::default(),
            color_mode: ColorMode::default(),
            radial_style: RadialStyle::default(),
            lookahead_secs: 3.0,
            output_dir: PathBuf::from("stories"),
            soundfont: None,
            sample_rate: 44_100,
        }
    }
}

impl StoryConfig {
    /// Loads a config file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// the loaded values fail [`StoryConfig::validate`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {:?}; using defaults", path);
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Writes the config as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Checks that durations and rates make sense together.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_duration_secs >= 0.0) {
            return Err(StoryError::Config(
                "min_duration_secs must be non-negative".to_string(),
            ));
        }
        if !(self.max_duration_secs > self.min_duration_secs) {
            return Err(StoryError::Config(format!(
                "max_duration_secs ({}) must exceed min_duration_secs ({})",
                self.max_duration_secs, self.min_duration_secs
            )));
        }
        if self.tick_hz == 0 || self.sample_rate == 0 {
            return Err(StoryError::Config(
                "tick_hz and sample_rate must be non-zero".to_string(),
            ));
        }
        if !(self.lookahead_secs > 0.0) {
            return Err(StoryError::Config(
                "lookahead_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Seconds between ticks.
    pub fn tick_interval_secs(&self) -> f64 {
        1.0 / self.tick_hz.max(1) as f64
    }
}
