// Coach configuration - RON file with defaults for every field

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sequencer::tempo::TempoRange;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Metronome look-ahead settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Host-timer cadence of the look-ahead pass
    pub tick_interval_ms: u64,
    /// How far past "now" beats are committed on each pass (seconds)
    pub schedule_ahead_s: f64,
    /// Delay before the first beat after `start()` (seconds)
    pub start_offset_s: f64,
    pub default_bpm: u16,
    pub min_bpm: u16,
    pub max_bpm: u16,
    pub click_volume: f32,
    /// Accent every Nth beat, 0 disables accents
    pub accent_every: u32,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn tempo_range(&self) -> TempoRange {
        TempoRange {
            min: self.min_bpm,
            max: self.max_bpm,
            default: self.default_bpm,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 25,
            schedule_ahead_s: 0.1,
            start_offset_s: 0.1,
            default_bpm: TempoRange::SCHEDULER.default,
            min_bpm: TempoRange::SCHEDULER.min,
            max_bpm: TempoRange::SCHEDULER.max,
            click_volume: 0.5,
            accent_every: 0,
        }
    }
}

/// Music crossfade settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// Length of the linear crossfade (seconds)
    pub transition_s: f64,
    /// Cooldown after a crossfade during which requests are coalesced (seconds)
    pub grace_period_s: f64,
    /// Full gain of the playing track
    pub music_gain: f32,
    pub default_bpm: u16,
    pub min_bpm: u16,
    pub max_bpm: u16,
}

impl CrossfadeConfig {
    pub fn transition(&self) -> Duration {
        seconds_or_max(self.transition_s)
    }

    pub fn grace_period(&self) -> Duration {
        seconds_or_max(self.grace_period_s)
    }

    pub fn tempo_range(&self) -> TempoRange {
        TempoRange {
            min: self.min_bpm,
            max: self.max_bpm,
            default: self.default_bpm,
        }
    }
}

/// Negative and NaN become zero, overflowing values saturate
fn seconds_or_max(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            transition_s: 5.0,
            grace_period_s: 5.0,
            music_gain: 1.0,
            default_bpm: TempoRange::MUSIC.default,
            min_bpm: TempoRange::MUSIC.min,
            max_bpm: TempoRange::MUSIC.max,
        }
    }
}

/// Where tempo-matched music loops live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding one loop per tempo, named `<bpm>.<extension>`
    pub directory: PathBuf,
    pub extension: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("music"),
            extension: "wav".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub scheduler: SchedulerConfig,
    pub crossfade: CrossfadeConfig,
    pub assets: AssetConfig,
}

impl CoachConfig {
    /// Load and validate a RON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: CoachConfig = ron::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        if scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be > 0".into()));
        }
        if !(scheduler.schedule_ahead_s > 0.0) || !scheduler.schedule_ahead_s.is_finite() {
            return Err(ConfigError::Invalid("schedule_ahead_s must be finite and > 0".into()));
        }
        if !(scheduler.start_offset_s >= 0.0) || !scheduler.start_offset_s.is_finite() {
            return Err(ConfigError::Invalid("start_offset_s must be finite and >= 0".into()));
        }
        if !(0.0..=1.0).contains(&scheduler.click_volume) {
            return Err(ConfigError::Invalid("click_volume must be within 0..=1".into()));
        }
        // A look-ahead window shorter than the polling cadence leaves gaps
        if scheduler.schedule_ahead_s * 1000.0 < scheduler.tick_interval_ms as f64 {
            return Err(ConfigError::Invalid(
                "schedule_ahead_s must cover at least one tick_interval_ms".into(),
            ));
        }
        if !scheduler.tempo_range().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "scheduler tempo range {:?} is inconsistent",
                scheduler.tempo_range()
            )));
        }

        let crossfade = &self.crossfade;
        if !(crossfade.transition_s > 0.0) || !crossfade.transition_s.is_finite() {
            return Err(ConfigError::Invalid("transition_s must be > 0".into()));
        }
        if !(crossfade.grace_period_s >= 0.0) || !crossfade.grace_period_s.is_finite() {
            return Err(ConfigError::Invalid("grace_period_s must be >= 0".into()));
        }
        if !(crossfade.music_gain > 0.0) || !crossfade.music_gain.is_finite() {
            return Err(ConfigError::Invalid("music_gain must be finite and > 0".into()));
        }
        if !crossfade.tempo_range().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "crossfade tempo range {:?} is inconsistent",
                crossfade.tempo_range()
            )));
        }

        if self.assets.extension.is_empty() {
            return Err(ConfigError::Invalid("assets.extension is empty".into()));
        }
        Ok(())
    }
}
