// Tempo - Integer BPM values and the ranges they are validated against
// Out-of-range requests are absorbed here (clamped or replaced), never surfaced as errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tempo in whole beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bpm(u16);

impl Bpm {
    /// Fallback tempo used whenever a request cannot be honoured
    pub const DEFAULT: Bpm = Bpm(120);

    pub const fn new(bpm: u16) -> Self {
        Self(bpm)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(self) -> f64 {
        60.0 / self.0.max(1) as f64
    }
}

impl Default for Bpm {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Bpm> for i32 {
    fn from(bpm: Bpm) -> Self {
        bpm.0 as i32
    }
}

impl fmt::Display for Bpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.0)
    }
}

/// Inclusive tempo bounds plus the fallback used for unusable input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: u16,
    pub max: u16,
    pub default: u16,
}

impl TempoRange {
    /// Metronome limits
    pub const SCHEDULER: TempoRange = TempoRange {
        min: 20,
        max: 300,
        default: 120,
    };

    /// Limits of the music layer (the range the pace predictor and slider produce)
    pub const MUSIC: TempoRange = TempoRange {
        min: 60,
        max: 220,
        default: 120,
    };

    pub fn contains(&self, raw: i32) -> bool {
        (self.min as i32..=self.max as i32).contains(&raw)
    }

    pub fn default_bpm(&self) -> Bpm {
        Bpm(self.default)
    }

    /// Bounds are ordered and the fallback lies inside them
    pub fn is_valid(&self) -> bool {
        self.min > 0 && self.min <= self.default && self.default <= self.max
    }

    /// Bring any request into range
    ///
    /// Non-positive values fall back to the default, everything else is
    /// clamped to the nearest bound.
    pub fn clamp(&self, raw: i32) -> Bpm {
        if self.contains(raw) {
            return Bpm(raw as u16);
        }

        let adjusted = if raw <= 0 {
            self.default
        } else if raw < self.min as i32 {
            self.min
        } else {
            self.max
        };
        log::warn!(
            "Tempo {} outside [{}, {}], using {}",
            raw,
            self.min,
            self.max,
            adjusted
        );
        Bpm(adjusted)
    }

    /// Validate a request against what is already playing
    ///
    /// In-range values pass through. An out-of-range value becomes the
    /// default when nothing plays yet, and is dropped (`None`) when a valid
    /// tempo is already established.
    pub fn resolve(&self, raw: i32, current: Option<Bpm>) -> Option<Bpm> {
        if self.contains(raw) {
            return Some(Bpm(raw as u16));
        }

        match current {
            Some(playing) => {
                log::warn!("Ignoring out-of-range tempo {}, staying at {}", raw, playing);
                None
            }
            None => {
                log::warn!(
                    "Tempo {} outside [{}, {}], falling back to {}",
                    raw,
                    self.min,
                    self.max,
                    self.default
                );
                Some(self.default_bpm())
            }
        }
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self::SCHEDULER
    }
}
