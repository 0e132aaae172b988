// Transition state machine of the crossfade engine

use std::fmt;

use crate::crossfade::track::Track;
use crate::sequencer::tempo::Bpm;

/// Externally visible phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Loading,
    Crossfading,
    GracePeriod,
}

impl fmt::Display for TransitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionPhase::Idle => "idle",
            TransitionPhase::Loading => "loading",
            TransitionPhase::Crossfading => "crossfading",
            TransitionPhase::GracePeriod => "grace period",
        };
        f.write_str(name)
    }
}

/// Engine state, each variant carrying only the tracks valid in it
#[derive(Debug)]
pub(crate) enum TransitionState {
    Idle {
        current: Option<Track>,
    },
    /// Waiting for the asset of `target`; `current` keeps playing meanwhile
    Loading {
        current: Option<Track>,
        target: Bpm,
    },
    Crossfading {
        from: Track,
        to: Track,
        started_at: f64,
        ends_at: f64,
    },
    GracePeriod {
        current: Track,
        ends_at: f64,
    },
}

impl TransitionState {
    pub(crate) fn phase(&self) -> TransitionPhase {
        match self {
            TransitionState::Idle { .. } => TransitionPhase::Idle,
            TransitionState::Loading { .. } => TransitionPhase::Loading,
            TransitionState::Crossfading { .. } => TransitionPhase::Crossfading,
            TransitionState::GracePeriod { .. } => TransitionPhase::GracePeriod,
        }
    }

    /// Track in the "current" slot
    pub(crate) fn current(&self) -> Option<&Track> {
        match self {
            TransitionState::Idle { current } | TransitionState::Loading { current, .. } => {
                current.as_ref()
            }
            TransitionState::Crossfading { from, .. } => Some(from),
            TransitionState::GracePeriod { current, .. } => Some(current),
        }
    }

    /// Track in the "incoming" slot (only while crossfading)
    pub(crate) fn incoming(&self) -> Option<&Track> {
        match self {
            TransitionState::Crossfading { to, .. } => Some(to),
            _ => None,
        }
    }

    pub(crate) fn loading_target(&self) -> Option<Bpm> {
        match self {
            TransitionState::Loading { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Tempo the engine is playing or heading to, used to validate new requests
    pub(crate) fn established_tempo(&self) -> Option<Bpm> {
        self.incoming()
            .or(self.current())
            .map(Track::tempo)
            .or(self.loading_target())
    }

    /// Crossfade completion in `[0, 1]` at `time`, `None` outside a crossfade
    pub(crate) fn crossfade_progress(&self, time: f64) -> Option<f32> {
        match self {
            TransitionState::Crossfading {
                started_at,
                ends_at,
                ..
            } => {
                let span = ends_at - started_at;
                if span <= 0.0 {
                    return Some(1.0);
                }
                Some(((time - started_at) / span).clamp(0.0, 1.0) as f32)
            }
            _ => None,
        }
    }

    /// Audio-clock time the current phase ends on its own, if it does
    pub(crate) fn ends_at(&self) -> Option<f64> {
        match self {
            TransitionState::Crossfading { ends_at, .. }
            | TransitionState::GracePeriod { ends_at, .. } => Some(*ends_at),
            _ => None,
        }
    }
}

impl Default for TransitionState {
    fn default() -> Self {
        TransitionState::Idle { current: None }
    }
}
