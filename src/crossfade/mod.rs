// Crossfade module - Looping music that retunes to a new tempo without a gap

pub mod engine;
pub mod state;
pub mod track;

pub use engine::{CrossfadeEngine, CrossfadeError, TempoOutcome, TrackGains};
pub use state::TransitionPhase;
pub use track::Track;
