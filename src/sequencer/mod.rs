// Sequencer module - Tempo, click synthesis and look-ahead beat scheduling

pub mod metronome;
pub mod scheduler;
pub mod tempo;

pub use metronome::{ClickType, Metronome, MetronomeSound, ScheduledClick};
pub use scheduler::{BeatCallback, BeatScheduler, ClickSink, PendingTempo};
pub use tempo::{Bpm, TempoRange};
