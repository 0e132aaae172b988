// Cadence coach - Library exports for the demo host, tests and benchmarks

pub mod assets;
pub mod audio;
pub mod config;
pub mod crossfade;
pub mod messaging;
pub mod sequencer;
pub mod session;

// Re-export commonly used types for convenience
pub use assets::{AssetLoadError, AssetProvider, DirectoryAssetProvider, MemoryAssetProvider};
pub use audio::buffer::AudioBuffer;
pub use audio::clock::{AudioClock, HostClock, SampleClock};
pub use audio::engine::{OutputError, OutputMixer, OutputStream};
pub use audio::graph::MixBus;
pub use config::{CoachConfig, ConfigError};
pub use crossfade::{CrossfadeEngine, CrossfadeError, TempoOutcome, TransitionPhase};
pub use messaging::channels::create_click_channel;
pub use sequencer::{BeatScheduler, Bpm, ClickSink, ClickType, ScheduledClick, TempoRange};
pub use session::CoachSession;
