// Coach session - One metronome and one music layer driven by a tempo source

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::assets::AssetProvider;
use crate::audio::clock::AudioClock;
use crate::audio::graph::MixBus;
use crate::config::CoachConfig;
use crate::crossfade::{CrossfadeEngine, CrossfadeError, TempoOutcome};
use crate::sequencer::scheduler::{BeatScheduler, ClickSink};

/// Both audio components of one run, sharing an audio clock
///
/// The components never talk to each other; the session only forwards
/// tempo-source calls to both and tears them down together.
pub struct CoachSession<P: AssetProvider> {
    beats: BeatScheduler,
    music: CrossfadeEngine<P>,
}

impl<P: AssetProvider> CoachSession<P> {
    pub fn new(
        config: &CoachConfig,
        provider: P,
        clock: Arc<dyn AudioClock>,
        clicks: Box<dyn ClickSink>,
        music_output: MixBus,
        runtime: Handle,
    ) -> Self {
        let beats = BeatScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&clock),
            clicks,
            runtime.clone(),
        );
        let music = CrossfadeEngine::with_output(
            config.crossfade.clone(),
            provider,
            clock,
            music_output,
            runtime,
        );

        Self { beats, music }
    }

    pub fn beats(&self) -> &BeatScheduler {
        &self.beats
    }

    pub fn music(&self) -> &CrossfadeEngine<P> {
        &self.music
    }

    /// Music output node, for the output stream
    pub fn music_output(&self) -> MixBus {
        self.music.output().clone()
    }

    /// Forward a new target tempo to both layers
    ///
    /// The metronome follows after `delay_seconds`; the music starts its
    /// transition (or defers it) right away.
    pub async fn set_tempo(
        &self,
        bpm: i32,
        delay_seconds: f64,
    ) -> Result<TempoOutcome, CrossfadeError> {
        self.beats.set_tempo(bpm, delay_seconds);
        self.music.set_tempo(bpm).await
    }

    /// Stop the metronome and silence the music
    pub fn stop(&self) {
        self.beats.stop();
        self.music.stop_all();
    }

    /// End the session: stop both layers and release the music output
    pub fn shutdown(&self) {
        self.beats.stop();
        self.music.destroy();
    }
}

impl<P: AssetProvider> Drop for CoachSession<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
