// Crossfade engine - Tempo-matched music with glitch-free transitions
//
// Idle --set_tempo--> Loading --loaded--> Crossfading --fade end--> GracePeriod --expiry--> Idle
//
// Requests made outside Idle only overwrite the single pending slot, applied
// when the grace period ends. Timer tasks carry the epoch they were spawned
// in and discard themselves once the engine has moved on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::assets::{AssetLoadError, AssetProvider};
use crate::audio::buffer::AudioBuffer;
use crate::audio::clock::AudioClock;
use crate::audio::graph::{GraphError, MixBus};
use crate::config::CrossfadeConfig;
use crate::crossfade::state::{TransitionPhase, TransitionState};
use crate::crossfade::track::Track;
use crate::sequencer::tempo::Bpm;

#[derive(Debug, thiserror::Error)]
pub enum CrossfadeError {
    #[error("Failed to load music: {0}")]
    AssetLoad(#[from] AssetLoadError),

    #[error("Music output rejected the track: {0}")]
    Graph(#[from] GraphError),

    #[error("Crossfade engine has been destroyed")]
    Destroyed,
}

/// What a `set_tempo` call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoOutcome {
    /// First track loaded and playing at full gain
    Started,
    /// Incoming track loaded and fading in
    Crossfading,
    /// Engine busy, stored as the pending request
    Deferred,
    /// Already playing this tempo
    Unchanged,
    /// Out of range while a valid tempo plays
    Ignored,
    /// The engine was stopped or moved on while the asset loaded
    Superseded,
}

/// Scheduled gains of both track slots at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackGains {
    pub current: f32,
    pub incoming: f32,
}

impl TrackGains {
    pub fn total(&self) -> f32 {
        self.current + self.incoming
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerEvent {
    CrossfadeComplete,
    GraceExpired,
}

struct Core {
    state: TransitionState,
    pending: Option<Bpm>,
    epoch: u64,
    timer: Option<JoinHandle<()>>,
    destroyed: bool,
}

struct Inner<P> {
    provider: P,
    bus: MixBus,
    clock: Arc<dyn AudioClock>,
    config: CrossfadeConfig,
    runtime: Handle,
    core: Mutex<Core>,
}

impl<P> Inner<P> {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Looping background music that follows the requested tempo
///
/// Cloning yields another handle to the same engine.
pub struct CrossfadeEngine<P: AssetProvider> {
    inner: Arc<Inner<P>>,
}

impl<P: AssetProvider> Clone for CrossfadeEngine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: AssetProvider> CrossfadeEngine<P> {
    pub fn new(
        config: CrossfadeConfig,
        provider: P,
        clock: Arc<dyn AudioClock>,
        runtime: Handle,
    ) -> Self {
        Self::with_output(config, provider, clock, MixBus::new(), runtime)
    }

    /// Build on an existing output bus (one the output stream already renders)
    pub fn with_output(
        config: CrossfadeConfig,
        provider: P,
        clock: Arc<dyn AudioClock>,
        bus: MixBus,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                bus,
                clock,
                config,
                runtime,
                core: Mutex::new(Core {
                    state: TransitionState::default(),
                    pending: None,
                    epoch: 0,
                    timer: None,
                    destroyed: false,
                }),
            }),
        }
    }

    /// Request music at `bpm`
    ///
    /// Suspends only while the asset loads. A load failure leaves whatever was
    /// playing untouched.
    pub async fn set_tempo(&self, bpm: i32) -> Result<TempoOutcome, CrossfadeError> {
        self.request(bpm, None).await
    }

    async fn request(
        &self,
        bpm: i32,
        expected_epoch: Option<u64>,
    ) -> Result<TempoOutcome, CrossfadeError> {
        let (target, epoch) = {
            let mut guard = self.inner.lock();
            let core = &mut *guard;
            if core.destroyed {
                return Err(CrossfadeError::Destroyed);
            }
            if expected_epoch.is_some_and(|epoch| epoch != core.epoch) {
                log::debug!("Dropping re-issued tempo {}, engine moved on", bpm);
                return Ok(TempoOutcome::Superseded);
            }

            let range = self.inner.config.tempo_range();
            let Some(target) = range.resolve(bpm, core.state.established_tempo()) else {
                return Ok(TempoOutcome::Ignored);
            };

            let phase = core.state.phase();
            let current = match &mut core.state {
                TransitionState::Idle { current } => {
                    if let Some(track) = current.as_ref()
                        && track.tempo() == target
                    {
                        track.ensure_playing(self.inner.clock.now());
                        // Outdates a deferred request still on its way in
                        core.epoch += 1;
                        return Ok(TempoOutcome::Unchanged);
                    }
                    current.take()
                }
                _ => {
                    if let Some(previous) = core.pending.replace(target) {
                        log::debug!("Pending {} replaced by {}", previous, target);
                    }
                    log::debug!("Deferring {} while {}", target, phase);
                    return Ok(TempoOutcome::Deferred);
                }
            };

            log::info!("Loading music for {}", target);
            core.state = TransitionState::Loading { current, target };
            core.epoch += 1;
            (target, core.epoch)
        };

        let result = self.inner.provider.load(target).await;
        self.finish_load(target, epoch, result)
    }

    fn finish_load(
        &self,
        target: Bpm,
        epoch: u64,
        result: Result<Arc<AudioBuffer>, AssetLoadError>,
    ) -> Result<TempoOutcome, CrossfadeError> {
        let mut guard = self.inner.lock();
        let core = &mut *guard;

        let current = match std::mem::take(&mut core.state) {
            TransitionState::Loading {
                current,
                target: loading,
            } if loading == target && core.epoch == epoch && !core.destroyed => current,
            other => {
                // Stopped or replaced during the load; nothing was connected yet
                log::warn!("Discarding {} loaded after the engine moved on", target);
                core.state = other;
                return Ok(TempoOutcome::Superseded);
            }
        };

        let buffer = match result {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("Failed to load {}: {}", target, e);
                core.state = TransitionState::Idle { current };
                core.epoch += 1;
                if let Some(retry) = core.pending.take() {
                    self.reissue(retry, core.epoch);
                }
                return Err(e.into());
            }
        };

        let now = self.inner.clock.now();
        let gain = self.inner.config.music_gain;

        let Some(from) = current else {
            let track = match Track::load(&self.inner.bus, target, buffer, gain) {
                Ok(track) => track,
                Err(e) => return Err(self.abandon_load(core, None, target, e)),
            };
            track.start_at(now);
            log::info!("Music playing at {}", target);

            core.state = TransitionState::Idle {
                current: Some(track),
            };
            core.epoch += 1;
            if let Some(next) = core.pending.take() {
                self.reissue(next, core.epoch);
            }
            return Ok(TempoOutcome::Started);
        };

        let to = match Track::load(&self.inner.bus, target, buffer, 0.0) {
            Ok(track) => track,
            Err(e) => return Err(self.abandon_load(core, Some(from), target, e)),
        };

        let ends_at = now + self.inner.config.transition_s;
        from.fade_out(now, ends_at);
        from.stop_at(ends_at);
        to.fade_in(now, ends_at, gain);
        to.start_at(now);
        log::info!(
            "Crossfading {} -> {} over {:.1}s",
            from.tempo(),
            target,
            self.inner.config.transition_s
        );

        core.state = TransitionState::Crossfading {
            from,
            to,
            started_at: now,
            ends_at,
        };
        core.epoch += 1;
        self.schedule_timer(
            core,
            self.inner.config.transition(),
            TimerEvent::CrossfadeComplete,
        );
        Ok(TempoOutcome::Crossfading)
    }

    /// Back to Idle after the output refused a loaded track
    ///
    /// The output does not recover, so the pending request is dropped rather
    /// than retried.
    fn abandon_load(
        &self,
        core: &mut Core,
        current: Option<Track>,
        target: Bpm,
        error: GraphError,
    ) -> CrossfadeError {
        log::error!("Cannot connect {}: {}", target, error);
        core.state = TransitionState::Idle { current };
        core.epoch += 1;
        if let Some(pending) = core.pending.take() {
            log::warn!("Dropping pending {}, music output unavailable", pending);
        }
        error.into()
    }

    fn schedule_timer(&self, core: &mut Core, delay: Duration, event: TimerEvent) {
        if let Some(timer) = core.timer.take() {
            timer.abort();
        }

        let epoch = core.epoch;
        let engine = self.clone();
        core.timer = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            engine.on_timer(epoch, event);
        }));
    }

    fn on_timer(&self, epoch: u64, event: TimerEvent) {
        let mut guard = self.inner.lock();
        let core = &mut *guard;
        if core.destroyed || core.epoch != epoch {
            log::debug!("Discarding stale {:?} timer", event);
            return;
        }
        // This task is the timer; detach instead of aborting it
        core.timer = None;

        match (event, std::mem::take(&mut core.state)) {
            (
                TimerEvent::CrossfadeComplete,
                TransitionState::Crossfading {
                    from,
                    to,
                    started_at,
                    ends_at,
                },
            ) => {
                // The timer runs on host time; wait until the audio clock has
                // actually reached the end of the ramps
                let remaining = ends_at - self.inner.clock.now();
                if remaining > 1e-3
                    && let Ok(delay) = Duration::try_from_secs_f64(remaining)
                {
                    log::debug!("Audio clock {:.3}s short of crossfade end", remaining);
                    core.state = TransitionState::Crossfading {
                        from,
                        to,
                        started_at,
                        ends_at,
                    };
                    self.schedule_timer(core, delay, TimerEvent::CrossfadeComplete);
                    return;
                }

                drop(from);
                log::info!("Crossfade to {} complete", to.tempo());

                let ends_at = self.inner.clock.now() + self.inner.config.grace_period_s;
                core.state = TransitionState::GracePeriod {
                    current: to,
                    ends_at,
                };
                core.epoch += 1;
                self.schedule_timer(
                    core,
                    self.inner.config.grace_period(),
                    TimerEvent::GraceExpired,
                );
            }
            (TimerEvent::GraceExpired, TransitionState::GracePeriod { current, .. }) => {
                core.state = TransitionState::Idle {
                    current: Some(current),
                };
                core.epoch += 1;
                match core.pending.take() {
                    Some(next) => {
                        log::info!("Grace period over, applying deferred {}", next);
                        self.reissue(next, core.epoch);
                    }
                    None => log::debug!("Grace period over, idle"),
                }
            }
            (event, state) => {
                log::warn!("{:?} timer fired while {}, ignoring", event, state.phase());
                core.state = state;
            }
        }
    }

    /// Run a deferred request through `set_tempo` unless the engine moves on first
    fn reissue(&self, bpm: Bpm, epoch: u64) {
        let engine = self.clone();
        self.inner.runtime.spawn(async move {
            match engine.request(bpm.into(), Some(epoch)).await {
                Ok(outcome) => log::debug!("Deferred {}: {:?}", bpm, outcome),
                Err(e) => log::warn!("Deferred {} failed: {}", bpm, e),
            }
        });
    }

    /// Hard stop: drop both tracks, cancel timers and the pending request
    pub fn stop_all(&self) {
        let released = {
            let mut guard = self.inner.lock();
            let core = &mut *guard;
            core.epoch += 1;
            if let Some(timer) = core.timer.take() {
                timer.abort();
            }
            if let Some(pending) = core.pending.take() {
                log::debug!("Dropping pending {}", pending);
            }
            std::mem::take(&mut core.state)
        };

        let phase = released.phase();
        drop(released);
        log::info!("Music stopped (was {})", phase);
    }

    /// Stop everything and release the output bus; later calls are no-ops
    pub fn destroy(&self) {
        {
            let mut core = self.inner.lock();
            if core.destroyed {
                return;
            }
            core.destroyed = true;
        }

        self.stop_all();
        self.inner.bus.release();
        log::info!("Crossfade engine destroyed");
    }

    pub fn phase(&self) -> TransitionPhase {
        self.inner.lock().state.phase()
    }

    pub fn current_tempo(&self) -> Option<Bpm> {
        self.inner.lock().state.current().map(Track::tempo)
    }

    pub fn incoming_tempo(&self) -> Option<Bpm> {
        self.inner.lock().state.incoming().map(Track::tempo)
    }

    /// Tempo whose asset is loading
    pub fn loading_tempo(&self) -> Option<Bpm> {
        self.inner.lock().state.loading_target()
    }

    pub fn pending_tempo(&self) -> Option<Bpm> {
        self.inner.lock().pending
    }

    /// Scheduled gains of the current and incoming tracks at audio-clock `time`
    pub fn gains_at(&self, time: f64) -> TrackGains {
        let core = self.inner.lock();
        TrackGains {
            current: core.state.current().map_or(0.0, |t| t.gain_at(time)),
            incoming: core.state.incoming().map_or(0.0, |t| t.gain_at(time)),
        }
    }

    /// Progress of the running crossfade, `None` outside one
    pub fn crossfade_progress(&self) -> Option<f32> {
        let now = self.inner.clock.now();
        self.inner.lock().state.crossfade_progress(now)
    }

    /// Audio-clock time the crossfade or grace period ends
    pub fn phase_ends_at(&self) -> Option<f64> {
        self.inner.lock().state.ends_at()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    /// Output mixing node carrying both track slots
    pub fn output(&self) -> &MixBus {
        &self.inner.bus
    }

    /// Tracks connected to the output (0, 1, or 2 during a crossfade)
    pub fn active_tracks(&self) -> usize {
        self.inner.bus.active_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetProvider;
    use crate::audio::clock::{HostClock, SampleClock};

    fn provider() -> MemoryAssetProvider {
        let provider = MemoryAssetProvider::new();
        for bpm in [120, 140, 150, 160] {
            provider.insert(Bpm::new(bpm), AudioBuffer::new(vec![0.1; 4800 * 2], 2, 48000));
        }
        provider
    }

    fn engine(provider: MemoryAssetProvider) -> CrossfadeEngine<MemoryAssetProvider> {
        CrossfadeEngine::new(
            CrossfadeConfig::default(),
            provider,
            Arc::new(HostClock::new()),
            Handle::current(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tempo_starts_at_full_gain() {
        let engine = engine(provider());

        assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Started);
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.current_tempo(), Some(Bpm::new(150)));
        assert_eq!(engine.incoming_tempo(), None);
        assert_eq!(engine.active_tracks(), 1);
        assert_eq!(
            engine.gains_at(0.5),
            TrackGains {
                current: 1.0,
                incoming: 0.0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_tempo_is_a_no_op() {
        let provider = provider();
        let engine = engine(provider.clone());

        engine.set_tempo(150).await.unwrap();
        assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Unchanged);
        assert_eq!(provider.requests(), vec![Bpm::new(150)]);
        assert_eq!(engine.active_tracks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_tempo() {
        let engine = engine(provider());

        // Nothing playing: fall back to the default
        assert_eq!(engine.set_tempo(500).await.unwrap(), TempoOutcome::Started);
        assert_eq!(engine.current_tempo(), Some(Bpm::DEFAULT));

        // Valid tempo playing: ignored
        assert_eq!(engine.set_tempo(500).await.unwrap(), TempoOutcome::Ignored);
        assert_eq!(engine.set_tempo(-1).await.unwrap(), TempoOutcome::Ignored);
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.active_tracks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_failure_leaves_engine_empty() {
        let provider = provider();
        provider.fail(Bpm::new(150), "unreachable");
        let engine = engine(provider.clone());

        let result = engine.set_tempo(150).await;
        assert!(matches!(result, Err(CrossfadeError::AssetLoad(_))));
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.current_tempo(), None);
        assert_eq!(engine.active_tracks(), 0);

        // The caller retries
        provider.recover(Bpm::new(150));
        assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_load_failure_keeps_current_track() {
        let provider = provider();
        let engine = engine(provider.clone());
        engine.set_tempo(120).await.unwrap();

        provider.fail(Bpm::new(140), "corrupt file");
        assert!(engine.set_tempo(140).await.is_err());

        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.current_tempo(), Some(Bpm::new(120)));
        assert_eq!(engine.active_tracks(), 1);
        assert_eq!(engine.gains_at(10.0).current, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_keeps_total_gain() {
        let engine = engine(provider());
        engine.set_tempo(120).await.unwrap();

        assert_eq!(engine.set_tempo(140).await.unwrap(), TempoOutcome::Crossfading);
        assert_eq!(engine.phase(), TransitionPhase::Crossfading);
        assert_eq!(engine.current_tempo(), Some(Bpm::new(120)));
        assert_eq!(engine.incoming_tempo(), Some(Bpm::new(140)));
        assert_eq!(engine.active_tracks(), 2);
        assert_eq!(engine.phase_ends_at(), Some(5.0));

        for step in 0..=100 {
            let t = step as f64 * 0.05;
            assert!((engine.gains_at(t).total() - 1.0).abs() < 1e-5);
        }
        let half = engine.gains_at(2.5);
        assert!((half.current - 0.5).abs() < 1e-5);
        assert!((half.incoming - 0.5).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_while_busy_are_deferred() {
        let engine = engine(provider());
        engine.set_tempo(120).await.unwrap();
        engine.set_tempo(140).await.unwrap();

        assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Deferred);
        assert_eq!(engine.set_tempo(160).await.unwrap(), TempoOutcome::Deferred);
        assert_eq!(engine.pending_tempo(), Some(Bpm::new(160)));
        assert_eq!(engine.incoming_tempo(), Some(Bpm::new(140)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_progress() {
        let engine = engine(provider());
        engine.set_tempo(120).await.unwrap();
        assert_eq!(engine.crossfade_progress(), None);

        engine.set_tempo(140).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1250)).await;
        let progress = engine.crossfade_progress().unwrap();
        assert!((progress - 0.25).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_releases_everything() {
        let engine = engine(provider());
        engine.set_tempo(120).await.unwrap();
        engine.set_tempo(140).await.unwrap();
        engine.set_tempo(160).await.unwrap();

        engine.stop_all();
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.current_tempo(), None);
        assert_eq!(engine.pending_tempo(), None);
        assert_eq!(engine.active_tracks(), 0);

        // Cancelled timers never bring the old session back
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.active_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy() {
        let engine = engine(provider());
        engine.set_tempo(120).await.unwrap();

        engine.destroy();
        assert!(engine.is_destroyed());
        assert!(engine.output().is_released());
        assert_eq!(engine.active_tracks(), 0);
        assert!(matches!(
            engine.set_tempo(140).await,
            Err(CrossfadeError::Destroyed)
        ));

        engine.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_completing_after_stop_is_discarded() {
        let provider = provider().with_latency(Duration::from_secs(1));
        let engine = engine(provider);

        let load = tokio::spawn({
            let engine = engine.clone();
            async move { engine.set_tempo(150).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.phase(), TransitionPhase::Loading);
        assert_eq!(engine.loading_tempo(), Some(Bpm::new(150)));

        engine.stop_all();
        assert_eq!(load.await.unwrap().unwrap(), TempoOutcome::Superseded);
        assert_eq!(engine.active_tracks(), 0);
        assert_eq!(engine.current_tempo(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_output_fails_the_load() {
        let provider = provider().with_latency(Duration::from_secs(1));
        let bus = MixBus::new();
        let engine = CrossfadeEngine::with_output(
            CrossfadeConfig::default(),
            provider.clone(),
            Arc::new(HostClock::new()),
            bus.clone(),
            Handle::current(),
        );

        let load = tokio::spawn({
            let engine = engine.clone();
            async move { engine.set_tempo(150).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.set_tempo(160).await.unwrap(), TempoOutcome::Deferred);

        bus.release();
        assert!(matches!(
            load.await.unwrap(),
            Err(CrossfadeError::Graph(GraphError::Released))
        ));
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.current_tempo(), None);
        assert_eq!(engine.pending_tempo(), None);

        // The deferred request is not retried against a dead output
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(provider.requests(), vec![Bpm::new(150)]);
        assert_eq!(engine.phase(), TransitionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_output_keeps_current_track_state() {
        let bus = MixBus::new();
        let engine = CrossfadeEngine::with_output(
            CrossfadeConfig::default(),
            provider(),
            Arc::new(HostClock::new()),
            bus.clone(),
            Handle::current(),
        );
        engine.set_tempo(120).await.unwrap();

        bus.release();
        assert!(matches!(
            engine.set_tempo(140).await,
            Err(CrossfadeError::Graph(GraphError::Released))
        ));
        assert_eq!(engine.phase(), TransitionPhase::Idle);
        assert_eq!(engine.current_tempo(), Some(Bpm::new(120)));
        assert_eq!(engine.incoming_tempo(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_completes_on_the_audio_clock() {
        let clock = Arc::new(SampleClock::new(1000.0));
        let engine = CrossfadeEngine::new(
            CrossfadeConfig::default(),
            provider(),
            clock.clone(),
            Handle::current(),
        );
        engine.set_tempo(120).await.unwrap();
        engine.set_tempo(140).await.unwrap();
        assert_eq!(engine.phase_ends_at(), Some(5.0));

        // The device fell behind host time; the ramps are not done yet
        clock.advance(3000);
        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(engine.phase(), TransitionPhase::Crossfading);
        assert_eq!(engine.active_tracks(), 2);

        clock.advance(2000);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(engine.phase(), TransitionPhase::GracePeriod);
        assert_eq!(engine.current_tempo(), Some(Bpm::new(140)));
        assert_eq!(engine.active_tracks(), 1);
    }
}
