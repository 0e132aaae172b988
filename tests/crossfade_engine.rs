// Integration test: Crossfade engine transitions, coalescing and teardown
//
// Timings use the default 5s crossfade and 5s grace period on tokio's paused
// clock. Checks land slightly after each boundary (5.05s, 10.05s, ...).

use cadence_coach::assets::MemoryAssetProvider;
use cadence_coach::audio::buffer::AudioBuffer;
use cadence_coach::audio::clock::{AudioClock, HostClock};
use cadence_coach::config::CrossfadeConfig;
use cadence_coach::crossfade::{CrossfadeEngine, CrossfadeError, TempoOutcome, TransitionPhase};
use cadence_coach::sequencer::Bpm;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

type Engine = CrossfadeEngine<MemoryAssetProvider>;

fn loop_buffer() -> AudioBuffer {
    AudioBuffer::new(vec![0.2; 48000 * 2], 2, 48000)
}

fn provider() -> MemoryAssetProvider {
    let provider = MemoryAssetProvider::new();
    for bpm in (60..=220).step_by(10) {
        provider.insert(Bpm::new(bpm), loop_buffer());
    }
    provider
}

fn engine_with(provider: MemoryAssetProvider) -> (Engine, Arc<HostClock>) {
    let clock = Arc::new(HostClock::new());
    let engine = CrossfadeEngine::new(
        CrossfadeConfig::default(),
        provider,
        clock.clone(),
        Handle::current(),
    );
    (engine, clock)
}

async fn sleep_until(clock: &HostClock, seconds: f64) {
    let remaining = seconds - clock.now();
    if remaining > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_initial_tempo_then_repeat_is_a_no_op() {
    let provider = provider();
    let (engine, _clock) = engine_with(provider.clone());

    assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Started);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(150)));
    assert_eq!(engine.incoming_tempo(), None);
    assert_eq!(engine.gains_at(0.1).current, 1.0);

    assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Unchanged);
    assert_eq!(engine.active_tracks(), 1);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(150)));
    assert_eq!(provider.requests(), vec![Bpm::new(150)]);
}

#[tokio::test(start_paused = true)]
async fn test_full_transition_cycle() {
    let (engine, clock) = engine_with(provider());
    engine.set_tempo(120).await.unwrap();

    assert_eq!(engine.set_tempo(140).await.unwrap(), TempoOutcome::Crossfading);
    assert_eq!(engine.phase(), TransitionPhase::Crossfading);

    sleep_until(&clock, 2.5).await;
    let half = engine.gains_at(clock.now());
    assert!((half.current - 0.5).abs() < 1e-3);
    assert!((half.incoming - 0.5).abs() < 1e-3);

    sleep_until(&clock, 5.05).await;
    assert_eq!(engine.phase(), TransitionPhase::GracePeriod);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(140)));
    assert_eq!(engine.incoming_tempo(), None);
    assert_eq!(engine.active_tracks(), 1);
    assert_eq!(engine.gains_at(clock.now()).current, 1.0);

    sleep_until(&clock, 10.1).await;
    assert_eq!(engine.phase(), TransitionPhase::Idle);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(140)));
    assert_eq!(engine.pending_tempo(), None);
}

#[tokio::test(start_paused = true)]
async fn test_request_during_crossfade_applies_after_grace() {
    let (engine, clock) = engine_with(provider());
    engine.set_tempo(120).await.unwrap();
    engine.set_tempo(140).await.unwrap();

    sleep_until(&clock, 1.0).await;
    assert_eq!(engine.set_tempo(160).await.unwrap(), TempoOutcome::Deferred);
    assert_eq!(engine.incoming_tempo(), Some(Bpm::new(140)));

    sleep_until(&clock, 9.9).await;
    assert_eq!(engine.phase(), TransitionPhase::GracePeriod);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(140)));
    assert_eq!(engine.pending_tempo(), Some(Bpm::new(160)));

    sleep_until(&clock, 10.1).await;
    assert_eq!(engine.phase(), TransitionPhase::Crossfading);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(140)));
    assert_eq!(engine.incoming_tempo(), Some(Bpm::new(160)));
    assert_eq!(engine.pending_tempo(), None);

    sleep_until(&clock, 15.2).await;
    assert_eq!(engine.phase(), TransitionPhase::GracePeriod);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(160)));
}

#[tokio::test(start_paused = true)]
async fn test_burst_during_busy_window_applies_only_last() {
    let provider = provider();
    let (engine, clock) = engine_with(provider.clone());
    engine.set_tempo(120).await.unwrap();
    engine.set_tempo(140).await.unwrap();

    for bpm in [150, 170, 90, 200, 180] {
        assert_eq!(engine.set_tempo(bpm).await.unwrap(), TempoOutcome::Deferred);
        tokio::time::sleep(Duration::from_millis(700)).await;
    }

    sleep_until(&clock, 21.0).await;
    assert_eq!(engine.current_tempo(), Some(Bpm::new(180)));
    assert_eq!(
        provider.requests(),
        vec![Bpm::new(120), Bpm::new(140), Bpm::new(180)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_loudness_is_continuous_through_crossfade() {
    let (engine, clock) = engine_with(provider());
    engine.set_tempo(100).await.unwrap();
    sleep_until(&clock, 0.3).await;
    engine.set_tempo(130).await.unwrap();

    let start = clock.now();
    for step in 0..=500 {
        let t = start + step as f64 * 0.01;
        let gains = engine.gains_at(t);
        assert!(
            (gains.total() - 1.0).abs() < 1e-4,
            "total gain {} at {:.2}s",
            gains.total(),
            t
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_request() {
    let (engine, _clock) = engine_with(provider());

    assert_eq!(engine.set_tempo(500).await.unwrap(), TempoOutcome::Started);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(120)));
    assert_eq!(engine.phase(), TransitionPhase::Idle);

    assert_eq!(engine.set_tempo(500).await.unwrap(), TempoOutcome::Ignored);
    assert_eq!(engine.phase(), TransitionPhase::Idle);
    assert_eq!(engine.current_tempo(), Some(Bpm::new(120)));
}

#[tokio::test(start_paused = true)]
async fn test_loading_window_coalesces_requests() {
    let provider = provider().with_latency(Duration::from_millis(400));
    let (engine, clock) = engine_with(provider.clone());

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.set_tempo(120).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.phase(), TransitionPhase::Loading);

    assert_eq!(engine.set_tempo(130).await.unwrap(), TempoOutcome::Deferred);
    assert_eq!(engine.set_tempo(140).await.unwrap(), TempoOutcome::Deferred);
    assert_eq!(first.await.unwrap().unwrap(), TempoOutcome::Started);

    // The pending request follows the initial load straight away
    sleep_until(&clock, 1.0).await;
    assert_eq!(engine.phase(), TransitionPhase::Crossfading);
    assert_eq!(engine.incoming_tempo(), Some(Bpm::new(140)));
    assert_eq!(
        provider.requests(),
        vec![Bpm::new(120), Bpm::new(140)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_transition_keeps_playing_and_retries_pending() {
    let provider = provider().with_latency(Duration::from_millis(200));
    provider.fail(Bpm::new(140), "decode error");
    let (engine, clock) = engine_with(provider.clone());
    engine.set_tempo(120).await.unwrap();

    let failing = tokio::spawn({
        let engine = engine.clone();
        async move { engine.set_tempo(140).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.set_tempo(150).await.unwrap(), TempoOutcome::Deferred);

    let result = failing.await.unwrap();
    assert!(matches!(result, Err(CrossfadeError::AssetLoad(_))));
    assert_eq!(engine.current_tempo(), Some(Bpm::new(120)));

    sleep_until(&clock, 1.0).await;
    assert_eq!(engine.phase(), TransitionPhase::Crossfading);
    assert_eq!(engine.incoming_tempo(), Some(Bpm::new(150)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_during_crossfade() {
    let (engine, clock) = engine_with(provider());
    engine.set_tempo(120).await.unwrap();
    engine.set_tempo(140).await.unwrap();
    engine.set_tempo(160).await.unwrap();

    sleep_until(&clock, 2.0).await;
    engine.stop_all();
    assert_eq!(engine.phase(), TransitionPhase::Idle);
    assert_eq!(engine.active_tracks(), 0);
    assert_eq!(engine.pending_tempo(), None);

    sleep_until(&clock, 20.0).await;
    assert_eq!(engine.phase(), TransitionPhase::Idle);
    assert_eq!(engine.active_tracks(), 0);
    assert_eq!(engine.current_tempo(), None);

    // A fresh start after the hard stop
    assert_eq!(engine.set_tempo(100).await.unwrap(), TempoOutcome::Started);
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_during_grace_cancels_pending() {
    let provider = provider();
    let (engine, clock) = engine_with(provider.clone());
    engine.set_tempo(120).await.unwrap();
    engine.set_tempo(140).await.unwrap();

    sleep_until(&clock, 6.0).await;
    engine.set_tempo(200).await.unwrap();
    engine.stop_all();

    sleep_until(&clock, 15.0).await;
    assert_eq!(engine.phase(), TransitionPhase::Idle);
    assert!(!provider.requests().contains(&Bpm::new(200)));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_is_final() {
    let (engine, clock) = engine_with(provider());
    engine.set_tempo(120).await.unwrap();
    engine.set_tempo(140).await.unwrap();

    engine.destroy();
    engine.destroy();
    assert!(engine.output().is_released());
    assert_eq!(engine.active_tracks(), 0);

    sleep_until(&clock, 12.0).await;
    assert_eq!(engine.phase(), TransitionPhase::Idle);
    assert!(matches!(
        engine.set_tempo(150).await,
        Err(CrossfadeError::Destroyed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_rendered_output_fades_between_tracks() {
    let provider = MemoryAssetProvider::new();
    provider.insert(Bpm::new(120), AudioBuffer::new(vec![0.4; 4800], 1, 48000));
    provider.insert(Bpm::new(140), AudioBuffer::new(vec![0.4; 4800], 1, 48000));
    let (engine, clock) = engine_with(provider);

    engine.set_tempo(120).await.unwrap();
    engine.set_tempo(140).await.unwrap();

    // Both tracks carry the same level, so the summed output stays flat
    let start = clock.now();
    let mut block = vec![0.0f32; 480];
    for second in 0..5 {
        block.fill(0.0);
        engine
            .output()
            .render(&mut block, 1, start + second as f64 + 0.5, 48000.0);
        assert!(block.iter().all(|s| (s - 0.4).abs() < 1e-3));
    }
}
