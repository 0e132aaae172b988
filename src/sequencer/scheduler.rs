// Beat scheduler - Look-ahead metronome driven by a coarse host timer
//
// A periodic tokio task wakes every `tick_interval_ms` and commits every beat
// that falls inside `[now, now + schedule_ahead_s)` to the audio thread,
// stamped with its exact audio-clock time. Host jitter only moves the commit,
// never the click.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ringbuf::traits::Producer;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::clock::AudioClock;
use crate::config::SchedulerConfig;
use crate::messaging::channels::ClickProducer;
use crate::sequencer::metronome::{ClickType, ScheduledClick};
use crate::sequencer::tempo::Bpm;

/// Upper bound on beats committed by one pass, the rest wait for the next tick
const MAX_BEATS_PER_PASS: usize = 32;

/// Destination of committed clicks (the audio-thread metronome)
pub trait ClickSink: Send {
    fn commit(&mut self, click: ScheduledClick);
}

impl ClickSink for ClickProducer {
    fn commit(&mut self, click: ScheduledClick) {
        if self.try_push(click).is_err() {
            log::warn!("Click queue full, dropping beat at {:.3}s", click.at);
        }
    }
}

/// Per-beat notification, called once per committed beat close to its audible tick
pub type BeatCallback = Arc<dyn Fn() + Send + Sync>;

/// A delayed tempo change waiting for its due time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTempo {
    pub target: Bpm,
    /// Audio-clock time the change takes effect
    pub due_at: f64,
}

struct ScheduleState {
    running: bool,
    bpm: Bpm,
    next_beat_time: f64,
    pending: Option<PendingTempo>,
    beat_index: u64,
    /// Bumped by start/stop; timer tasks holding an older value are stale
    epoch: u64,
    /// Bumped whenever the pending change is replaced or consumed
    pending_generation: u64,
    loop_task: Option<JoinHandle<()>>,
    pending_task: Option<JoinHandle<()>>,
    callback: Option<BeatCallback>,
    sink: Box<dyn ClickSink>,
}

impl ScheduleState {
    fn clear_pending(&mut self) {
        self.pending = None;
        self.pending_generation += 1;
        if let Some(task) = self.pending_task.take() {
            task.abort();
        }
    }
}

struct Shared {
    state: Mutex<ScheduleState>,
    clock: Arc<dyn AudioClock>,
    config: SchedulerConfig,
    runtime: Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One look-ahead pass; returns false once the loop belongs to a stopped session
    fn schedule_pass(self: &Arc<Self>, epoch: u64) -> bool {
        let mut state = self.lock();
        if !state.running || state.epoch != epoch {
            return false;
        }

        let now = self.clock.now();
        let horizon = now + self.config.schedule_ahead_s;

        let mut committed = 0;
        while state.next_beat_time < horizon {
            if committed == MAX_BEATS_PER_PASS {
                log::warn!(
                    "Look-ahead window holds more than {} beats, deferring the rest",
                    MAX_BEATS_PER_PASS
                );
                break;
            }
            committed += 1;
            let at = state.next_beat_time;

            if let Some(pending) = state.pending
                && pending.due_at <= at
            {
                log::debug!("Delayed tempo {} takes effect at beat {:.3}s", pending.target, at);
                state.bpm = pending.target;
                state.clear_pending();
            }

            let accent_every = self.config.accent_every as u64;
            let kind = if accent_every > 0 && state.beat_index % accent_every == 0 {
                ClickType::Accent
            } else {
                ClickType::Regular
            };
            state.sink.commit(ScheduledClick { at, kind });

            if state.callback.is_some() {
                self.spawn_notification(epoch, (at - now).max(0.0));
            }

            state.beat_index += 1;
            state.next_beat_time = at + state.bpm.beat_duration_seconds();
        }

        true
    }

    fn spawn_notification(self: &Arc<Self>, epoch: u64, delay_seconds: f64) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(delay_seconds)).await;

            // Re-read the callback so removal takes effect for beats already committed
            let callback = {
                let state = shared.lock();
                if !state.running || state.epoch != epoch {
                    return;
                }
                state.callback.clone()
            };

            if let Some(callback) = callback {
                callback();
            }
        });
    }

    fn apply_pending(&self, epoch: u64, generation: u64) {
        let mut state = self.lock();
        if state.epoch != epoch || state.pending_generation != generation {
            log::debug!("Discarding stale delayed tempo change");
            return;
        }
        if let Some(pending) = state.pending.take() {
            log::info!("Applying delayed tempo {}", pending.target);
            state.bpm = pending.target;
            state.pending_generation += 1;
            state.pending_task = None;
        }
    }
}

/// Look-ahead metronome scheduler
///
/// Beats are committed to a [`ClickSink`] with sample-accurate audio-clock
/// times, and a [`BeatCallback`] is notified for each one. Tempo changes apply
/// to beats not yet committed; already committed clicks are never moved.
pub struct BeatScheduler {
    shared: Arc<Shared>,
}

impl BeatScheduler {
    pub fn new(
        config: SchedulerConfig,
        clock: Arc<dyn AudioClock>,
        sink: Box<dyn ClickSink>,
        runtime: Handle,
    ) -> Self {
        let bpm = config.tempo_range().default_bpm();

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ScheduleState {
                    running: false,
                    bpm,
                    next_beat_time: 0.0,
                    pending: None,
                    beat_index: 0,
                    epoch: 0,
                    pending_generation: 0,
                    loop_task: None,
                    pending_task: None,
                    callback: None,
                    sink,
                }),
                clock,
                config,
                runtime,
            }),
        }
    }

    /// Begin emitting beats `start_offset_s` from now (no-op while running)
    pub fn start(&self) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if state.running {
            return;
        }

        state.running = true;
        state.epoch += 1;
        state.beat_index = 0;
        state.next_beat_time = shared.clock.now() + shared.config.start_offset_s;

        let epoch = state.epoch;
        let tick = shared.config.tick_interval();
        let loop_shared = Arc::clone(shared);
        state.loop_task = Some(shared.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !loop_shared.schedule_pass(epoch) {
                    break;
                }
            }
        }));

        log::info!(
            "Beat scheduler started at {}, first beat at {:.3}s",
            state.bpm,
            state.next_beat_time
        );
    }

    /// Stop emitting beats and drop any delayed tempo change
    ///
    /// Clicks already committed to the audio thread still sound.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if !state.running {
            return;
        }

        state.running = false;
        state.epoch += 1;
        if let Some(task) = state.loop_task.take() {
            task.abort();
        }
        state.clear_pending();

        log::info!("Beat scheduler stopped after {} beats", state.beat_index);
    }

    /// Change tempo now (`delay_seconds <= 0`) or after `delay_seconds`
    ///
    /// Out-of-range values are clamped. A later call replaces an earlier
    /// pending change. While stopped the change is applied at once.
    pub fn set_tempo(&self, bpm: i32, delay_seconds: f64) {
        let target = self.shared.config.tempo_range().clamp(bpm);
        let mut state = self.shared.lock();

        let delay = if delay_seconds > 0.0 && state.running {
            match Duration::try_from_secs_f64(delay_seconds) {
                Ok(delay) => Some(delay),
                Err(_) => {
                    log::warn!("Unusable tempo delay {}s, applying {} now", delay_seconds, target);
                    None
                }
            }
        } else {
            None
        };

        state.clear_pending();

        let Some(delay) = delay else {
            if state.bpm != target {
                log::info!("Tempo {} -> {}", state.bpm, target);
            }
            state.bpm = target;
            return;
        };

        let due_at = self.shared.clock.now() + delay.as_secs_f64();
        state.pending = Some(PendingTempo { target, due_at });

        let epoch = state.epoch;
        let generation = state.pending_generation;
        let shared = Arc::clone(&self.shared);
        state.pending_task = Some(self.shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.apply_pending(epoch, generation);
        }));

        log::debug!("Tempo {} scheduled at {:.3}s", target, due_at);
    }

    /// Install or remove the per-beat notification
    pub fn set_beat_callback(&self, callback: Option<BeatCallback>) {
        self.shared.lock().callback = callback;
    }

    pub fn current_tempo(&self) -> Bpm {
        self.shared.lock().bpm
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Audio-clock time of the next uncommitted beat, `None` while stopped
    pub fn next_beat_time(&self) -> Option<f64> {
        let state = self.shared.lock();
        state.running.then_some(state.next_beat_time)
    }

    pub fn pending_tempo(&self) -> Option<PendingTempo> {
        self.shared.lock().pending
    }

    /// Beats committed since the last `start()`
    pub fn beats_scheduled(&self) -> u64 {
        self.shared.lock().beat_index
    }
}

impl Drop for BeatScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
