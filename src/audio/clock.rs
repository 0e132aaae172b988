// Audio clock - Monotonic time base for look-ahead scheduling
// Host timers only poll this clock; every committed event is stamped with it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// Monotonic audio-clock time source, in seconds
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock driven by the output device
/// The audio callback advances it by the number of frames it rendered
#[derive(Clone)]
pub struct SampleClock {
    frame_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frame_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Frames rendered so far (called from the control side)
    pub fn current_frame(&self) -> u64 {
        self.frame_position.load(Ordering::Relaxed)
    }

    /// Advance by one rendered block (called from the audio callback)
    pub fn advance(&self, frames: usize) {
        self.frame_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate
    }

    /// Convert an audio-clock time to a frame index (negative times map to 0)
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate) as u64
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.frames_to_seconds(self.current_frame())
    }
}

/// Host-time clock, seconds since creation
///
/// Used when no output device drives a [`SampleClock`]. It follows tokio's
/// clock, so it also advances deterministically under a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for HostClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_creation() {
        let clock = SampleClock::new(48000.0);
        assert_eq!(clock.current_frame(), 0);
        assert_eq!(clock.sample_rate(), 48000.0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_advance_frames() {
        let clock = SampleClock::new(48000.0);
        clock.advance(480);
        assert_eq!(clock.current_frame(), 480);
        clock.advance(480);
        assert_eq!(clock.current_frame(), 960);

        // 960 frames @ 48kHz = 20ms
        assert!((clock.now() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_clones_share_position() {
        let clock = SampleClock::new(44100.0);
        let render_side = clock.clone();
        render_side.advance(44100);
        assert!((clock.now() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_seconds_to_frames() {
        let clock = SampleClock::new(48000.0);
        assert_eq!(clock.seconds_to_frames(1.0), 48000);
        assert_eq!(clock.seconds_to_frames(0.01), 480);
        assert_eq!(clock.seconds_to_frames(-0.5), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_clock_follows_runtime_time() {
        let clock = HostClock::new();
        assert_eq!(clock.now(), 0.0);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!((clock.now() - 0.25).abs() < 1e-9);
    }
}
