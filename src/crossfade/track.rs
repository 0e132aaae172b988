// Track - One looping music buffer with its own playback and gain nodes

use std::sync::Arc;

use crate::audio::automation::GainAutomation;
use crate::audio::buffer::AudioBuffer;
use crate::audio::graph::{ChannelId, GraphError, MixBus};
use crate::sequencer::tempo::Bpm;

/// A loaded, tempo-tagged loop connected to the output bus
///
/// The track exclusively owns its bus channel. Dropping it disconnects the
/// channel, which silences it from the next rendered block.
pub struct Track {
    tempo: Bpm,
    frames: usize,
    channel: ChannelId,
    bus: MixBus,
}

impl Track {
    /// Connect `buffer` to `bus` (not started yet) at `initial_gain`
    pub fn load(
        bus: &MixBus,
        tempo: Bpm,
        buffer: Arc<AudioBuffer>,
        initial_gain: f32,
    ) -> Result<Self, GraphError> {
        let frames = buffer.frames();
        let channel = bus.connect(buffer, initial_gain)?;
        log::debug!("Track {} connected on channel {}", tempo, channel);

        Ok(Self {
            tempo,
            frames,
            channel,
            bus: bus.clone(),
        })
    }

    pub fn tempo(&self) -> Bpm {
        self.tempo
    }

    pub fn is_playing(&self) -> bool {
        self.bus.is_started(self.channel)
    }

    /// Start playback; a rejected duplicate start is logged and ignored
    pub fn start_at(&self, time: f64) {
        if let Err(e) = self.bus.start_at(self.channel, time) {
            log::warn!("Track {}: start rejected ({})", self.tempo, e);
        }
    }

    pub fn ensure_playing(&self, time: f64) {
        if !self.is_playing() {
            log::info!("Track {} was not playing, restarting", self.tempo);
            self.start_at(time);
        }
    }

    pub fn stop_at(&self, time: f64) {
        if let Err(e) = self.bus.stop_at(self.channel, time) {
            log::warn!("Track {}: stop rejected ({})", self.tempo, e);
        }
    }

    /// Ramp linearly from the gain in effect at `now` down to silence at `end`
    pub fn fade_out(&self, now: f64, end: f64) {
        self.edit_gain(|gain| {
            let level = gain.value_at(now);
            gain.cancel_after(now);
            gain.set_value_at(now, level);
            gain.linear_ramp_to(0.0, end);
        });
    }

    /// Ramp linearly from silence at `now` up to `target` at `end`
    pub fn fade_in(&self, now: f64, end: f64, target: f32) {
        self.edit_gain(|gain| {
            gain.cancel_after(now);
            gain.set_value_at(now, 0.0);
            gain.linear_ramp_to(target, end);
        });
    }

    /// Scheduled gain at audio-clock `time` (0 once disconnected)
    pub fn gain_at(&self, time: f64) -> f32 {
        self.bus.gain_at(self.channel, time).unwrap_or(0.0)
    }

    fn edit_gain(&self, edit: impl FnOnce(&mut GainAutomation)) {
        if let Err(e) = self.bus.with_gain(self.channel, edit) {
            log::warn!("Track {}: gain change rejected ({})", self.tempo, e);
        }
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        if self.bus.disconnect(self.channel) {
            log::debug!("Track {} released channel {}", self.tempo, self.channel);
        }
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("tempo", &self.tempo)
            .field("channel", &self.channel)
            .field("frames", &self.frames)
            .finish()
    }
}
