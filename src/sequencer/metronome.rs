// Metronome - Click output node
// Plays committed clicks at the exact frame their audio-clock time falls on

use std::collections::VecDeque;
use std::f32::consts::PI;

use ringbuf::traits::{Consumer, Observer};

use crate::audio::graph::mix_stereo_into_frame;
use crate::messaging::channels::ClickConsumer;

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    /// First beat of a bar
    Accent,
    /// Every other beat
    Regular,
}

/// A click committed to the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledClick {
    /// Audio-clock time in seconds
    pub at: f64,
    pub kind: ClickType,
}

/// Pitch and level of one click kind
#[derive(Debug, Clone, Copy)]
struct ClickShape {
    frequency: f32,
    peak: f32,
}

impl ClickShape {
    const ACCENT: ClickShape = ClickShape {
        frequency: 1200.0,
        peak: 0.6,
    };
    const REGULAR: ClickShape = ClickShape {
        frequency: 800.0,
        peak: 0.4,
    };

    /// Sine burst decaying to ~e^-8 over `frames`
    fn render(self, sample_rate: f32, frames: usize) -> Vec<f32> {
        let omega = 2.0 * PI * self.frequency / sample_rate;
        let decay = 8.0 / frames.max(1) as f32;
        (0..frames)
            .map(|n| {
                let n = n as f32;
                self.peak * (-decay * n).exp() * (omega * n).sin()
            })
            .collect()
    }
}

/// Click waveforms rendered once for the device rate
#[derive(Debug, Clone)]
pub struct MetronomeSound {
    accent: Vec<f32>,
    regular: Vec<f32>,
}

impl MetronomeSound {
    const LENGTH_SECONDS: f32 = 0.010;

    pub fn new(sample_rate: f32) -> Self {
        let frames = (Self::LENGTH_SECONDS * sample_rate) as usize;
        Self {
            accent: ClickShape::ACCENT.render(sample_rate, frames),
            regular: ClickShape::REGULAR.render(sample_rate, frames),
        }
    }

    pub fn waveform(&self, kind: ClickType) -> &[f32] {
        match kind {
            ClickType::Accent => &self.accent,
            ClickType::Regular => &self.regular,
        }
    }

    /// Click length in frames
    pub fn frames(&self) -> usize {
        self.accent.len()
    }
}

/// Audio-thread side of the beat scheduler
///
/// Receives [`ScheduledClick`]s through a ring buffer and starts each one on
/// the first frame whose audio-clock time reaches it. Clicks that arrive late
/// start on the first frame of the block.
pub struct Metronome {
    sound: MetronomeSound,
    volume: f32,
    commits: ClickConsumer,
    queued: VecDeque<ScheduledClick>,
    /// Kind and read offset of the click sounding now
    sounding: Option<(ClickType, usize)>,
}

impl Metronome {
    const QUEUE_CAPACITY: usize = 64;

    pub fn new(sample_rate: f32, commits: ClickConsumer) -> Self {
        Self {
            sound: MetronomeSound::new(sample_rate),
            volume: 0.5,
            commits,
            queued: VecDeque::with_capacity(Self::QUEUE_CAPACITY),
            sounding: None,
        }
    }

    /// Click level in `[0, 1]`
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Clicks received but not started yet
    pub fn queued_clicks(&self) -> usize {
        self.queued.len() + self.commits.occupied_len()
    }

    fn next_click_sample(&mut self) -> f32 {
        let Some((kind, offset)) = self.sounding.as_mut() else {
            return 0.0;
        };
        match self.sound.waveform(*kind).get(*offset) {
            Some(&sample) => {
                *offset += 1;
                sample * self.volume
            }
            None => {
                self.sounding = None;
                0.0
            }
        }
    }

    /// Mix clicks into `output` (interleaved, `channels` wide)
    /// `block_start` is the audio-clock time of the first frame
    pub fn render(&mut self, output: &mut [f32], channels: usize, block_start: f64, sample_rate: f64) {
        if channels == 0 || sample_rate <= 0.0 {
            return;
        }

        while let Some(click) = self.commits.try_pop() {
            self.queued.push_back(click);
        }

        for (index, frame) in output.chunks_mut(channels).enumerate() {
            let time = block_start + index as f64 / sample_rate;
            while let Some(click) = self.queued.front().copied() {
                if click.at > time {
                    break;
                }
                self.queued.pop_front();
                self.sounding = Some((click.kind, 0));
            }

            let sample = self.next_click_sample();
            if sample != 0.0 {
                mix_stereo_into_frame((sample, sample), frame);
            }
        }
    }

    /// Drop queued and sounding clicks
    pub fn reset(&mut self) {
        while self.commits.try_pop().is_some() {}
        self.queued.clear();
        self.sounding = None;
    }
}
