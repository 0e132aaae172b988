// Output engine - CPAL real-time callback
//
// The callback is the audio clock: every block is rendered against the
// SampleClock's current time and then advances it by the frames written.
// Clicks and music are mixed in f32 and converted to the device format
// (f32, i16 or u16) on the way out.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::audio::clock::{AudioClock, SampleClock};
use crate::audio::graph::MixBus;
use crate::messaging::channels::ClickConsumer;
use crate::sequencer::metronome::Metronome;

/// Frames mixed per pass; larger device blocks are rendered in several passes
const MIX_BLOCK_FRAMES: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Unsupported sample format: {0:?}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(SampleFormat),

    #[error("Failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Flush denormals to zero
#[inline]
fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft saturation into [-1, 1]
#[inline]
fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Render side of the output: metronome + music bus into one device buffer
///
/// Owned by the audio callback. Nothing here allocates or blocks.
pub struct OutputMixer {
    metronome: Metronome,
    music: MixBus,
    clock: SampleClock,
    channels: usize,
    scratch: Vec<f32>,
}

impl OutputMixer {
    pub fn new(metronome: Metronome, music: MixBus, clock: SampleClock, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            metronome,
            music,
            clock,
            channels,
            scratch: vec![0.0; MIX_BLOCK_FRAMES * channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    /// Fill one interleaved device buffer and advance the clock
    pub fn process<T>(&mut self, data: &mut [T])
    where
        T: Sample + FromSample<f32>,
    {
        let sample_rate = self.clock.sample_rate() as f64;
        let channels = self.channels;

        for block in data.chunks_mut(MIX_BLOCK_FRAMES * channels) {
            let block_start = self.clock.now();
            let mix = &mut self.scratch[..block.len()];
            mix.fill(0.0);

            self.metronome.render(mix, channels, block_start, sample_rate);
            self.music.render(mix, channels, block_start, sample_rate);

            for (out, &sample) in block.iter_mut().zip(mix.iter()) {
                *out = T::from_sample(soft_clip(flush_denormals_to_zero(sample)));
            }

            self.clock.advance(block.len() / channels);
        }
    }
}

/// Default output device streaming an [`OutputMixer`]
pub struct OutputStream {
    _device: Device,
    _stream: Stream,
    clock: SampleClock,
    channels: usize,
}

impl OutputStream {
    /// Open the default output device and start streaming clicks and music
    pub fn open(clicks: ClickConsumer, click_volume: f32, music: MixBus) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;
        log::info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device.default_output_config()?;
        let sample_format = supported_config.sample_format();
        log::info!("Audio config: {:?}", supported_config);

        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let clock = SampleClock::new(sample_rate);
        let mut metronome = Metronome::new(sample_rate, clicks);
        metronome.set_volume(click_volume);
        let mixer = OutputMixer::new(metronome, music, clock.clone(), channels);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, mixer),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, mixer),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, mixer),
            other => return Err(OutputError::UnsupportedFormat(other)),
        }?;
        stream.play()?;

        Ok(Self {
            _device: device,
            _stream: stream,
            clock,
            channels,
        })
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut mixer: OutputMixer,
    ) -> Result<Stream, OutputError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                mixer.process(data);
            },
            |err| {
                // Runs outside the real-time callback
                log::error!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }

    /// The device-driven audio clock
    pub fn clock(&self) -> SampleClock {
        self.clock.clone()
    }

    pub fn sample_rate(&self) -> f32 {
        self.clock.sample_rate()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
