// Decoded audio buffers - Loop-ready PCM held in memory

/// Interleaved f32 PCM, decoded once and shared between playback nodes
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap interleaved samples
    /// A trailing partial frame is dropped so the buffer always loops on a frame boundary
    pub fn new(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);

        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    pub fn silence(frames: usize, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        Self::new(vec![0.0; frames * channels as usize], channels, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Stereo view of one frame, wrapping around the loop point
    /// Mono is duplicated to both sides, extra channels are ignored
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let frames = self.frames();
        if frames == 0 {
            return (0.0, 0.0);
        }

        let channels = self.channels as usize;
        let base = (index % frames) * channels;
        let left = self.samples[base];
        let right = if channels > 1 { self.samples[base + 1] } else { left };
        (left, right)
    }
}
