//! Planar multichannel audio block.

/// Non-interleaved audio: one `Vec<f32>` per channel, all the same length.
///
/// Allocate it once off the audio thread (`new` or `set_size`) and reuse it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    num_frames: usize,
}

impl AudioBuffer {
    /// Zero-filled buffer.
    pub fn new(num_channels: usize, num_frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_frames]; num_channels],
            num_frames,
        }
    }

    /// Wrap existing channel data. Channels are truncated to the shortest one.
    pub fn from_channels(mut channels: Vec<Vec<f32>>) -> Self {
        let num_frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(num_frames);
        }
        Self {
            channels,
            num_frames,
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Resize and zero every channel.
    pub fn set_size(&mut self, num_channels: usize, num_frames: usize) {
        self.channels.resize_with(num_channels, Vec::new);
        for channel in &mut self.channels {
            channel.clear();
            channel.resize(num_frames, 0.0);
        }
        self.num_frames = num_frames;
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Absolute peak across all channels.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}
