//! Emergency export: dump whatever is still buffered to a compact 24-bit
//! FLAC next to the primary recording.

use crate::error::{RecorderError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// FLAC frames per block.
#[cfg(feature = "flac")]
const FLAC_BLOCK_SIZE: usize = 4096;

/// `take.wav` becomes `take.emergency.flac`.
pub fn emergency_path(primary: &Path) -> PathBuf {
    primary.with_extension("emergency.flac")
}

/// Supplies the emergency encoder with interleaved frames in capture order.
pub(crate) trait FrameFeed {
    /// Append up to `max_frames` whole frames to `out` and return how many
    /// were appended. Zero means the feed is exhausted.
    fn pull(&mut self, max_frames: usize, out: &mut Vec<f32>) -> usize;
}

struct SliceFeed<'a> {
    samples: &'a [f32],
    channels: usize,
}

impl FrameFeed for SliceFeed<'_> {
    fn pull(&mut self, max_frames: usize, out: &mut Vec<f32>) -> usize {
        let take = (max_frames * self.channels).min(self.samples.len());
        let (head, rest) = self.samples.split_at(take);
        out.extend_from_slice(head);
        self.samples = rest;
        take / self.channels
    }
}

fn check_layout(interleaved: &[f32], channels: usize) -> Result<()> {
    if channels == 0 || interleaved.len() % channels != 0 {
        return Err(RecorderError::Encoding(format!(
            "{} samples do not divide into {} channels",
            interleaved.len(),
            channels
        )));
    }
    Ok(())
}

/// Encode interleaved samples and write them to `path`.
///
/// Writes through a `.part` file and renames it into place, so the final
/// path only ever holds a complete stream.
pub fn write_emergency_file(
    path: &Path,
    interleaved: &[f32],
    channels: usize,
    sample_rate: u32,
) -> Result<()> {
    check_layout(interleaved, channels)?;
    let mut feed = SliceFeed {
        samples: interleaved,
        channels,
    };
    write_emergency_stream(path, &mut feed, channels, sample_rate)
}

/// Like [`write_emergency_file`], pulling audio from `feed` one FLAC block
/// at a time.
pub(crate) fn write_emergency_stream<F: FrameFeed>(
    path: &Path,
    feed: &mut F,
    channels: usize,
    sample_rate: u32,
) -> Result<()> {
    let bytes = encode_feed(feed, channels, sample_rate)?;
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);
    fs::write(&part, bytes)?;
    fs::rename(&part, path)?;
    Ok(())
}

#[cfg(test)]
fn encode_flac(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Vec<u8>> {
    check_layout(interleaved, channels)?;
    let mut feed = SliceFeed {
        samples: interleaved,
        channels,
    };
    encode_feed(&mut feed, channels, sample_rate)
}

/// Adapts a [`FrameFeed`] to the encoder, converting one block at a time.
#[cfg(feature = "flac")]
struct FeedSource<'a, F> {
    feed: &'a mut F,
    channels: usize,
    sample_rate: u32,
    pulled: Vec<f32>,
    block: Vec<i32>,
}

#[cfg(feature = "flac")]
impl<F: FrameFeed> flacenc::source::Source for FeedSource<'_, F> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn bits_per_sample(&self) -> usize {
        24
    }

    fn sample_rate(&self) -> usize {
        self.sample_rate as usize
    }

    fn read_samples<D: flacenc::source::Fill>(
        &mut self,
        block_size: usize,
        dest: &mut D,
    ) -> std::result::Result<usize, flacenc::error::SourceError> {
        // Only the final block may come up short.
        self.pulled.clear();
        let wanted = block_size * self.channels;
        while self.pulled.len() < wanted {
            let missing = (wanted - self.pulled.len()) / self.channels;
            if self.feed.pull(missing, &mut self.pulled) == 0 {
                break;
            }
        }

        self.block.clear();
        self.block
            .extend(self.pulled.iter().map(|&s| float_to_i24(s)));
        dest.fill_interleaved(&self.block)?;
        Ok(self.block.len() / self.channels)
    }
}

#[cfg(feature = "flac")]
fn encode_feed<F: FrameFeed>(feed: &mut F, channels: usize, sample_rate: u32) -> Result<Vec<u8>> {
    use flacenc::bitsink::ByteSink;
    use flacenc::component::BitRepr;
    use flacenc::config::Encoder as EncoderConfig;
    use flacenc::encode_with_fixed_block_size;
    use flacenc::error::Verify;

    if channels == 0 {
        return Err(RecorderError::Encoding("no channels to encode".into()));
    }

    let encoder_config = EncoderConfig::default()
        .into_verified()
        .map_err(|e| RecorderError::Encoding(format!("Invalid FLAC config: {:?}", e)))?;

    let source = FeedSource {
        feed,
        channels,
        sample_rate,
        pulled: Vec::with_capacity(FLAC_BLOCK_SIZE * channels),
        block: Vec::with_capacity(FLAC_BLOCK_SIZE * channels),
    };

    let stream = encode_with_fixed_block_size(&encoder_config, source, FLAC_BLOCK_SIZE)
        .map_err(|e| RecorderError::Encoding(format!("FLAC encoding failed: {:?}", e)))?;

    let mut sink = ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| RecorderError::Encoding(format!("Failed to write FLAC stream: {:?}", e)))?;

    Ok(sink.into_inner())
}

#[cfg(not(feature = "flac"))]
fn encode_feed<F: FrameFeed>(_feed: &mut F, _channels: usize, _sample_rate: u32) -> Result<Vec<u8>> {
    Err(RecorderError::EmergencyUnavailable)
}

#[cfg_attr(not(feature = "flac"), allow(dead_code))]
#[inline]
fn float_to_i24(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * 8388607.0) as i32
}
