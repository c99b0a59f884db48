//! Output files the worker writes into.

use crate::error::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Format of a recording output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Destination for interleaved f32 frames. Only ever touched by the worker.
pub trait AudioSink: Send {
    fn write_interleaved(&mut self, samples: &[f32]) -> Result<()>;

    /// Flush headers/trailers and close.
    fn finalize(self: Box<Self>) -> Result<()>;
}

/// Creates the primary output for a recording session.
pub trait OutputOpener: Send + Sync {
    fn open(&self, path: &Path, spec: SinkSpec) -> Result<Box<dyn AudioSink>>;
}

/// 32-bit float WAV via hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavOpener;

impl OutputOpener for WavOpener {
    fn open(&self, path: &Path, spec: SinkSpec) -> Result<Box<dyn AudioSink>> {
        let wav_spec = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let file = File::create(path)?;
        let writer = WavWriter::new(BufWriter::new(file), wav_spec)?;
        Ok(Box::new(WavSink { writer }))
    }
}

struct WavSink {
    writer: WavWriter<BufWriter<File>>,
}

impl AudioSink for WavSink {
    fn write_interleaved(&mut self, samples: &[f32]) -> Result<()> {
        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}
