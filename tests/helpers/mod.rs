//! Test helpers and fixtures for FlowZone integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Verbatim copies (retrospective buffer, float WAV)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)
//! - `INT24_EPSILON`: 24-bit quantization (emergency FLAC)

#![allow(dead_code)]

pub mod tolerances;

use flowzone::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Standard block size for deterministic testing
pub const TEST_BLOCK_SIZE: usize = 512;

/// Install a test subscriber so `tracing` output shows up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Create a stereo test engine with a crash guard rooted at `root`.
pub fn test_engine(root: &Path) -> FlowEngine {
    FlowEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_size(TEST_BLOCK_SIZE)
        .retrospective_seconds(2.0)
        .storage_root(root)
        .build()
        .expect("Failed to create test engine")
}

/// Generate an integer staircase signal [start, start+1, ...] as f32.
///
/// Each sample equals its absolute index, so any reordering or loss shows
/// up as a broken staircase.
pub fn generate_staircase(start: usize, num_samples: usize) -> Vec<f32> {
    (start..start + num_samples).map(|i| i as f32).collect()
}

/// Stereo block whose left channel is a staircase from `start` and whose
/// right channel is its negation.
pub fn staircase_block(start: usize, num_frames: usize) -> AudioBuffer {
    let left = generate_staircase(start, num_frames);
    let right = left.iter().map(|s| -s).collect();
    AudioBuffer::from_channels(vec![left, right])
}

/// Generate a sine wave at `frequency`.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Check if audio is silent (all samples below threshold).
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    samples.iter().all(|&s| s.abs() <= threshold)
}

/// Assert staircase signal is valid from `start`.
pub fn assert_staircase_valid(samples: &[f32], start: usize, tolerance: f32) {
    for (i, &s) in samples.iter().enumerate() {
        let expected = (start + i) as f32;
        assert!(
            (s - expected).abs() <= tolerance,
            "Staircase mismatch at sample {}: expected {}, got {}",
            i,
            expected,
            s
        );
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Load a float WAV and deinterleave it.
///
/// Returns `(channels, sample_rate)`.
pub fn load_wav_file(path: &Path) -> Result<(Vec<Vec<f32>>, u32), String> {
    use hound::WavReader;

    let reader = WavReader::open(path)
        .map_err(|e| format!("Failed to open WAV '{}': {}", path.display(), e))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Float {
        return Err(format!("Expected float WAV, got {:?}", spec.sample_format));
    }

    let samples: Vec<f32> = reader
        .into_samples::<f32>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to read float samples: {}", e))?;

    let channels = spec.channels as usize;
    let mut out = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks(channels) {
        for (c, &s) in frame.iter().enumerate() {
            out[c].push(s);
        }
    }
    Ok((out, spec.sample_rate))
}
