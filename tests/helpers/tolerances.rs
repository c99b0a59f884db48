//! Tolerance constants for audio testing.
//!
//! Different paths need different precision levels.

/// Floating point rounding errors. Use for paths that copy samples verbatim
/// (retrospective buffer, 32-bit float WAV).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// 24-bit quantization step size.
/// Use when comparing against the emergency FLAC export.
pub const INT24_EPSILON: f32 = 1.0 / 8388608.0;
