//! Error types for flowzone-recorder.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Emergency export unavailable: built without the `flac` feature")]
    EmergencyUnavailable,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Disk writer input already taken")]
    InputTaken,
}

pub type Result<T> = std::result::Result<T, RecorderError>;
