//! Error types for flowzone-sync.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid JSON pointer: {0:?}")]
    InvalidPointer(String),

    #[error("Path not found: {0:?}")]
    PathNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
