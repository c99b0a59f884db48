//! Error types for flowzone-guard.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed crash state: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GuardError>;
