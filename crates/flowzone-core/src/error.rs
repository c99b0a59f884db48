//! Error types for flowzone-core.

use thiserror::Error;

/// Error type for flowzone-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Command exceeds {max} bytes (got {len})")]
    CommandTooLong { len: usize, max: usize },

    #[error("Malformed command: {0}")]
    MalformedCommand(#[from] serde_json::Error),

    #[error("Command is missing the \"cmd\" field")]
    MissingCommandName,
}

pub type Result<T> = std::result::Result<T, Error>;
