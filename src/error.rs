//! Centralized error type for the flowzone umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] flowzone_core::Error),

    #[error("Recorder: {0}")]
    Recorder(#[from] flowzone_recorder::RecorderError),

    #[error("Crash guard: {0}")]
    Guard(#[from] flowzone_guard::GuardError),

    #[error("Sync: {0}")]
    Sync(#[from] flowzone_sync::SyncError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
