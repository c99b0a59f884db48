//! # FlowZone Recorder
//!
//! Tiered disk writer. The audio thread hands blocks to a
//! [`DiskWriterInput`] in bounded time; a background worker persists them
//! and the writer degrades through [`Tier`]s as storage falls behind:
//!
//! | Tier | Condition | Effect |
//! |---|---|---|
//! | Normal | ring fill at or below 80% | drain continuously |
//! | Warning | ring fill above 80% | advisory only |
//! | Overflow | block did not fit the ring | block copied to the heap, flushed in order |
//! | Critical | heap backlog above 1 GiB | recording stops, backlog goes to `*.emergency.flac` |
//!
//! Thresholds live in [`TierLimits`].

pub mod config;
pub mod emergency;
pub mod error;
mod ring;
pub mod sink;
pub mod tier;
mod worker;
mod writer;

pub use config::DiskWriterConfig;
pub use emergency::emergency_path;
pub use error::{RecorderError, Result};
pub use sink::{AudioSink, OutputOpener, SinkSpec, WavOpener};
pub use tier::{Tier, TierChange, TierLimits, TierStatus};
pub use writer::{DiskWriter, DiskWriterInput};
