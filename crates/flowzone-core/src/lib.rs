//! # FlowZone Core
//!
//! Real-time primitives shared by the FlowZone subsystems.
//!
//! - [`command`] - SPSC command channel from the control thread to the audio thread
//! - [`retrospective`] - Always-recording circular buffer for "rewind" capture
//! - [`buffer`] - Planar multichannel audio block
//! - [`lockfree`] - Cache-aligned atomics used across thread boundaries
//!
//! Nothing in the audio-thread halves of these types allocates, blocks or logs.

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod lockfree;
pub mod retrospective;

pub use buffer::AudioBuffer;
pub use command::{
    command_channel, Command, CommandEnvelope, CommandReceiver, CommandSender,
    DEFAULT_COMMAND_CAPACITY, MAX_COMMAND_BYTES,
};
pub use config::CoreConfig;
pub use error::{Error, Result};
pub use lockfree::{AtomicFlag, AtomicFloat, AtomicSample};
pub use retrospective::RetrospectiveBuffer;

pub use std::sync::atomic::Ordering;
pub use std::sync::Arc;
