//! # FlowZone - Live Looper Core
//!
//! Real-time backbone of a live looping instrument, built from modular
//! subsystems.
//!
//! ## Architecture
//!
//! FlowZone is an umbrella crate that coordinates:
//! - **flowzone-core** - Command channel, retrospective capture buffer, lock-free atomics
//! - **flowzone-recorder** - Tiered disk writer with emergency FLAC export
//! - **flowzone-guard** - Crash sentinel and staged safe mode
//! - **flowzone-sync** - JSON patch state broadcasting to remote UIs
//!
//! ## Quick Start
//!
//! ```ignore
//! use flowzone::prelude::*;
//!
//! let engine = FlowEngine::builder()
//!     .sample_rate(48000.0)
//!     .storage_root(data_dir)
//!     .build()?;
//!
//! // Audio thread
//! let mut processor = engine.take_processor().unwrap();
//! processor.process(&input, |cmd| dispatcher.apply(cmd));
//!
//! // Control thread
//! engine.send_command(r#"{"cmd":"PLAY"}"#);
//! engine.start_recording(session_dir.join("take.wav"));
//!
//! // Orderly exit clears the crash sentinel
//! engine.shutdown();
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything, including `flac`
//! - `flac` - Emergency FLAC export when recording hits the Critical tier

/// Re-export of flowzone-core for direct access
pub use flowzone_core as core;

/// Re-export of flowzone-recorder
pub use flowzone_recorder as recorder;

/// Re-export of flowzone-guard
pub use flowzone_guard as guard;

/// Re-export of flowzone-sync
pub use flowzone_sync as sync;

// Core types
pub use flowzone_core::{
    AtomicFlag,

    // Lock-free primitives
    AtomicFloat,
    // Audio
    AudioBuffer,
    // Commands
    Command,
    CommandEnvelope,
    CoreConfig,
    RetrospectiveBuffer,
    MAX_COMMAND_BYTES,
};

// Recording
pub use flowzone_recorder::{DiskWriterConfig, Tier, TierLimits, TierStatus};

// Crash guard
pub use flowzone_guard::{CrashEvent, CrashGuard, CrashSeverity, GuardConfig, SafeModeLevel};

// State sync
pub use flowzone_sync::{
    apply_patch, AppState, Broadcast, BroadcastConfig, BroadcastTicker, PatchOp, StateBroadcaster,
    StateMessage,
};

pub use std::sync::atomic::Ordering;

mod builder;
mod engine;
mod error;

pub use builder::FlowEngineBuilder;
pub use engine::{AudioProcessor, BlockReport, FlowEngine, WAVEFORM_POINTS};
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{AudioProcessor, FlowEngine, FlowEngineBuilder};

    // Essential types
    pub use crate::core::{AudioBuffer, Command, CommandEnvelope};

    // Recording
    pub use crate::recorder::{Tier, TierStatus};

    // Crash guard
    pub use crate::guard::SafeModeLevel;

    // State sync
    pub use crate::sync::{AppState, StateMessage};
}
