//! Integration test modules for FlowZone
//!
//! - engine: builder, commands, retrospective capture
//! - recording: disk writer through the engine
//! - crash_recovery: crash guard across restarts
//! - state_sync: broadcasting engine state

pub mod crash_recovery;
pub mod engine;
pub mod recording;
pub mod state_sync;
