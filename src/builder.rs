//! Builder for configuring and constructing a `FlowEngine`.

use crate::core::{command_channel, CoreConfig, RetrospectiveBuffer};
use crate::guard::{CrashGuard, GuardConfig};
use crate::recorder::{DiskWriter, DiskWriterConfig, RecorderError};
use crate::sync::{BroadcastConfig, StateBroadcaster};
use crate::{FlowEngine, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// The crash guard is only enabled when a storage root is given, either via
/// [`storage_root`](Self::storage_root) or a full
/// [`guard_config`](Self::guard_config). Building marks the session active.
///
/// # Example
///
/// ```ignore
/// use flowzone::prelude::*;
///
/// let engine = FlowEngine::builder()
///     .sample_rate(44100.0)
///     .block_size(256)
///     .retrospective_seconds(30.0)
///     .storage_root(data_dir)
///     .build()?;
///
/// if engine.safe_mode_level() >= SafeModeLevel::DisablePlugins {
///     // skip plugin scan
/// }
/// ```
#[derive(Debug, Default)]
pub struct FlowEngineBuilder {
    core: CoreConfig,
    recorder: DiskWriterConfig,
    broadcast: BroadcastConfig,
    guard: Option<GuardConfig>,
}

impl FlowEngineBuilder {
    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.core.sample_rate = sample_rate;
        self
    }

    /// Default: 512
    pub fn block_size(mut self, frames: usize) -> Self {
        self.core.block_size = frames;
        self
    }

    /// Default: 2
    pub fn channels(mut self, count: usize) -> Self {
        self.core.num_channels = count;
        self
    }

    /// Default: 1024
    pub fn command_capacity(mut self, slots: usize) -> Self {
        self.core.command_capacity = slots;
        self
    }

    /// Default: 60
    pub fn retrospective_seconds(mut self, seconds: f64) -> Self {
        self.core.retrospective_seconds = seconds;
        self
    }

    /// Replace the disk writer configuration. Its channel count is
    /// overridden by [`channels`](Self::channels).
    pub fn recorder_config(mut self, config: DiskWriterConfig) -> Self {
        self.recorder = config;
        self
    }

    pub fn broadcast_config(mut self, config: BroadcastConfig) -> Self {
        self.broadcast = config;
        self
    }

    /// Enable the crash guard with default thresholds, storing its files
    /// under `root`.
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.guard = Some(GuardConfig::new(root));
        self
    }

    pub fn guard_config(mut self, config: GuardConfig) -> Self {
        self.guard = Some(config);
        self
    }

    pub fn build(self) -> Result<FlowEngine> {
        let core = self.core;
        core.validate()?;
        self.broadcast.validate()?;

        // Open the guard first so a crash during the rest of startup is seen
        // by the next run.
        let guard = match self.guard {
            Some(config) => {
                let mut guard = CrashGuard::new(config)?;
                if guard.was_crashed() {
                    warn!(
                        level = %guard.safe_mode_level(),
                        "previous session ended abnormally"
                    );
                }
                guard.mark_active();
                Some(guard)
            }
            None => None,
        };

        let retrospective = Arc::new(RetrospectiveBuffer::new(core.num_channels));
        retrospective.prepare(core.sample_rate, core.retrospective_seconds);

        let recorder_config = DiskWriterConfig {
            num_channels: core.num_channels,
            ..self.recorder
        };
        let mut recorder = DiskWriter::new(recorder_config)?;
        recorder.prepare(core.sample_rate, core.block_size);
        let input = recorder.take_input().ok_or(RecorderError::InputTaken)?;

        let broadcaster = Arc::new(StateBroadcaster::new(self.broadcast));
        let commands = command_channel(core.command_capacity);

        info!(
            sample_rate = core.sample_rate,
            block_size = core.block_size,
            channels = core.num_channels,
            retrospective_frames = retrospective.capacity_frames(),
            crash_guard = guard.is_some(),
            "engine built"
        );

        Ok(FlowEngine::from_parts(
            core,
            commands,
            retrospective,
            recorder,
            input,
            broadcaster,
            guard,
        ))
    }
}
