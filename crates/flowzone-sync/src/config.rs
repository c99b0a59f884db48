//! Broadcaster configuration.

use crate::error::{Result, SyncError};
use std::time::Duration;

/// Patch-versus-snapshot thresholds and tick rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    /// Patches with more ops than this are replaced by a full snapshot.
    pub max_ops: usize,
    /// Patches whose serialized op list exceeds this many bytes are replaced
    /// by a full snapshot.
    pub max_patch_bytes: usize,
    /// Period of [`BroadcastTicker`](crate::BroadcastTicker).
    pub tick_interval: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_ops: 20,
            max_patch_bytes: 4096,
            tick_interval: Duration::from_secs(1) / 60,
        }
    }
}

impl BroadcastConfig {
    /// Set the tick interval from a rate in Hz.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_interval = Duration::from_secs(1) / hz.max(1);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "tick_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
