//! Engine-wide configuration.

use crate::{Error, Result};

/// Configuration for the real-time core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub sample_rate: f64,
    /// Maximum frames per audio callback.
    pub block_size: usize,
    pub num_channels: usize,
    /// Slots in the control-to-audio command channel.
    pub command_capacity: usize,
    /// Seconds of history kept by the retrospective buffer.
    pub retrospective_seconds: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 512,
            num_channels: 2,
            command_capacity: crate::DEFAULT_COMMAND_CAPACITY,
            retrospective_seconds: 60.0,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > 16384 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} out of range (1-16384)",
                self.block_size
            )));
        }
        if self.num_channels == 0 {
            return Err(Error::InvalidConfig("num_channels must be at least 1".into()));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig(
                "command_capacity must be at least 1".into(),
            ));
        }
        if self.retrospective_seconds.is_nan() || self.retrospective_seconds <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "retrospective_seconds {} must be positive",
                self.retrospective_seconds
            )));
        }
        Ok(())
    }
}
