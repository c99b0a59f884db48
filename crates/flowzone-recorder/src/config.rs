//! Disk writer configuration.

use crate::error::{RecorderError, Result};
use crate::sink::{OutputOpener, WavOpener};
use crate::tier::TierLimits;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for [`DiskWriter`](crate::DiskWriter).
#[derive(Clone)]
pub struct DiskWriterConfig {
    pub num_channels: usize,
    /// Ring buffer size in frames (10 s at 48 kHz by default).
    pub ring_frames: usize,
    pub limits: TierLimits,
    /// Worker sleep between drains while recording.
    pub idle_wait: Duration,
    /// Worker sleep while not recording.
    pub stopped_wait: Duration,
    /// How long `Drop` waits for the worker before detaching it.
    pub shutdown_timeout: Duration,
    /// Opens the primary output file for each recording.
    pub opener: Arc<dyn OutputOpener>,
}

impl Default for DiskWriterConfig {
    fn default() -> Self {
        Self {
            num_channels: 2,
            ring_frames: 48000 * 10,
            limits: TierLimits::default(),
            idle_wait: Duration::from_millis(10),
            stopped_wait: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(4),
            opener: Arc::new(WavOpener),
        }
    }
}

impl fmt::Debug for DiskWriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskWriterConfig")
            .field("num_channels", &self.num_channels)
            .field("ring_frames", &self.ring_frames)
            .field("limits", &self.limits)
            .field("idle_wait", &self.idle_wait)
            .field("stopped_wait", &self.stopped_wait)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl DiskWriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_channels == 0 || self.num_channels > u16::MAX as usize {
            return Err(RecorderError::InvalidConfig(format!(
                "num_channels {} out of range",
                self.num_channels
            )));
        }
        if self.ring_frames == 0 {
            return Err(RecorderError::InvalidConfig(
                "ring_frames must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.limits.warning_ratio) {
            return Err(RecorderError::InvalidConfig(format!(
                "warning_ratio {} must be within 0.0-1.0",
                self.limits.warning_ratio
            )));
        }
        Ok(())
    }

    pub fn with_opener(mut self, opener: Arc<dyn OutputOpener>) -> Self {
        self.opener = opener;
        self
    }
}
