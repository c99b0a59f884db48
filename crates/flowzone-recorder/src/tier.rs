//! Degradation tiers of the disk writer.

use flowzone_core::Ordering;
use std::fmt;
use std::sync::atomic::AtomicU8;

/// Backpressure level, ordered from healthy to terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Tier {
    /// Ring buffer fill at or below the warning ratio.
    #[default]
    Normal = 0,
    /// Ring buffer above the warning ratio, nothing spilled yet.
    Warning = 1,
    /// Blocks are being held on the heap because the ring is full.
    Overflow = 2,
    /// Heap backlog exceeded its ceiling. Recording has stopped.
    Critical = 3,
}

impl Tier {
    /// Tier for the given ring fill (0.0-1.0) and overflow backlog.
    pub fn classify(fill_ratio: f32, overflow_bytes: u64, limits: &TierLimits) -> Self {
        if overflow_bytes > limits.overflow_ceiling_bytes {
            Tier::Critical
        } else if overflow_bytes > 0 {
            Tier::Overflow
        } else if fill_ratio > limits.warning_ratio {
            Tier::Warning
        } else {
            Tier::Normal
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::Normal => "Normal",
            Tier::Warning => "Warning",
            Tier::Overflow => "Overflow",
            Tier::Critical => "Critical",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Tier::Normal,
            1 => Tier::Warning,
            2 => Tier::Overflow,
            _ => Tier::Critical,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Thresholds that drive [`Tier::classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierLimits {
    pub warning_ratio: f32,
    pub overflow_ceiling_bytes: u64,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            warning_ratio: 0.8,
            overflow_ceiling_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl TierLimits {
    /// Human-readable status line for a tier.
    pub fn status_message(&self, tier: Tier, overflow_bytes: u64) -> String {
        match tier {
            Tier::Normal => "Recording OK".to_string(),
            Tier::Warning => format!(
                "Buffer warning (>{:.0}% full)",
                self.warning_ratio * 100.0
            ),
            Tier::Overflow => format!("Overflow: {:.1} MB used", bytes_to_mb(overflow_bytes)),
            Tier::Critical => "CRITICAL: Recording stopped".to_string(),
        }
    }
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Snapshot returned by `DiskWriter::tier_status`.
#[derive(Debug, Clone, PartialEq)]
pub struct TierStatus {
    pub tier: Tier,
    /// Ring buffer fill, 0-100.
    pub buffer_fill_percent: f32,
    pub overflow_bytes: u64,
    pub message: String,
}

/// A tier transition, queued from the audio thread and delivered to
/// observers by the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierChange {
    pub previous: Tier,
    pub tier: Tier,
    pub fill_percent: f32,
    pub overflow_bytes: u64,
}

/// Tier stored as a `u8`.
#[derive(Debug, Default)]
pub(crate) struct AtomicTier(AtomicU8);

impl AtomicTier {
    #[inline]
    pub(crate) fn load(&self) -> Tier {
        Tier::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, tier: Tier) {
        self.0.store(tier as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn compare_exchange(&self, current: Tier, new: Tier) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
