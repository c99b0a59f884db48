//! Crash guard configuration and time source.

use crate::error::{GuardError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const SENTINEL_FILE_NAME: &str = "crash_guard_sentinel.json";
pub const LOG_FILE_NAME: &str = "crash_guard.log";

/// Wall-clock source. Injected so the time windows can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts at the current system time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        *self.now.lock() += delta;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Configuration for [`CrashGuard`](crate::CrashGuard).
#[derive(Clone)]
pub struct GuardConfig {
    /// Directory holding the sentinel and the log. Created if missing.
    pub storage_root: PathBuf,
    /// Crash events older than this are forgotten.
    pub retention: Duration,
    /// Window for counting failures of one component.
    pub component_window: Duration,
    /// Failures of one component within `component_window` for level 1.
    pub component_threshold: usize,
    /// Failures of any kind within `retention` for level 3.
    pub total_threshold: usize,
    pub max_history: usize,
    /// Uptime after which a clean exit wipes the crash history.
    pub clean_run: Duration,
    pub clock: Arc<dyn Clock>,
}

impl GuardConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            retention: Duration::from_secs(5 * 60),
            component_window: Duration::from_secs(60),
            component_threshold: 3,
            total_threshold: 3,
            max_history: 10,
            clean_run: Duration::from_secs(60),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sentinel_path(&self) -> PathBuf {
        self.storage_root.join(SENTINEL_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.storage_root.join(LOG_FILE_NAME)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(GuardError::InvalidConfig(
                "storage_root must not be empty".into(),
            ));
        }
        if self.component_threshold == 0 || self.total_threshold == 0 {
            return Err(GuardError::InvalidConfig(
                "thresholds must be at least 1".into(),
            ));
        }
        if self.max_history < self.total_threshold {
            return Err(GuardError::InvalidConfig(format!(
                "max_history {} cannot hold total_threshold {} events",
                self.max_history, self.total_threshold
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("storage_root", &self.storage_root)
            .field("retention", &self.retention)
            .field("component_window", &self.component_window)
            .field("component_threshold", &self.component_threshold)
            .field("total_threshold", &self.total_threshold)
            .field("max_history", &self.max_history)
            .field("clean_run", &self.clean_run)
            .finish_non_exhaustive()
    }
}
