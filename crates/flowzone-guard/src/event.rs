//! Recorded failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashSeverity {
    /// An external component (plugin) failed; the host kept running.
    Component,
    /// The audio device or driver failed.
    AudioDriver,
    /// The previous run did not exit cleanly.
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashEvent {
    pub timestamp: DateTime<Utc>,
    /// Component tag (plugin manufacturer) for component failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub severity: CrashSeverity,
    pub reason: String,
}
