//! Safe-mode levels and how they are derived from crash history.

use crate::event::{CrashEvent, CrashSeverity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Escalating recovery measures, consulted at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SafeModeLevel {
    #[default]
    None,
    /// Load no third-party plugins.
    DisablePlugins,
    /// Reset the audio device configuration (and keep plugins off).
    ResetAudio,
    /// Offer to restore factory defaults.
    FactoryDefaults,
}

impl SafeModeLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            SafeModeLevel::None => 0,
            SafeModeLevel::DisablePlugins => 1,
            SafeModeLevel::ResetAudio => 2,
            SafeModeLevel::FactoryDefaults => 3,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SafeModeLevel::None => "Normal operation",
            SafeModeLevel::DisablePlugins => {
                "Level 1: Plugins disabled after repeated plugin crashes"
            }
            SafeModeLevel::ResetAudio => {
                "Level 2: Audio device reset after an audio driver failure"
            }
            SafeModeLevel::FactoryDefaults => {
                "Level 3: Factory defaults offered after repeated failures"
            }
        }
    }
}

impl fmt::Display for SafeModeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Thresholds for [`evaluate`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelRules {
    pub(crate) component_window: Duration,
    pub(crate) component_threshold: usize,
    pub(crate) total_threshold: usize,
}

#[inline]
pub(crate) fn age(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

/// Highest applicable level for an already-purged history.
///
/// Level 3 needs `total_threshold` failures that are not just one
/// component's burst; a burst that on its own meets the level 1 rule stays
/// at level 1.
pub(crate) fn evaluate(
    crashes: &[CrashEvent],
    component_failures: &BTreeMap<String, Vec<DateTime<Utc>>>,
    now: DateTime<Utc>,
    rules: &LevelRules,
) -> SafeModeLevel {
    let bursting: Vec<&str> = component_failures
        .iter()
        .filter(|(_, times)| {
            times
                .iter()
                .filter(|&&t| age(now, t) < rules.component_window)
                .count()
                >= rules.component_threshold
        })
        .map(|(name, _)| name.as_str())
        .collect();

    if crashes.len() >= rules.total_threshold {
        let single_burst = match crashes.first().and_then(|c| c.component.as_deref()) {
            Some(first) => {
                bursting.contains(&first)
                    && crashes
                        .iter()
                        .all(|c| c.component.as_deref() == Some(first))
            }
            None => false,
        };
        if !single_burst {
            return SafeModeLevel::FactoryDefaults;
        }
    }

    if crashes
        .iter()
        .any(|c| c.severity == CrashSeverity::AudioDriver)
    {
        return SafeModeLevel::ResetAudio;
    }

    if !bursting.is_empty() {
        return SafeModeLevel::DisablePlugins;
    }

    SafeModeLevel::None
}
