//! The crash guard state machine.

use crate::config::GuardConfig;
use crate::error::Result;
use crate::event::{CrashEvent, CrashSeverity};
use crate::journal::Journal;
use crate::level::{age, evaluate, LevelRules, SafeModeLevel};
use crate::store::{self, PersistedState};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Persisted crash detector with staged recovery.
///
/// Call [`mark_active`](Self::mark_active) at startup and
/// [`mark_clean`](Self::mark_clean) on orderly shutdown. If the process dies
/// in between, the sentinel stays on disk and the next instance reports
/// [`was_crashed`](Self::was_crashed).
///
/// All I/O is synchronous; keep it off the audio thread. Failures to write
/// the sentinel or log are logged and otherwise ignored.
pub struct CrashGuard {
    config: GuardConfig,
    sentinel: PathBuf,
    journal: Journal,
    state: PersistedState,
    crashed_previously: bool,
    active_since: Option<DateTime<Utc>>,
}

impl CrashGuard {
    /// Open the guard over `config.storage_root`, loading any sentinel left
    /// by a previous run. A sentinel that cannot be parsed still counts as
    /// an unclean exit but contributes no history.
    pub fn new(config: GuardConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage_root)?;

        let sentinel = config.sentinel_path();
        let journal = Journal::new(config.log_path());

        let (crashed_previously, state) = match store::load(&sentinel) {
            Ok(Some(state)) => (true, state),
            Ok(None) => (false, PersistedState::default()),
            Err(e) => {
                warn!(path = %sentinel.display(), "discarding unreadable crash state: {}", e);
                (true, PersistedState::default())
            }
        };
        if crashed_previously {
            warn!(
                crashes = state.crashes.len(),
                "previous session did not exit cleanly"
            );
        }

        Ok(Self {
            config,
            sentinel,
            journal,
            state,
            crashed_previously,
            active_since: None,
        })
    }

    fn now(&self) -> DateTime<Utc> {
        self.config.clock.now()
    }

    fn rules(&self) -> LevelRules {
        LevelRules {
            component_window: self.config.component_window,
            component_threshold: self.config.component_threshold,
            total_threshold: self.config.total_threshold,
        }
    }

    /// Mark the session as running. Records the prior unclean exit, if any,
    /// then writes a fresh sentinel.
    pub fn mark_active(&mut self) {
        if self.active_since.is_some() {
            return;
        }
        let now = self.now();
        if self.crashed_previously {
            let event = CrashEvent {
                timestamp: now,
                component: None,
                severity: CrashSeverity::Process,
                reason: "Unclean exit detected".into(),
            };
            warn!(severity = ?event.severity, "{}", event.reason);
            let line = format!("CRASH: {}", event.reason);
            self.push_event(event);
            self.log(now, &line);
        }
        self.active_since = Some(now);
        self.persist();
        self.log(now, "Application started");
    }

    /// Orderly shutdown. Wipes the history if the session ran for at least
    /// `clean_run`; always removes the sentinel.
    pub fn mark_clean(&mut self) {
        let now = self.now();
        if let Some(since) = self.active_since.take() {
            if age(now, since) >= self.config.clean_run {
                self.state.clear();
            }
        }
        if let Err(e) = store::remove(&self.sentinel) {
            warn!(path = %self.sentinel.display(), "failed to remove sentinel: {}", e);
        }
        self.crashed_previously = false;
        self.log(now, "Application exited cleanly");
        info!("crash guard marked clean");
    }

    /// A plugin crashed. The manufacturer is the component tag.
    pub fn record_plugin_crash(&mut self, manufacturer: &str, plugin: &str) {
        self.record_component_failure(
            manufacturer,
            &format!("Plugin crash: {} - {}", manufacturer, plugin),
        );
    }

    /// Any failure attributable to an external component.
    pub fn record_component_failure(&mut self, component: &str, reason: &str) {
        let now = self.now();
        self.state
            .component_failures
            .entry(component.to_string())
            .or_default()
            .push(now);
        self.record(CrashEvent {
            timestamp: now,
            component: Some(component.to_string()),
            severity: CrashSeverity::Component,
            reason: reason.to_string(),
        });
    }

    pub fn record_audio_failure(&mut self, driver: &str) {
        let now = self.now();
        self.record(CrashEvent {
            timestamp: now,
            component: None,
            severity: CrashSeverity::AudioDriver,
            reason: format!("Audio driver failure: {}", driver),
        });
    }

    fn record(&mut self, event: CrashEvent) {
        warn!(severity = ?event.severity, "{}", event.reason);
        let at = event.timestamp;
        let line = format!("CRASH: {}", event.reason);
        self.push_event(event);
        self.purge();
        self.persist();
        self.log(at, &line);
    }

    fn push_event(&mut self, event: CrashEvent) {
        self.state.crashes.push(event);
        let excess = self
            .state
            .crashes
            .len()
            .saturating_sub(self.config.max_history);
        self.state.crashes.drain(..excess);
    }

    fn purge(&mut self) {
        let now = self.now();
        let retention = self.config.retention;
        self.state
            .crashes
            .retain(|c| age(now, c.timestamp) <= retention);
        self.state.component_failures.retain(|_, times| {
            times.retain(|&t| age(now, t) <= retention);
            !times.is_empty()
        });
    }

    /// Purge expired events and return the highest applicable level.
    pub fn safe_mode_level(&mut self) -> SafeModeLevel {
        self.purge();
        evaluate(
            &self.state.crashes,
            &self.state.component_failures,
            self.now(),
            &self.rules(),
        )
    }

    pub fn should_disable_plugins(&mut self) -> bool {
        self.safe_mode_level() >= SafeModeLevel::DisablePlugins
    }

    pub fn should_reset_audio(&mut self) -> bool {
        self.safe_mode_level() >= SafeModeLevel::ResetAudio
    }

    pub fn should_offer_factory_defaults(&mut self) -> bool {
        self.safe_mode_level() == SafeModeLevel::FactoryDefaults
    }

    pub fn safe_mode_description(&mut self) -> &'static str {
        self.safe_mode_level().description()
    }

    /// True if the sentinel was present when this instance started.
    pub fn was_crashed(&self) -> bool {
        self.crashed_previously
    }

    /// Events younger than `max_age`, oldest first.
    pub fn recent_crashes(&mut self, max_age: Duration) -> Vec<CrashEvent> {
        self.purge();
        let now = self.now();
        self.state
            .crashes
            .iter()
            .filter(|c| age(now, c.timestamp) < max_age)
            .cloned()
            .collect()
    }

    /// Forget everything, including the unclean-exit flag.
    pub fn clear_crash_history(&mut self) {
        self.state.clear();
        self.crashed_previously = false;
        if self.active_since.is_some() {
            self.persist();
        } else if let Err(e) = store::remove(&self.sentinel) {
            warn!(path = %self.sentinel.display(), "failed to remove sentinel: {}", e);
        }
        let now = self.now();
        self.log(now, "Crash history cleared");
    }

    pub fn sentinel_path(&self) -> &Path {
        &self.sentinel
    }

    pub fn log_path(&self) -> &Path {
        self.journal.path()
    }

    fn persist(&self) {
        if let Err(e) = store::save(&self.sentinel, &self.state) {
            warn!(path = %self.sentinel.display(), "failed to write sentinel: {}", e);
        }
    }

    fn log(&self, at: DateTime<Utc>, message: &str) {
        if let Err(e) = self.journal.append(at, message) {
            warn!(path = %self.journal.path().display(), "failed to append crash log: {}", e);
        }
    }
}
