//! Crash recovery integration tests
//!
//! The crash guard across engine restarts sharing one storage root.

use crate::helpers::*;
use flowzone::guard::{LOG_FILE_NAME, SENTINEL_FILE_NAME};
use flowzone::prelude::*;
use flowzone::{CrashSeverity, GuardConfig};
use std::time::Duration;

#[test]
fn test_clean_shutdown_removes_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    assert!(dir.path().join(SENTINEL_FILE_NAME).exists());
    assert!(!engine.crash_guard().unwrap().was_crashed());

    engine.shutdown();
    assert!(!dir.path().join(SENTINEL_FILE_NAME).exists());

    let engine = test_engine(dir.path());
    assert!(!engine.crash_guard().unwrap().was_crashed());
    assert_eq!(engine.safe_mode_level(), SafeModeLevel::None);
}

#[test]
fn test_dropped_engine_is_reported_as_crash() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = test_engine(dir.path());
        engine
            .crash_guard()
            .unwrap()
            .record_plugin_crash("Acme", "Verb");
        // Dropped without shutdown.
    }

    let engine = test_engine(dir.path());
    let mut guard = engine.crash_guard().unwrap();
    assert!(guard.was_crashed());
    let recent = guard.recent_crashes(Duration::from_secs(60));
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].reason, "Plugin crash: Acme - Verb");
    assert_eq!(recent[1].severity, CrashSeverity::Process);
}

#[test]
fn test_repeated_crashes_escalate_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    for _ in 0..3 {
        let _engine = test_engine(dir.path());
    }
    // Two unclean exits recorded by the second and third start, then one
    // more by this one.
    let engine = test_engine(dir.path());
    assert_eq!(engine.safe_mode_level(), SafeModeLevel::FactoryDefaults);
    assert!(engine.crash_guard().unwrap().should_offer_factory_defaults());
}

#[test]
fn test_audio_failure_persists_level_two() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = test_engine(dir.path());
        engine
            .crash_guard()
            .unwrap()
            .record_audio_failure("CoreAudio");
        assert_eq!(engine.safe_mode_level(), SafeModeLevel::ResetAudio);
        engine.shutdown();
    }

    // A short session keeps its history through a clean exit.
    let engine = test_engine(dir.path());
    assert_eq!(engine.safe_mode_level(), SafeModeLevel::ResetAudio);
    let mut guard = engine.crash_guard().unwrap();
    assert!(guard.should_reset_audio());
    assert!(guard.safe_mode_description().contains("Level 2"));
}

#[test]
fn test_custom_guard_config_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = GuardConfig {
        component_threshold: 2,
        ..GuardConfig::new(dir.path())
    };
    let engine = FlowEngine::builder().guard_config(config).build().unwrap();
    {
        let mut guard = engine.crash_guard().unwrap();
        guard.record_plugin_crash("Acme", "Verb");
        guard.record_plugin_crash("Acme", "Verb");
    }
    assert_eq!(engine.safe_mode_level(), SafeModeLevel::DisablePlugins);
    engine.shutdown();

    let log = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("| Application started"));
    assert!(lines[1].ends_with("| CRASH: Plugin crash: Acme - Verb"));
    assert!(lines[3].ends_with("| Application exited cleanly"));
}
