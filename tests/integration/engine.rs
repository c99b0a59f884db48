//! Engine lifecycle integration tests
//!
//! Builder validation, the command channel across the engine boundary and
//! retrospective capture fed by the audio processor.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use approx::assert_relative_eq;
use flowzone::prelude::*;
use flowzone::{Error, WAVEFORM_POINTS};

#[test]
fn test_invalid_config_is_rejected() {
    let result = FlowEngine::builder().sample_rate(0.0).build();
    assert!(matches!(result, Err(Error::Core(_))));

    let result = FlowEngine::builder().block_size(0).build();
    assert!(matches!(result, Err(Error::Core(_))));
}

#[test]
fn test_engine_without_storage_root_has_no_guard() {
    let engine = FlowEngine::builder().build().unwrap();
    assert!(engine.crash_guard().is_none());
    assert_eq!(engine.safe_mode_level(), SafeModeLevel::None);
    assert_eq!(engine.sample_rate(), 48000.0);
}

#[test]
fn test_take_processor_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    assert!(engine.take_processor().is_some());
    assert!(engine.take_processor().is_none());
}

#[test]
fn test_commands_applied_in_order_before_block() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();

    assert!(engine.send_command(r#"{"cmd":"PLAY"}"#));
    assert!(engine.send_command(r#"{"cmd":"SET_TEMPO","bpm":128}"#));
    assert!(engine.send_command(r#"{"cmd":"STOP"}"#));
    assert_eq!(processor.pending_commands(), 3);

    let mut applied = Vec::new();
    let block = staircase_block(0, TEST_BLOCK_SIZE);
    let report = processor.process(&block, |cmd| applied.push(cmd.as_str().to_string()));

    assert_eq!(report.commands_applied, 3);
    assert!(!report.recorded);
    assert_eq!(
        applied,
        vec![
            r#"{"cmd":"PLAY"}"#,
            r#"{"cmd":"SET_TEMPO","bpm":128}"#,
            r#"{"cmd":"STOP"}"#,
        ]
    );

    let tempo = CommandEnvelope::parse(&applied[1]).unwrap();
    assert_eq!(tempo.cmd, "SET_TEMPO");
    assert_eq!(tempo.get_f64("bpm"), Some(128.0));

    let report = processor.process(&block, |_| {});
    assert_eq!(report.commands_applied, 0);
}

#[test]
fn test_command_channel_capacity() {
    let engine = FlowEngine::builder().command_capacity(4).build().unwrap();
    let _processor = engine.take_processor().unwrap();

    for i in 0..4 {
        assert!(engine.send_command(&format!(r#"{{"cmd":"NOP","i":{i}}}"#)));
    }
    assert_eq!(engine.free_command_slots(), 0);
    assert!(!engine.send_command(r#"{"cmd":"DROPPED"}"#));
}

#[test]
fn test_oversized_command_is_rejected() {
    let engine = FlowEngine::builder().build().unwrap();
    let mut processor = engine.take_processor().unwrap();
    let long = "x".repeat(flowzone::MAX_COMMAND_BYTES + 1);
    assert!(!engine.send_command(&long));
    assert!(engine.send_command(&"y".repeat(flowzone::MAX_COMMAND_BYTES)));

    let mut lengths = Vec::new();
    processor.process(&AudioBuffer::new(2, 0), |cmd| lengths.push(cmd.len()));
    assert_eq!(lengths, vec![flowzone::MAX_COMMAND_BYTES]);
}

#[test]
fn test_retrospective_capture_from_processed_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();

    for i in 0..4 {
        processor.process(&staircase_block(i * TEST_BLOCK_SIZE, TEST_BLOCK_SIZE), |_| {});
    }

    let mut out = AudioBuffer::new(2, 0);
    assert!(engine.capture_loop(0, 4 * TEST_BLOCK_SIZE, &mut out));
    assert_eq!(out.num_frames(), 4 * TEST_BLOCK_SIZE);
    assert_staircase_valid(out.channel(0), 0, FLOAT_EPSILON);

    // The third block, one block back from the newest.
    assert!(engine.capture_loop(TEST_BLOCK_SIZE, TEST_BLOCK_SIZE, &mut out));
    assert_staircase_valid(out.channel(0), 2 * TEST_BLOCK_SIZE, FLOAT_EPSILON);
    assert_relative_eq!(out.channel(1)[0], -((2 * TEST_BLOCK_SIZE) as f32));
}

#[test]
fn test_capture_bars_pads_unwritten_history_with_silence() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();

    let blocks = 10;
    for i in 0..blocks {
        processor.process(&staircase_block(i * TEST_BLOCK_SIZE, TEST_BLOCK_SIZE), |_| {});
    }

    // One bar at 120 BPM is two seconds.
    let mut out = AudioBuffer::new(2, 0);
    assert!(engine.capture_bars(1, 120.0, &mut out));
    assert_eq!(out.num_frames(), 96000);

    let written = blocks * TEST_BLOCK_SIZE;
    let left = out.channel(0);
    assert!(is_silent(&left[..96000 - written], 0.0));
    assert_staircase_valid(&left[96000 - written..], 0, FLOAT_EPSILON);

    assert!(!engine.capture_bars(1, 0.0, &mut out));
}

#[test]
fn test_refresh_state_reports_looper_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();

    let sine = generate_sine(440.0, TEST_SAMPLE_RATE, TEST_BLOCK_SIZE);
    processor.process(&AudioBuffer::from_channels(vec![sine.clone(), sine]), |_| {});

    let mut state = AppState::default();
    engine.refresh_state(&mut state);
    assert!(state.looper.input_level > 0.9);
    assert_eq!(state.looper.waveform_data.len(), WAVEFORM_POINTS);
    assert!(state.looper.waveform_data.last().copied().unwrap_or(0.0) > 0.0);
    assert_eq!(state.settings.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(state.settings.buffer_size, TEST_BLOCK_SIZE as u32);
    assert_eq!(state.system.disk_buffer_usage, 0.0);
}
