//! Recording integration tests
//!
//! Takes written through the audio processor, read back with hound.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use flowzone::prelude::*;
use flowzone::recorder::{AudioSink, OutputOpener, RecorderError, SinkSpec};
use flowzone::{DiskWriterConfig, Error, TierLimits};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_take_is_written_as_float_wav_in_capture_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();
    let path = dir.path().join("session").join("take.wav");

    assert!(engine.start_recording(&path));
    assert!(engine.is_recording());
    assert_eq!(engine.tier_status().message, "Recording OK");

    let blocks = 20;
    for i in 0..blocks {
        let report = processor.process(&staircase_block(i * TEST_BLOCK_SIZE, TEST_BLOCK_SIZE), |_| {});
        assert!(report.recorded);
    }
    assert_eq!(engine.recording_tier(), Tier::Normal);

    engine.shutdown();

    let (channels, sample_rate) = load_wav_file(&path).unwrap();
    assert_eq!(sample_rate, 48000);
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].len(), blocks * TEST_BLOCK_SIZE);
    assert_staircase_valid(&channels[0], 0, FLOAT_EPSILON);
    assert!(channels[1]
        .iter()
        .zip(&channels[0])
        .all(|(r, l)| (r + l).abs() <= FLOAT_EPSILON));
}

#[test]
fn test_stop_recording_finalizes_and_rejects_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();
    let path = dir.path().join("take.wav");

    assert!(engine.start_recording(&path));
    for i in 0..4 {
        processor.process(&staircase_block(i * TEST_BLOCK_SIZE, TEST_BLOCK_SIZE), |_| {});
    }
    engine.stop_recording();
    engine.stop_recording();
    assert!(!engine.is_recording());

    let report = processor.process(&staircase_block(0, TEST_BLOCK_SIZE), |_| {});
    assert!(!report.recorded);

    let expected = 4 * TEST_BLOCK_SIZE;
    assert!(wait_for(Duration::from_secs(5), || {
        load_wav_file(&path)
            .map(|(channels, _)| channels[0].len() == expected)
            .unwrap_or(false)
    }));
    let (channels, _) = load_wav_file(&path).unwrap();
    assert_staircase_valid(&channels[0], 0, FLOAT_EPSILON);
}

#[test]
fn test_start_recording_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let mut processor = engine.take_processor().unwrap();
    let path = dir.path().join("take.wav");
    std::fs::write(&path, b"stale bytes from an older take").unwrap();

    assert!(engine.start_recording(&path));
    processor.process(&staircase_block(0, TEST_BLOCK_SIZE), |_| {});
    engine.shutdown();

    let (channels, _) = load_wav_file(&path).unwrap();
    assert_eq!(channels[0].len(), TEST_BLOCK_SIZE);
}

#[test]
fn test_start_recording_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path());
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let path = blocker.join("take.wav");

    assert!(!engine.start_recording(&path));
    assert!(!engine.is_recording());
    assert!(matches!(
        engine.try_start_recording(&path),
        Err(Error::Recorder(_))
    ));
}

/// In-memory sink that parks the worker inside `write_interleaved` until
/// released, standing in for a stalled disk.
#[derive(Clone, Default)]
struct StalledDisk {
    released: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<f32>>>,
}

struct StalledSink(StalledDisk);

impl AudioSink for StalledSink {
    fn write_interleaved(&mut self, samples: &[f32]) -> Result<(), RecorderError> {
        self.0.stalled.store(true, Ordering::SeqCst);
        while !self.0.released.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        self.0.written.lock().extend_from_slice(samples);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), RecorderError> {
        Ok(())
    }
}

impl OutputOpener for StalledDisk {
    fn open(&self, _path: &Path, _spec: SinkSpec) -> Result<Box<dyn AudioSink>, RecorderError> {
        Ok(Box::new(StalledSink(self.clone())))
    }
}

#[test]
fn test_stalled_disk_escalates_to_critical() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let disk = StalledDisk::default();
    let engine = FlowEngine::builder()
        .block_size(TEST_BLOCK_SIZE)
        .recorder_config(
            DiskWriterConfig {
                ring_frames: 4 * TEST_BLOCK_SIZE,
                limits: TierLimits {
                    warning_ratio: 0.8,
                    overflow_ceiling_bytes: 4 * (TEST_BLOCK_SIZE as u64) * 2 * 4,
                },
                idle_wait: Duration::from_millis(1),
                ..DiskWriterConfig::default()
            }
            .with_opener(Arc::new(disk.clone())),
        )
        .storage_root(dir.path())
        .build()
        .unwrap();
    let mut processor = engine.take_processor().unwrap();

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    engine
        .recorder()
        .on_tier_change(move |tier, _reason| sink.lock().push(tier));

    let path = dir.path().join("take.wav");
    assert!(engine.start_recording(&path));
    processor.process(&staircase_block(0, TEST_BLOCK_SIZE), |_| {});
    assert!(wait_for(Duration::from_secs(5), || disk
        .stalled
        .load(Ordering::SeqCst)));

    let mut tiers = vec![engine.recording_tier()];
    let mut index = 1;
    while processor
        .process(&staircase_block(index * TEST_BLOCK_SIZE, TEST_BLOCK_SIZE), |_| {})
        .recorded
    {
        tiers.push(engine.recording_tier());
        index += 1;
        assert!(index < 64, "never reached critical");
    }

    assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "{:?}", tiers);
    assert!(tiers.contains(&Tier::Overflow));
    assert_eq!(engine.recording_tier(), Tier::Critical);
    assert!(!engine.is_recording());
    let status = engine.tier_status();
    assert_eq!(status.message, "CRITICAL: Recording stopped");

    // Audio keeps flowing into the retrospective buffer regardless.
    let mut out = AudioBuffer::new(2, 0);
    assert!(engine.capture_loop(0, TEST_BLOCK_SIZE, &mut out));
    assert_staircase_valid(out.channel(0), index * TEST_BLOCK_SIZE, FLOAT_EPSILON);

    disk.released.store(true, Ordering::SeqCst);
    assert!(wait_for(Duration::from_secs(5), || changes
        .lock()
        .contains(&Tier::Critical)));

    #[cfg(feature = "flac")]
    {
        let emergency = dir.path().join("take.emergency.flac");
        assert_eq!(engine.recorder().emergency_path().unwrap(), emergency);
        assert!(wait_for(Duration::from_secs(10), || emergency.exists()));
    }
}
