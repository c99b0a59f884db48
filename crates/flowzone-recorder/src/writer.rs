//! Tiered disk writer.
//!
//! [`DiskWriter`] is the control-thread handle: it starts and stops
//! recordings, reports the current [`Tier`] and owns the worker thread.
//! [`DiskWriterInput`] is the audio-thread half; its
//! [`write_block`](DiskWriterInput::write_block) finishes in bounded time no
//! matter how slow storage is.
//!
//! ```ignore
//! let mut writer = DiskWriter::new(DiskWriterConfig::default())?;
//! let mut input = writer.take_input().unwrap();
//! writer.prepare(48000.0, 512);
//! writer.start_recording("take.wav");
//! // audio thread:
//! input.write_block(&block);
//! ```

use crate::config::DiskWriterConfig;
use crate::emergency::emergency_path;
use crate::error::{RecorderError, Result};
use crate::ring::{OverflowBlock, RecordRing, RingWriter};
use crate::sink::SinkSpec;
use crate::tier::{AtomicTier, Tier, TierChange, TierStatus};
use crate::worker::{writer_loop, Session, Shared, WorkerTimings};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};
use flowzone_core::{AtomicFlag, AtomicFloat, AudioBuffer, Ordering};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{fence, AtomicU64};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thread_priority::ThreadPriority;
use tracing::{info, warn};

const TIER_EVENT_CAPACITY: usize = 64;
const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BLOCK_SIZE: usize = 512;

/// Audio-thread handle. Real-time safe except for the single heap copy made
/// when a block does not fit the ring.
pub struct DiskWriterInput {
    ring: RingWriter,
    shared: Arc<Shared>,
}

impl DiskWriterInput {
    /// Queue one block for persistence.
    ///
    /// Returns false if no recording is active. Never blocks and never does
    /// I/O. If the ring is full the block is copied to the heap instead,
    /// which is the only allocation this path makes.
    pub fn write_block(&mut self, block: &AudioBuffer) -> bool {
        self.shared.writing.set(true);
        // Pairs with the fence in `Shared::quiesce_input`: either the control
        // thread sees `writing`, or this load sees `recording` cleared.
        fence(Ordering::SeqCst);
        let accepted = self.shared.recording.get() && self.push(block);
        self.shared.writing.set(false);
        accepted
    }

    fn push(&mut self, block: &AudioBuffer) -> bool {
        let shared = &*self.shared;
        if block.num_frames() == 0 {
            return true;
        }

        if self.ring.try_write(block) {
            shared
                .ring_frames_written
                .fetch_add(block.num_frames() as u64, Ordering::Release);
        } else {
            let overflow = OverflowBlock::capture(
                block,
                shared.channels,
                shared.ring_frames_written.load(Ordering::Relaxed),
            );
            // Count before sending so the worker never subtracts first.
            shared
                .overflow_bytes
                .fetch_add(overflow.byte_len(), Ordering::AcqRel);
            let _ = shared.overflow_tx.send(overflow);
        }

        self.update_tier();
        shared.wake();
        true
    }

    fn update_tier(&self) {
        let shared = &*self.shared;
        let fill = self.ring.fill_ratio();
        shared.fill_percent.set(fill * 100.0);

        let current = shared.tier.load();
        if current == Tier::Critical {
            return;
        }
        let overflow = shared.overflow_bytes.load(Ordering::Acquire);
        let tier = Tier::classify(fill, overflow, &shared.limits);
        if tier == current || !shared.tier.compare_exchange(current, tier) {
            return;
        }

        if tier == Tier::Critical {
            // Export must be flagged before recording drops so the worker
            // never mistakes this for a normal stop.
            shared.emergency_requested.set(true);
            shared.recording.set(false);
        }
        let _ = shared.events_tx.try_send(TierChange {
            previous: current,
            tier,
            fill_percent: fill * 100.0,
            overflow_bytes: overflow,
        });
    }
}

/// Control-thread handle and owner of the worker thread.
pub struct DiskWriter {
    shared: Arc<Shared>,
    input: Option<DiskWriterInput>,
    config: DiskWriterConfig,
    worker: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
}

impl DiskWriter {
    /// Validate `config`, allocate the ring and spawn the worker.
    pub fn new(config: DiskWriterConfig) -> Result<Self> {
        config.validate()?;

        let (ring_writer, ring_reader) = RecordRing::new(
            config.ring_frames,
            config.num_channels,
            DEFAULT_BLOCK_SIZE * 8,
        );
        let (wake_tx, wake_rx) = bounded(1);
        let (events_tx, events_rx) = bounded(TIER_EVENT_CAPACITY);
        let (overflow_tx, overflow_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);

        let shared = Arc::new(Shared {
            channels: config.num_channels,
            limits: config.limits,
            recording: AtomicFlag::new(false),
            writing: AtomicFlag::new(false),
            shutdown: AtomicFlag::new(false),
            emergency_requested: AtomicFlag::new(false),
            tier: AtomicTier::default(),
            fill_percent: AtomicFloat::default(),
            overflow_bytes: AtomicU64::new(0),
            ring_frames_written: AtomicU64::new(0),
            wake_tx,
            events_tx,
            overflow_tx,
            session: Mutex::new(Session {
                reader: ring_reader,
                overflow_rx,
                pending: VecDeque::new(),
                output: None,
                path: None,
                sample_rate: DEFAULT_SAMPLE_RATE,
            }),
            observers: Mutex::new(Vec::new()),
        });

        let timings = WorkerTimings {
            idle_wait: config.idle_wait,
            stopped_wait: config.stopped_wait,
        };
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("flowzone-disk-writer".into())
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                writer_loop(worker_shared, wake_rx, events_rx, timings, done_tx);
            })?;

        let input = DiskWriterInput {
            ring: ring_writer,
            shared: Arc::clone(&shared),
        };

        Ok(Self {
            shared,
            input: Some(input),
            config,
            worker: Some(handle),
            done_rx,
        })
    }

    /// Hand the audio-thread half to the caller. Only the first call
    /// returns `Some`.
    pub fn take_input(&mut self) -> Option<DiskWriterInput> {
        self.input.take()
    }

    /// Write through the internal input when it has not been taken.
    pub fn write_block(&mut self, block: &AudioBuffer) -> bool {
        match self.input.as_mut() {
            Some(input) => input.write_block(block),
            None => false,
        }
    }

    /// Set the sample rate for subsequent recordings and size the worker's
    /// scratch buffer for `block_size` frames.
    pub fn prepare(&self, sample_rate: f64, block_size: usize) {
        let mut session = self.shared.session.lock();
        session.sample_rate = sample_rate.round().max(1.0) as u32;
        session
            .reader
            .resize_scratch(block_size.max(DEFAULT_BLOCK_SIZE) * 8);
    }

    /// Begin a new recording at `path`, replacing any existing file.
    /// Returns false (and logs why) on failure.
    pub fn start_recording(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_start_recording(path) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), "failed to start recording: {}", e);
                false
            }
        }
    }

    /// Like [`start_recording`](Self::start_recording) but returns the error.
    pub fn try_start_recording(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let shared = &*self.shared;
        shared.recording.set(false);
        shared.quiesce_input();

        let mut session = shared.session.lock();
        session.finish(shared);
        session.discard(shared);
        session.path = None;
        shared.emergency_requested.set(false);
        shared.tier.store(Tier::Normal);
        shared.fill_percent.set(0.0);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if path.exists() {
            fs::remove_file(path)?;
        }

        let spec = SinkSpec {
            channels: self.config.num_channels as u16,
            sample_rate: session.sample_rate,
        };
        session.output = Some(self.config.opener.open(path, spec)?);
        session.path = Some(path.to_path_buf());
        drop(session);

        shared.recording.set(true);
        shared.wake();
        info!(path = %path.display(), "recording started");
        Ok(())
    }

    /// Stop accepting blocks. The worker flushes and closes the file on its
    /// next pass. Safe to call repeatedly.
    pub fn stop_recording(&self) {
        if self.shared.recording.swap(false) {
            info!("recording stopping");
        }
        self.shared.wake();
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.get()
    }

    pub fn tier(&self) -> Tier {
        self.shared.tier.load()
    }

    pub fn overflow_bytes(&self) -> u64 {
        self.shared.overflow_bytes.load(Ordering::Acquire)
    }

    pub fn tier_status(&self) -> TierStatus {
        let tier = self.tier();
        let overflow_bytes = self.overflow_bytes();
        TierStatus {
            tier,
            buffer_fill_percent: self.shared.fill_percent.get(),
            overflow_bytes,
            message: self.shared.limits.status_message(tier, overflow_bytes),
        }
    }

    /// Register a callback for tier changes. Runs on the worker thread.
    pub fn on_tier_change<F>(&self, observer: F)
    where
        F: Fn(Tier, &str) + Send + Sync + 'static,
    {
        self.shared.observers.lock().push(Arc::new(observer));
    }

    /// Path of the current (or last) recording.
    pub fn recording_path(&self) -> Option<PathBuf> {
        self.shared.session.lock().path.clone()
    }

    /// Where an emergency export for the current recording would land.
    pub fn emergency_path(&self) -> Result<PathBuf> {
        self.recording_path()
            .map(|p| emergency_path(&p))
            .ok_or(RecorderError::NotRecording)
    }

    /// Signal the worker and wait up to the configured timeout for it to
    /// flush and exit. The worker is detached if it does not finish in time.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.recording.set(false);
        self.shared.shutdown.set(true);
        self.shared.wake();

        match self.done_rx.recv_timeout(self.config.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "disk writer worker did not stop in time; detaching"
                );
            }
        }
    }
}

impl Drop for DiskWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
