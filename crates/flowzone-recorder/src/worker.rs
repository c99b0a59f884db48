//! Disk writer worker thread.
//!
//! The worker owns all storage I/O. Each pass it delivers queued tier
//! changes, runs an emergency export if one was requested, then either
//! drains buffered audio into the open output or, once recording has
//! stopped, flushes the remainder and closes it.

use crate::emergency::{emergency_path, write_emergency_stream, FrameFeed};
use crate::error::Result;
use crate::ring::{OverflowBlock, RingReader};
use crate::sink::AudioSink;
use crate::tier::{bytes_to_mb, AtomicTier, Tier, TierChange, TierLimits};
use crossbeam_channel::{Receiver, Sender};
use flowzone_core::{AtomicFlag, AtomicFloat, Ordering};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{fence, AtomicU64};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub(crate) type TierObserver = Arc<dyn Fn(Tier, &str) + Send + Sync>;

/// State shared by the audio-thread input, the control handle and the worker.
pub(crate) struct Shared {
    pub(crate) channels: usize,
    pub(crate) limits: TierLimits,
    pub(crate) recording: AtomicFlag,
    /// Set by the audio thread for the duration of each `write_block`.
    pub(crate) writing: AtomicFlag,
    pub(crate) shutdown: AtomicFlag,
    pub(crate) emergency_requested: AtomicFlag,
    pub(crate) tier: AtomicTier,
    pub(crate) fill_percent: AtomicFloat,
    pub(crate) overflow_bytes: AtomicU64,
    /// Frames pushed into the ring since it was created. Written only by
    /// the audio thread.
    pub(crate) ring_frames_written: AtomicU64,
    pub(crate) wake_tx: Sender<()>,
    pub(crate) events_tx: Sender<TierChange>,
    pub(crate) overflow_tx: Sender<OverflowBlock>,
    /// Worker-side housekeeping only; never locked from the audio thread.
    pub(crate) session: Mutex<Session>,
    pub(crate) observers: Mutex<Vec<TierObserver>>,
}

impl Shared {
    pub(crate) fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Observers run on a copy of the list, so they may register more.
    pub(crate) fn notify(&self, tier: Tier, reason: &str) {
        let observers: Vec<TierObserver> = self.observers.lock().clone();
        for observer in &observers {
            observer(tier, reason);
        }
    }

    /// Wait out any `write_block` that saw `recording` still set. Call
    /// after clearing `recording`; afterwards nothing more reaches the ring
    /// or the overflow queue until recording is set again.
    pub(crate) fn quiesce_input(&self) {
        // Pairs with the fence in `DiskWriterInput::write_block`.
        fence(Ordering::SeqCst);
        while self.writing.get() {
            thread::yield_now();
        }
    }
}

pub(crate) struct Session {
    pub(crate) reader: RingReader,
    pub(crate) overflow_rx: Receiver<OverflowBlock>,
    pub(crate) pending: VecDeque<OverflowBlock>,
    pub(crate) output: Option<Box<dyn AudioSink>>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) sample_rate: u32,
}

impl Session {
    fn pull_overflow(&mut self) {
        while let Ok(block) = self.overflow_rx.try_recv() {
            self.pending.push_back(block);
        }
    }

    /// Drop all buffered audio and overflow blocks.
    pub(crate) fn discard(&mut self, shared: &Shared) {
        self.pull_overflow();
        self.pending.clear();
        self.reader
            .discard(shared.ring_frames_written.load(Ordering::Acquire));
        shared.overflow_bytes.store(0, Ordering::Release);
    }

    /// Write buffered audio in capture order: each overflow block goes out
    /// right after the ring frames that preceded it.
    fn drain(&mut self, shared: &Shared) -> Result<()> {
        // Snapshot before pulling blocks so no ring frame captured after an
        // unseen overflow block gets written ahead of it.
        let limit = shared.ring_frames_written.load(Ordering::Acquire);
        self.pull_overflow();

        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };

        while let Some(block) = self.pending.front() {
            let position = block.ring_position;
            self.reader
                .read_until(position.min(limit), |chunk| output.write_interleaved(chunk))?;
            if self.reader.frames_read < position {
                return Ok(());
            }
            if let Some(block) = self.pending.pop_front() {
                output.write_interleaved(&block.samples)?;
                shared
                    .overflow_bytes
                    .fetch_sub(block.byte_len(), Ordering::AcqRel);
            }
        }

        self.reader
            .read_until(limit, |chunk| output.write_interleaved(chunk))
    }

    /// Flush everything left and close the output.
    pub(crate) fn finish(&mut self, shared: &Shared) {
        let flushed = self.drain(shared);
        let Some(output) = self.output.take() else {
            return;
        };
        let finalized = output.finalize();
        match flushed.and(finalized) {
            Ok(()) => info!(path = ?self.path, "recording closed"),
            Err(e) => error!(path = ?self.path, "failed to close recording: {}", e),
        }
    }
}

/// Hands the remaining backlog to the emergency encoder in capture order.
/// Each overflow block is released, and its bytes uncounted, as soon as it
/// has been consumed.
struct BacklogFeed<'a> {
    session: &'a mut Session,
    shared: &'a Shared,
    limit: u64,
    current: Option<(OverflowBlock, usize)>,
    frames: usize,
}

impl<'a> BacklogFeed<'a> {
    /// `limit` must be read before the overflow queue was last pulled.
    fn new(session: &'a mut Session, shared: &'a Shared, limit: u64) -> Self {
        Self {
            session,
            shared,
            limit,
            current: None,
            frames: 0,
        }
    }
}

impl FrameFeed for BacklogFeed<'_> {
    fn pull(&mut self, max_frames: usize, out: &mut Vec<f32>) -> usize {
        let channels = self.shared.channels;
        let start = out.len();
        let wanted = max_frames * channels;

        while out.len() - start < wanted {
            let room = (wanted - (out.len() - start)) / channels;

            if let Some((block, offset)) = self.current.as_mut() {
                let take = (room * channels).min(block.samples.len() - *offset);
                out.extend_from_slice(&block.samples[*offset..*offset + take]);
                *offset += take;
                let finished = *offset == block.samples.len();
                if finished {
                    if let Some((block, _)) = self.current.take() {
                        self.shared
                            .overflow_bytes
                            .fetch_sub(block.byte_len(), Ordering::AcqRel);
                    }
                }
                continue;
            }

            // Ring frames captured before the next block go first.
            let target = match self.session.pending.front() {
                Some(block) => block.ring_position.min(self.limit),
                None => self.limit,
            };
            let before = self.session.reader.frames_read;
            if before < target {
                let upto = target.min(before + room as u64);
                let _ = self.session.reader.read_until(upto, |chunk| {
                    out.extend_from_slice(chunk);
                    Ok(())
                });
                if self.session.reader.frames_read > before {
                    continue;
                }
            }

            match self.session.pending.pop_front() {
                Some(block) => self.current = Some((block, 0)),
                None => break,
            }
        }

        let frames = (out.len() - start) / channels;
        self.frames += frames;
        frames
    }
}

pub(crate) struct WorkerTimings {
    pub(crate) idle_wait: Duration,
    pub(crate) stopped_wait: Duration,
}

/// Worker main loop. Returns once `shared.shutdown` is set.
pub(crate) fn writer_loop(
    shared: Arc<Shared>,
    wake_rx: Receiver<()>,
    events_rx: Receiver<TierChange>,
    timings: WorkerTimings,
    done_tx: Sender<()>,
) {
    debug!("disk writer worker started");

    loop {
        dispatch_events(&shared, &events_rx);

        if shared.emergency_requested.swap(false) {
            emergency_export(&shared);
        }

        if shared.shutdown.get() {
            shared.session.lock().finish(&shared);
            dispatch_events(&shared, &events_rx);
            break;
        }

        let wait = {
            let mut session = shared.session.lock();
            if session.output.is_none() {
                timings.stopped_wait
            } else if shared.recording.get() {
                if let Err(e) = session.drain(&shared) {
                    drop(session);
                    fail_recording(&shared, &e.to_string());
                } else {
                    relax_tier(&shared, &session);
                }
                timings.idle_wait
            } else if shared.emergency_requested.get() {
                // Critical landed between the checks above; export first.
                Duration::ZERO
            } else {
                session.finish(&shared);
                timings.stopped_wait
            }
        };

        if !wait.is_zero() {
            let _ = wake_rx.recv_timeout(wait);
        }
    }

    debug!("disk writer worker stopped");
    let _ = done_tx.send(());
}

fn dispatch_events(shared: &Shared, events_rx: &Receiver<TierChange>) {
    while let Ok(change) = events_rx.try_recv() {
        let reason = shared
            .limits
            .status_message(change.tier, change.overflow_bytes);
        let overflow_mb = bytes_to_mb(change.overflow_bytes);
        if change.tier == Tier::Critical {
            error!(
                from = %change.previous,
                to = %change.tier,
                fill_percent = change.fill_percent,
                overflow_mb,
                "disk writer tier changed"
            );
        } else if change.tier > change.previous {
            warn!(
                from = %change.previous,
                to = %change.tier,
                fill_percent = change.fill_percent,
                overflow_mb,
                "disk writer tier changed"
            );
        } else {
            info!(
                from = %change.previous,
                to = %change.tier,
                fill_percent = change.fill_percent,
                overflow_mb,
                "disk writer tier changed"
            );
        }
        shared.notify(change.tier, &reason);
    }
}

/// Step the tier back down once the worker has caught up. Never leaves
/// Critical; only a new recording does that.
fn relax_tier(shared: &Shared, session: &Session) {
    let current = shared.tier.load();
    if current == Tier::Critical {
        return;
    }
    let fill = session.reader.fill_ratio();
    shared.fill_percent.set(fill * 100.0);
    let overflow = shared.overflow_bytes.load(Ordering::Acquire);
    let relaxed = Tier::classify(fill, overflow, &shared.limits);
    if relaxed < current && shared.tier.compare_exchange(current, relaxed) {
        let _ = shared.events_tx.try_send(TierChange {
            previous: current,
            tier: relaxed,
            fill_percent: fill * 100.0,
            overflow_bytes: overflow,
        });
    }
}

/// Close the primary file as-is and dump everything still buffered into the
/// emergency file. Failures are logged and swallowed.
fn emergency_export(shared: &Shared) {
    let mut session = shared.session.lock();
    // A new recording may have started since the request.
    if shared.tier.load() != Tier::Critical {
        return;
    }

    if let Some(output) = session.output.take() {
        if let Err(e) = output.finalize() {
            warn!("failed to finalize primary recording: {}", e);
        }
    }

    let limit = shared.ring_frames_written.load(Ordering::Acquire);
    session.pull_overflow();

    if let Some(primary) = session.path.clone() {
        let path = emergency_path(&primary);
        if session.pending.is_empty() && session.reader.frames_read >= limit {
            warn!(path = %path.display(), "emergency export skipped: nothing buffered");
        } else {
            let sample_rate = session.sample_rate;
            let mut feed = BacklogFeed::new(&mut session, shared, limit);
            let written = write_emergency_stream(&path, &mut feed, shared.channels, sample_rate);
            let frames = feed.frames;
            match written {
                Ok(()) => warn!(path = %path.display(), frames, "emergency export written"),
                Err(e) => error!(path = %path.display(), "emergency export failed: {}", e),
            }
        }
    }

    // Whatever the export did not consume is dropped.
    session.discard(shared);
}

/// Stop after a write error. The backlog is dropped, so the tier goes back
/// to Normal unless the session already hit Critical.
fn fail_recording(shared: &Shared, reason: &str) {
    error!("recording stopped after write failure: {}", reason);
    shared.recording.set(false);
    shared.quiesce_input();
    {
        let mut session = shared.session.lock();
        if let Some(output) = session.output.take() {
            let _ = output.finalize();
        }
        session.discard(shared);
    }
    if shared.tier.load() != Tier::Critical {
        shared.tier.store(Tier::Normal);
    }
    shared.fill_percent.set(0.0);
    shared.notify(shared.tier.load(), &format!("Write failed: {}", reason));
}
