//! Fixed-rate broadcast thread.

use crate::broadcaster::StateBroadcaster;
use crate::error::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared between the ticker thread and its handle.
struct TickerState {
    /// Set to false to stop the thread.
    running: AtomicBool,
    ticks: AtomicU64,
}

/// Calls [`StateBroadcaster::broadcast_state_update`] on a dedicated thread
/// at `tick_interval`, with a snapshot taken from `source` each time.
///
/// Ticks never overlap: a slow cycle delays the next one instead of queuing.
/// Dropping the ticker stops and joins the thread.
pub struct BroadcastTicker {
    state: Arc<TickerState>,
    handle: Option<JoinHandle<()>>,
}

impl BroadcastTicker {
    pub fn spawn<S, F>(broadcaster: Arc<StateBroadcaster>, mut source: F) -> Result<Self>
    where
        S: Serialize,
        F: FnMut() -> S + Send + 'static,
    {
        broadcaster.config().validate()?;
        let interval = broadcaster.config().tick_interval;
        let state = Arc::new(TickerState {
            running: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
        });
        let thread_state = Arc::clone(&state);

        let handle = thread::Builder::new()
            .name("flowzone-broadcast".into())
            .spawn(move || {
                debug!(?interval, "broadcast ticker started");
                while thread_state.running.load(Ordering::Acquire) {
                    let started = Instant::now();
                    let snapshot = source();
                    if let Err(e) = broadcaster.broadcast_state_update(&snapshot) {
                        warn!("state broadcast failed: {}", e);
                    }
                    thread_state.ticks.fetch_add(1, Ordering::Relaxed);
                    sleep_until_next(&thread_state.running, started + interval);
                }
                debug!("broadcast ticker stopped");
            })?;

        Ok(Self {
            state,
            handle: Some(handle),
        })
    }

    /// Completed broadcast cycles.
    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Signal the thread to stop and wait for the current cycle to finish.
    pub fn stop(&mut self) {
        self.state.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("broadcast ticker thread panicked");
            }
        }
    }
}

impl Drop for BroadcastTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep in short slices so `stop` is not held up by a long interval.
fn sleep_until_next(running: &AtomicBool, deadline: Instant) {
    const SLICE: Duration = Duration::from_millis(5);
    loop {
        let now = Instant::now();
        if now >= deadline || !running.load(Ordering::Acquire) {
            return;
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}
