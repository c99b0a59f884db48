//! FlowEngine that wires the real-time core together.

use crate::core::{
    AudioBuffer, Command, CommandReceiver, CommandSender, CoreConfig, RetrospectiveBuffer,
};
use crate::guard::{CrashGuard, SafeModeLevel};
use crate::recorder::{DiskWriter, DiskWriterInput, Tier, TierStatus};
use crate::sync::{AppState, BroadcastTicker, StateBroadcaster};
use crate::Result;
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Points in the looper waveform overview sent to the UI.
pub const WAVEFORM_POINTS: usize = 256;

/// What one call to [`AudioProcessor::process`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockReport {
    /// Commands drained and applied before the block.
    pub commands_applied: usize,
    /// Whether the block went to the disk writer.
    pub recorded: bool,
}

/// Audio-thread half of the engine.
///
/// Call [`process`](Self::process) once per audio callback. It never
/// blocks, never does I/O and allocates only when the disk writer is in
/// overflow.
pub struct AudioProcessor {
    commands: CommandReceiver,
    retrospective: Arc<RetrospectiveBuffer>,
    recorder: DiskWriterInput,
}

impl AudioProcessor {
    /// Drain pending commands into `apply`, then capture `input` into the
    /// retrospective buffer and, while recording, the disk writer.
    ///
    /// Commands are applied before the block so their effect starts with it.
    pub fn process<F>(&mut self, input: &AudioBuffer, apply: F) -> BlockReport
    where
        F: FnMut(&Command),
    {
        let commands_applied = self.commands.drain(apply);
        self.retrospective.push_block(input);
        let recorded = self.recorder.write_block(input);
        BlockReport {
            commands_applied,
            recorded,
        }
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending()
    }
}

/// Control-thread handle for the real-time core.
///
/// Owns the disk writer worker, the state broadcaster and (when a storage
/// root was configured) the crash guard. The audio-thread half is taken
/// once with [`take_processor`](Self::take_processor).
///
/// # Example
///
/// ```ignore
/// use flowzone::prelude::*;
///
/// let engine = FlowEngine::builder()
///     .sample_rate(48000.0)
///     .storage_root("/var/lib/flowzone")
///     .build()?;
///
/// let mut processor = engine.take_processor().unwrap();
/// // audio thread:
/// processor.process(&block, |cmd| dispatch(cmd));
///
/// // control thread:
/// engine.send_command(r#"{"cmd":"SET_TEMPO","bpm":128}"#);
/// engine.start_recording("takes/001.wav");
/// ```
pub struct FlowEngine {
    config: CoreConfig,
    commands: Mutex<CommandSender>,
    retrospective: Arc<RetrospectiveBuffer>,
    recorder: DiskWriter,
    broadcaster: Arc<StateBroadcaster>,
    guard: Option<Mutex<CrashGuard>>,
    processor: Mutex<Option<AudioProcessor>>,
}

impl FlowEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::FlowEngineBuilder {
        crate::FlowEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: CoreConfig,
        (sender, receiver): (CommandSender, CommandReceiver),
        retrospective: Arc<RetrospectiveBuffer>,
        recorder: DiskWriter,
        input: DiskWriterInput,
        broadcaster: Arc<StateBroadcaster>,
        guard: Option<CrashGuard>,
    ) -> Self {
        let processor = AudioProcessor {
            commands: receiver,
            retrospective: Arc::clone(&retrospective),
            recorder: input,
        };
        Self {
            config,
            commands: Mutex::new(sender),
            retrospective,
            recorder,
            broadcaster,
            guard: guard.map(Mutex::new),
            processor: Mutex::new(Some(processor)),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Hand the audio-thread half to the caller. Only the first call
    /// returns `Some`.
    pub fn take_processor(&self) -> Option<AudioProcessor> {
        self.processor.lock().take()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Queue a command for the audio thread. Returns false if the channel is
    /// full or the payload is too long; the command is dropped.
    pub fn send_command(&self, text: &str) -> bool {
        self.commands.lock().push(text)
    }

    pub fn free_command_slots(&self) -> usize {
        self.commands.lock().free_slots()
    }

    // =========================================================================
    // Retrospective capture
    // =========================================================================

    pub fn retrospective(&self) -> &Arc<RetrospectiveBuffer> {
        &self.retrospective
    }

    /// Copy `num_samples` frames ending `delay_samples` before the newest
    /// into `out`. Returns false if the buffer is not prepared.
    pub fn capture_loop(&self, delay_samples: usize, num_samples: usize, out: &mut AudioBuffer) -> bool {
        self.retrospective
            .get_past_audio(delay_samples, num_samples, out)
    }

    /// The last `bars` bars at `bpm` in 4/4, ending now.
    pub fn capture_bars(&self, bars: u32, bpm: f64, out: &mut AudioBuffer) -> bool {
        if bpm <= 0.0 || bpm.is_nan() {
            return false;
        }
        let samples = (f64::from(bars) * 4.0 * 60.0 / bpm * self.config.sample_rate).round();
        self.retrospective.audio_region(samples as usize, out)
    }

    // =========================================================================
    // Recording
    // =========================================================================

    pub fn recorder(&self) -> &DiskWriter {
        &self.recorder
    }

    /// Start a new take at `path`. Returns false (and logs why) on failure.
    pub fn start_recording(&self, path: impl AsRef<Path>) -> bool {
        self.recorder.start_recording(path)
    }

    pub fn try_start_recording(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.recorder.try_start_recording(path)?)
    }

    pub fn stop_recording(&self) {
        self.recorder.stop_recording();
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recording_tier(&self) -> Tier {
        self.recorder.tier()
    }

    pub fn tier_status(&self) -> TierStatus {
        self.recorder.tier_status()
    }

    pub fn recording_path(&self) -> Option<PathBuf> {
        self.recorder.recording_path()
    }

    // =========================================================================
    // State sync
    // =========================================================================

    pub fn broadcaster(&self) -> &Arc<StateBroadcaster> {
        &self.broadcaster
    }

    /// Fill the engine-owned parts of `state`: looper meter and waveform,
    /// disk buffer usage and audio settings.
    pub fn refresh_state(&self, state: &mut AppState) {
        fill_looper(&self.retrospective, state);
        state.system.disk_buffer_usage = self.recorder.tier_status().buffer_fill_percent;
        state.settings.sample_rate = self.config.sample_rate;
        state.settings.buffer_size = self.config.block_size as u32;
    }

    /// Broadcast on a background thread at the configured tick rate.
    ///
    /// `source` supplies the application state each tick; the looper meter
    /// and waveform are filled in from the retrospective buffer.
    pub fn spawn_ticker<F>(&self, mut source: F) -> Result<BroadcastTicker>
    where
        F: FnMut() -> AppState + Send + 'static,
    {
        let retrospective = Arc::clone(&self.retrospective);
        let ticker = BroadcastTicker::spawn(Arc::clone(&self.broadcaster), move || {
            let mut state = source();
            fill_looper(&retrospective, &mut state);
            state
        })?;
        Ok(ticker)
    }

    // =========================================================================
    // Crash guard
    // =========================================================================

    /// The crash guard, if a storage root was configured.
    pub fn crash_guard(&self) -> Option<MutexGuard<'_, CrashGuard>> {
        self.guard.as_ref().map(|g| g.lock())
    }

    /// Current safe-mode level; `None` without a crash guard.
    pub fn safe_mode_level(&self) -> SafeModeLevel {
        self.crash_guard()
            .map(|mut g| g.safe_mode_level())
            .unwrap_or_default()
    }

    /// Orderly shutdown: flush and stop the disk writer, then mark the
    /// session clean. Dropping the engine without calling this leaves the
    /// crash sentinel in place, so the next start reports a crash.
    pub fn shutdown(mut self) {
        if self.recorder.is_recording() {
            warn!("shutting down while recording; finalizing take");
        }
        self.recorder.shutdown();
        if let Some(guard) = self.guard.take() {
            guard.into_inner().mark_clean();
        }
        info!("engine shut down");
    }
}

fn fill_looper(retrospective: &RetrospectiveBuffer, state: &mut AppState) {
    state.looper.input_level = retrospective.input_level();
    state.looper.waveform_data = retrospective.waveform(WAVEFORM_POINTS);
}
