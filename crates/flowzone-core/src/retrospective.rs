//! Retrospective capture buffer.
//!
//! An always-recording circular store of the most recent audio. The audio
//! thread calls [`RetrospectiveBuffer::push_block`] once per callback; control
//! threads pull windows out of it to capture a loop "after the fact" or to
//! draw the input waveform.
//!
//! Samples are kept as atomics and the write cursor is an absolute frame
//! count published with release ordering. A reader can race with the writer
//! and see at most one block newer than it asked for, but never data from
//! outside the retained window and never uninitialized memory.

use crate::lockfree::{AtomicFloat, AtomicSample};
use crate::{AudioBuffer, Ordering};
use arc_swap::ArcSwapOption;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

struct RetroStorage {
    channels: Box<[Box<[AtomicSample]>]>,
    capacity: usize,
    /// Total frames ever pushed into this storage.
    written: AtomicU64,
}

impl RetroStorage {
    fn new(num_channels: usize, capacity: usize) -> Self {
        let channels = (0..num_channels)
            .map(|_| (0..capacity).map(|_| AtomicSample::default()).collect())
            .collect();
        Self {
            channels,
            capacity,
            written: AtomicU64::new(0),
        }
    }

    /// Sample at absolute frame `frame`, or silence if it is outside the
    /// retained window.
    #[inline]
    fn sample_at(&self, channel: usize, frame: i64, written: i64) -> f32 {
        let oldest = written - self.capacity as i64;
        if frame < 0 || frame < oldest || frame >= written {
            return 0.0;
        }
        self.channels[channel][(frame as u64 % self.capacity as u64) as usize].load()
    }
}

/// Fixed-capacity multichannel circular buffer of recent audio.
pub struct RetrospectiveBuffer {
    num_channels: usize,
    storage: ArcSwapOption<RetroStorage>,
    input_level: AtomicFloat,
}

impl RetrospectiveBuffer {
    /// Unprepared buffer; every read is a no-op until [`prepare`](Self::prepare).
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels: num_channels.max(1),
            storage: ArcSwapOption::const_empty(),
            input_level: AtomicFloat::default(),
        }
    }

    /// Allocate `sample_rate * max_seconds` frames of zeroed storage,
    /// discarding any previous content.
    pub fn prepare(&self, sample_rate: f64, max_seconds: f64) {
        let capacity = (sample_rate * max_seconds).max(0.0) as usize;
        if capacity == 0 {
            self.storage.store(None);
        } else {
            self.storage
                .store(Some(Arc::new(RetroStorage::new(self.num_channels, capacity))));
        }
        self.input_level.set(0.0);
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Capacity in frames, 0 while unprepared.
    pub fn capacity_frames(&self) -> usize {
        match &*self.storage.load() {
            Some(storage) => storage.capacity,
            None => 0,
        }
    }

    /// Frames pushed since the last `prepare`.
    pub fn frames_written(&self) -> u64 {
        match &*self.storage.load() {
            Some(storage) => storage.written.load(Ordering::Acquire),
            None => 0,
        }
    }

    /// Absolute peak of the most recently pushed block.
    pub fn input_level(&self) -> f32 {
        self.input_level.get()
    }

    /// Append one block. Real-time safe: no allocation, no locks.
    ///
    /// Channels beyond those present in `block` are written as silence.
    #[inline]
    pub fn push_block(&self, block: &AudioBuffer) {
        self.push_with(block.num_frames(), |c| {
            (c < block.num_channels()).then(|| block.channel(c))
        });
    }

    /// Same as [`push_block`](Self::push_block) for borrowed channel slices.
    /// The block length is the shortest slice.
    #[inline]
    pub fn push_channels(&self, channels: &[&[f32]]) {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        self.push_with(frames, |c| channels.get(c).copied());
    }

    fn push_with<'a, F>(&self, frames: usize, source: F)
    where
        F: Fn(usize) -> Option<&'a [f32]>,
    {
        let guard = self.storage.load();
        let Some(storage) = &*guard else {
            return;
        };
        if frames == 0 {
            return;
        }

        let capacity = storage.capacity;
        let written = storage.written.load(Ordering::Relaxed);
        // Only the tail of an oversized block survives.
        let skip = frames.saturating_sub(capacity);
        let to_write = frames - skip;
        let start = ((written + skip as u64) % capacity as u64) as usize;
        let first = to_write.min(capacity - start);

        let mut peak = 0.0f32;
        for (c, dest) in storage.channels.iter().enumerate() {
            match source(c) {
                Some(src) => {
                    let src = &src[skip..frames];
                    for (slot, &s) in dest[start..start + first].iter().zip(&src[..first]) {
                        slot.store(s);
                        peak = peak.max(s.abs());
                    }
                    for (slot, &s) in dest[..to_write - first].iter().zip(&src[first..]) {
                        slot.store(s);
                        peak = peak.max(s.abs());
                    }
                }
                None => {
                    for slot in &dest[start..start + first] {
                        slot.store(0.0);
                    }
                    for slot in &dest[..to_write - first] {
                        slot.store(0.0);
                    }
                }
            }
        }

        storage
            .written
            .store(written + frames as u64, Ordering::Release);
        self.input_level.set(peak);
    }

    /// Copy `num_samples` frames ending `delay_samples` before the write
    /// cursor into `out` (resized to `num_channels x num_samples`).
    ///
    /// Frames older than the retained window, or from before anything was
    /// pushed, come back as silence. Returns false and leaves `out` untouched
    /// if the buffer is unprepared.
    pub fn get_past_audio(
        &self,
        delay_samples: usize,
        num_samples: usize,
        out: &mut AudioBuffer,
    ) -> bool {
        let guard = self.storage.load();
        let Some(storage) = &*guard else {
            return false;
        };

        out.set_size(self.num_channels, num_samples);
        if num_samples == 0 {
            return true;
        }

        let capacity = storage.capacity as i64;
        let written = storage.written.load(Ordering::Acquire) as i64;
        // Anything at or past capacity is out of the window either way.
        let delay = delay_samples.min(storage.capacity) as i64;
        let end = written - delay;
        let start = end - num_samples as i64;

        let lo = start.max(written - capacity).max(0);
        let hi = end.min(written);
        if lo >= hi {
            return true;
        }

        let out_offset = (lo - start) as usize;
        let len = (hi - lo) as usize;
        let read_pos = (lo % capacity) as usize;
        let first = len.min(storage.capacity - read_pos);

        for (c, src) in storage.channels.iter().enumerate() {
            let dest = &mut out.channel_mut(c)[out_offset..out_offset + len];
            for (d, s) in dest[..first].iter_mut().zip(&src[read_pos..read_pos + first]) {
                *d = s.load();
            }
            for (d, s) in dest[first..].iter_mut().zip(&src[..len - first]) {
                *d = s.load();
            }
        }
        true
    }

    /// The most recent `num_samples` frames, oldest first.
    pub fn audio_region(&self, num_samples: usize, out: &mut AudioBuffer) -> bool {
        self.get_past_audio(0, num_samples, out)
    }

    /// Peak-per-bucket summary of the whole retained window, oldest first.
    ///
    /// O(capacity). Never call this from the audio thread.
    pub fn waveform(&self, target_points: usize) -> Vec<f32> {
        self.waveform_recent(self.capacity_frames(), target_points)
    }

    /// Peak-per-bucket summary of only the most recent `num_recent_samples`
    /// frames (clamped to capacity), oldest first. Each point is the largest
    /// absolute sample across all channels within its bucket.
    pub fn waveform_recent(&self, num_recent_samples: usize, target_points: usize) -> Vec<f32> {
        let guard = self.storage.load();
        let Some(storage) = &*guard else {
            return Vec::new();
        };
        if target_points == 0 {
            return Vec::new();
        }

        let recent = num_recent_samples.min(storage.capacity);
        let mut points = vec![0.0f32; target_points];
        if recent == 0 {
            return points;
        }

        let written = storage.written.load(Ordering::Acquire) as i64;
        let window_start = written - recent as i64;
        let samples_per_point = recent as f64 / target_points as f64;

        for (pt, peak) in points.iter_mut().enumerate() {
            let start = (pt as f64 * samples_per_point).floor() as usize;
            let end = (((pt + 1) as f64 * samples_per_point).floor() as usize)
                .max(start + 1)
                .min(recent);
            for offset in start..end {
                let frame = window_start + offset as i64;
                for c in 0..storage.channels.len() {
                    *peak = peak.max(storage.sample_at(c, frame, written).abs());
                }
            }
        }
        points
    }
}
