//! Interleaved sample ring between the audio thread and the worker, plus
//! the heap blocks that take over when it is full.

use crate::error::Result;
use flowzone_core::AudioBuffer;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

/// Ring buffer factory.
pub(crate) struct RecordRing;

impl RecordRing {
    #[allow(clippy::new_ret_no_self)]
    pub(crate) fn new(frames: usize, channels: usize, scratch_frames: usize) -> (RingWriter, RingReader) {
        let rb = HeapRb::<f32>::new(frames.max(1) * channels);
        let (prod, cons) = rb.split();
        (
            RingWriter { prod, channels },
            RingReader {
                cons,
                channels,
                scratch: vec![0.0; scratch_frames.max(1) * channels],
                frames_read: 0,
            },
        )
    }
}

/// Audio-thread side.
pub(crate) struct RingWriter {
    prod: HeapProd<f32>,
    channels: usize,
}

impl RingWriter {
    /// Push the whole block or nothing.
    #[inline]
    pub(crate) fn try_write(&mut self, block: &AudioBuffer) -> bool {
        let frames = block.num_frames();
        if self.prod.vacant_len() < frames * self.channels {
            return false;
        }
        let available = block.num_channels();
        for i in 0..frames {
            for c in 0..self.channels {
                let sample = if c < available { block.channel(c)[i] } else { 0.0 };
                let _ = self.prod.try_push(sample);
            }
        }
        true
    }

    /// Ring fill, 0.0-1.0.
    #[inline]
    pub(crate) fn fill_ratio(&self) -> f32 {
        self.prod.occupied_len() as f32 / self.prod.capacity().get() as f32
    }
}

/// Worker side. Always reads whole frames.
pub(crate) struct RingReader {
    cons: HeapCons<f32>,
    channels: usize,
    scratch: Vec<f32>,
    /// Frames consumed since the ring was created.
    pub(crate) frames_read: u64,
}

impl RingReader {
    pub(crate) fn fill_ratio(&self) -> f32 {
        self.cons.occupied_len() as f32 / self.cons.capacity().get() as f32
    }

    pub(crate) fn resize_scratch(&mut self, frames: usize) {
        self.scratch.resize(frames.max(1) * self.channels, 0.0);
    }

    /// Drop everything currently queued and resync the frame counter.
    pub(crate) fn discard(&mut self, frames_written: u64) {
        self.cons.clear();
        self.frames_read = frames_written;
    }

    /// Hand frames to `write` in scratch-sized chunks until `frames_read`
    /// reaches `target` or the ring runs dry.
    pub(crate) fn read_until<F>(&mut self, target: u64, mut write: F) -> Result<()>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        while self.frames_read < target {
            let ready = self.cons.occupied_len() / self.channels;
            let wanted = (target - self.frames_read) as usize;
            let frames = wanted
                .min(ready)
                .min(self.scratch.len() / self.channels);
            if frames == 0 {
                break;
            }
            let len = frames * self.channels;
            let read = self.cons.pop_slice(&mut self.scratch[..len]);
            debug_assert_eq!(read, len);
            self.frames_read += frames as u64;
            write(&self.scratch[..read])?;
        }
        Ok(())
    }
}

/// One block that did not fit the ring, copied to the heap.
#[derive(Debug)]
pub(crate) struct OverflowBlock {
    /// Ring frames written before this block was captured.
    pub(crate) ring_position: u64,
    pub(crate) samples: Box<[f32]>,
}

impl OverflowBlock {
    /// Interleave `block` into a fresh heap allocation.
    pub(crate) fn capture(block: &AudioBuffer, channels: usize, ring_position: u64) -> Self {
        let frames = block.num_frames();
        let available = block.num_channels();
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            for c in 0..channels {
                samples.push(if c < available { block.channel(c)[i] } else { 0.0 });
            }
        }
        Self {
            ring_position,
            samples: samples.into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn byte_len(&self) -> u64 {
        (self.samples.len() * std::mem::size_of::<f32>()) as u64
    }
}
