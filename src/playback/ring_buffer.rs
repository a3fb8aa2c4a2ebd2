//! Lock-free playout ring buffer
//!
//! Single-producer/single-consumer queue of interleaved f32 samples sitting
//! between the decode/feed thread and the real-time device callback. The
//! producer half lives on the feed thread, the consumer half inside the
//! callback closure; all coordination is atomics, no locks anywhere.
//!
//! Capacity is rounded up to a power of two. Underruns are answered with
//! silence of the requested length, never stale or uninitialized memory.
//!
//! Seek flush uses monotonic frame cursors: the producer publishes a flush
//! watermark (its total frames written at flush time), and the consumer
//! skips exactly the buffered frames older than the watermark before
//! serving. Pre-seek audio is never played, post-seek audio is never
//! dropped, and neither side waits on the other.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters shared between the two halves.
struct RingShared {
    /// Underrun events (consumer found fewer frames than requested)
    underruns: AtomicU64,

    /// Frames discarded by the producer under `DropNewest` overrun policy
    dropped_frames: AtomicU64,

    /// Total frames written at the most recent flush request. Frames older
    /// than this are discarded by the consumer before serving.
    flush_watermark: AtomicU64,
}

/// Lock-free sample ring buffer; split into producer and consumer halves.
pub struct PlayoutRing {
    buffer: HeapRb<f32>,
    shared: Arc<RingShared>,
    channels: u16,
    capacity_frames: usize,
}

impl PlayoutRing {
    /// Create a ring holding `capacity_frames` frames of `channels` channels.
    ///
    /// The frame capacity is rounded up to a power of two.
    pub fn new(capacity_frames: usize, channels: u16) -> Self {
        let capacity_frames = capacity_frames.max(1).next_power_of_two();
        let capacity_samples = capacity_frames * channels as usize;

        debug!(
            "Creating playout ring: {} frames ({} samples, {} channels)",
            capacity_frames, capacity_samples, channels
        );

        Self {
            buffer: HeapRb::new(capacity_samples),
            shared: Arc::new(RingShared {
                underruns: AtomicU64::new(0),
                dropped_frames: AtomicU64::new(0),
                flush_watermark: AtomicU64::new(0),
            }),
            channels,
            capacity_frames,
        }
    }

    /// Counter handle that stays valid after the halves move to their
    /// threads (for session statistics).
    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            shared: Arc::clone(&self.shared),
            capacity_frames: self.capacity_frames,
        }
    }

    /// Split into the feed-thread producer and the callback consumer.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let (prod, cons) = self.buffer.split();

        let producer = RingProducer {
            prod,
            shared: Arc::clone(&self.shared),
            channels: self.channels as usize,
            capacity_frames: self.capacity_frames,
            total_written: 0,
        };

        let consumer = RingConsumer {
            cons,
            shared: self.shared,
            channels: self.channels as usize,
            total_read: 0,
        };

        (producer, consumer)
    }
}

/// Producer half (decode/feed thread).
pub struct RingProducer {
    prod: HeapProd<f32>,
    shared: Arc<RingShared>,
    channels: usize,
    capacity_frames: usize,
    /// Monotonic count of frames written, producer-owned.
    total_written: u64,
}

impl RingProducer {
    /// Write as many whole frames as fit; never blocks.
    ///
    /// Returns the number of frames written, which may be less than offered
    /// when the ring is near-full.
    pub fn try_write(&mut self, samples: &[f32]) -> usize {
        let writable = (self.prod.vacant_len() / self.channels) * self.channels;
        let offered = (samples.len() / self.channels) * self.channels;
        let take = writable.min(offered);
        if take == 0 {
            return 0;
        }

        let pushed = self.prod.push_slice(&samples[..take]);
        debug_assert_eq!(pushed % self.channels, 0);
        let frames = pushed / self.channels;
        self.total_written += frames as u64;
        frames
    }

    /// Record frames discarded under the `DropNewest` overrun policy.
    pub fn note_dropped(&self, frames: usize) {
        let total = self.shared.dropped_frames.fetch_add(frames as u64, Ordering::Relaxed)
            + frames as u64;
        trace!("Ring overrun: dropped {} frames (total {})", frames, total);
    }

    /// Request a flush: everything written so far is marked stale and will
    /// be skipped by the consumer before it serves newer frames.
    pub fn flush(&self) {
        self.shared
            .flush_watermark
            .store(self.total_written, Ordering::Release);
        debug!("Ring flush requested at frame {}", self.total_written);
    }

    pub fn vacant_frames(&self) -> usize {
        self.prod.vacant_len() / self.channels
    }

    pub fn occupied_frames(&self) -> usize {
        self.prod.occupied_len() / self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            underruns: self.shared.underruns.load(Ordering::Relaxed),
            dropped_frames: self.shared.dropped_frames.load(Ordering::Relaxed),
            capacity_frames: self.capacity_frames,
            occupied_frames: self.occupied_frames(),
        }
    }
}

/// Consumer half (real-time device callback).
pub struct RingConsumer {
    cons: HeapCons<f32>,
    shared: Arc<RingShared>,
    channels: usize,
    /// Monotonic count of frames read or discarded, consumer-owned.
    total_read: u64,
}

impl RingConsumer {
    /// Fill `out` from the ring, zeroing whatever the ring cannot supply.
    ///
    /// Returns the number of frames that came from the ring; the remainder
    /// of `out` is silence. Wait-free: suitable for the audio callback.
    pub fn read_or_silence(&mut self, out: &mut [f32]) -> usize {
        self.discard_stale();

        let got = self.cons.pop_slice(out);
        debug_assert_eq!(got % self.channels, 0);
        self.total_read += (got / self.channels) as u64;

        if got < out.len() {
            out[got..].fill(0.0);
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }

        got / self.channels
    }

    /// Skip buffered frames older than the flush watermark.
    ///
    /// Every frame written before the watermark is either already read or
    /// still buffered, so the skip always completes in one call.
    fn discard_stale(&mut self) {
        let watermark = self.shared.flush_watermark.load(Ordering::Acquire);
        if self.total_read >= watermark {
            return;
        }

        let stale = watermark - self.total_read;
        let skipped = self.cons.skip(stale as usize * self.channels);
        debug_assert_eq!(skipped % self.channels, 0);
        self.total_read += (skipped / self.channels) as u64;
        trace!("Ring flush: discarded {} stale frames", skipped / self.channels);
    }

    pub fn occupied_frames(&self) -> usize {
        self.cons.occupied_len() / self.channels
    }
}

/// Counter view onto a ring whose halves live on other threads.
pub struct RingMonitor {
    shared: Arc<RingShared>,
    capacity_frames: usize,
}

impl RingMonitor {
    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }
}

/// Ring buffer statistics snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RingStats {
    /// Underrun events (callback found the ring short)
    pub underruns: u64,

    /// Frames dropped by the producer (overrun, `DropNewest` policy)
    pub dropped_frames: u64,

    /// Capacity in frames
    pub capacity_frames: usize,

    /// Occupied frames at snapshot time
    pub occupied_frames: usize,
}

impl RingStats {
    /// Ring fill fraction (0.0 to 1.0).
    pub fn fill_percent(&self) -> f32 {
        self.occupied_frames as f32 / self.capacity_frames as f32
    }
}
