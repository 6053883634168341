//! Lock-free single-producer single-consumer ring of audio scalars.
//!
//! Storage is a [`ringbuf::HeapRb`] split at construction into a
//! [`SampleProducer`] and a [`SampleConsumer`]. Each half is `Send` but not
//! `Clone`, and every operation takes `&mut self`, so a side can only ever be
//! driven from one thread at a time.
//!
//! The halves share a small [`RingState`]: the `stop` and `consumer_gone`
//! flags plus free-running `written`/`read` counters whose difference is the
//! occupancy.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::error::{CaptureError, Result};
use crate::media::SampleFormat;

/// 2^20 slots.
pub const DEFAULT_RING_CAPACITY: usize = 1 << 20;

const SPIN_LIMIT: u32 = 64;

/// Scalar types the ring can hold.
pub trait Sample: Copy + Default + Send + 'static {
    const FORMAT: SampleFormat;
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::I16;
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;
}

#[derive(Default)]
struct RingState {
    written: AtomicU64,
    read: AtomicU64,
    stop: AtomicBool,
    consumer_gone: AtomicBool,
}

impl RingState {
    fn occupied(&self) -> usize {
        // read first: it never passes written
        let read = self.read.load(Ordering::Acquire);
        let written = self.written.load(Ordering::Acquire);
        written.saturating_sub(read) as usize
    }
}

/// Creates a ring with `capacity` slots and splits it.
///
/// `capacity` must be a non-zero power of two.
pub fn sample_ring<T: Sample>(capacity: usize) -> Result<(SampleProducer<T>, SampleConsumer<T>)> {
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(CaptureError::config(format!(
            "ring capacity must be a power of two, got {}",
            capacity
        )));
    }

    let (prod, cons) = HeapRb::<T>::new(capacity).split();
    let state = Arc::new(RingState::default());

    log::debug!("created {} sample ring with {} slots", T::FORMAT, capacity);

    let producer = SampleProducer {
        prod,
        state: Arc::clone(&state),
        capacity,
        discarded: 0,
    };
    let consumer = SampleConsumer {
        cons,
        state,
        capacity,
    };
    Ok((producer, consumer))
}

fn backoff(spins: &mut u32) {
    if *spins < SPIN_LIMIT {
        *spins += 1;
        std::hint::spin_loop();
    } else {
        std::thread::yield_now();
    }
}

/// Writer half, owned by the pipeline driver.
pub struct SampleProducer<T: Sample> {
    prod: HeapProd<T>,
    state: Arc<RingState>,
    capacity: usize,
    discarded: u64,
}

impl<T: Sample> SampleProducer<T> {
    /// Copies `values` into the ring, waiting for free space as needed.
    ///
    /// Blocks longer than the ring are written in capacity-sized pieces.
    /// Returns `false` if the consumer went away; the unwritten samples are
    /// then discarded instead of written or waited on.
    pub fn push_samples(&mut self, values: &[T]) -> bool {
        let mut offset = 0;
        for chunk in values.chunks(self.capacity) {
            if !self.push_chunk(chunk) {
                let lost = (values.len() - offset) as u64;
                self.discarded += lost;
                log::warn!(
                    "audio consumer gone, discarded {} samples (total {})",
                    lost,
                    self.discarded
                );
                return false;
            }
            offset += chunk.len();
        }
        true
    }

    fn push_chunk(&mut self, chunk: &[T]) -> bool {
        let mut spins = 0;
        loop {
            if self.state.consumer_gone.load(Ordering::Acquire) {
                return false;
            }
            if self.capacity - self.state.occupied() >= chunk.len() {
                break;
            }
            backoff(&mut spins);
        }

        let mut pushed = 0;
        while pushed < chunk.len() {
            pushed += self.prod.push_slice(&chunk[pushed..]);
        }
        self.state
            .written
            .fetch_add(chunk.len() as u64, Ordering::Release);
        true
    }

    /// Signals that no more samples will be written.
    pub fn stop(&mut self) {
        self.state.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stop.load(Ordering::Acquire)
    }

    pub fn occupied(&self) -> usize {
        self.state.occupied()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn written(&self) -> u64 {
        self.state.written.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl<T: Sample> Drop for SampleProducer<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reader half, owned by the audio consumer.
pub struct SampleConsumer<T: Sample> {
    cons: HeapCons<T>,
    state: Arc<RingState>,
    capacity: usize,
}

impl<T: Sample> SampleConsumer<T> {
    /// Fills `buf` from the ring, waiting for data until `buf` is full or the
    /// producer has stopped. Returns the number of samples copied.
    ///
    /// A short count (including zero) means the producer stopped and the ring
    /// has been drained up to that point.
    pub fn pull_samples(&mut self, buf: &mut [T]) -> usize {
        let mut pos = 0;
        let mut spins = 0;
        while pos < buf.len() {
            // stop is loaded before popping: everything written before stop is visible below
            let stopped = self.state.stop.load(Ordering::Acquire);
            let n = self.cons.pop_slice(&mut buf[pos..]);
            if n > 0 {
                self.state.read.fetch_add(n as u64, Ordering::Release);
                pos += n;
                spins = 0;
                continue;
            }
            if stopped {
                break;
            }
            backoff(&mut spins);
        }
        pos
    }

    /// True once the producer stopped and every sample has been read.
    pub fn is_finished(&self) -> bool {
        self.state.stop.load(Ordering::Acquire) && self.state.occupied() == 0
    }

    pub fn occupied(&self) -> usize {
        self.state.occupied()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read(&self) -> u64 {
        self.state.read.load(Ordering::Relaxed)
    }
}

impl<T: Sample> Drop for SampleConsumer<T> {
    fn drop(&mut self) {
        self.state.consumer_gone.store(true, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "ring_buffer_test.rs"]
mod ring_buffer_test;
