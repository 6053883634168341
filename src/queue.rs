//! Bounded, drop-on-full unit queue between the driver and one consumer.
//!
//! Backed by a bounded tokio mpsc channel: `try_send` gives the lossy push,
//! `try_recv` gives the three-state pull, and closing the sending half is the
//! end-of-stream marker. Buffered units are still delivered after the close,
//! then every pull reports [`Pull::Eof`].

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{CaptureError, Result};
use crate::media::VideoFrame;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Result of a non-blocking pull.
#[derive(Debug, PartialEq)]
pub enum Pull<T> {
    Unit(T),
    /// Nothing buffered yet, ask again later.
    TryAgain,
    /// Producer finished and the queue is drained. Permanent.
    Eof,
}

impl<T> Pull<T> {
    pub fn into_unit(self) -> Option<T> {
        match self {
            Pull::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Pull::Eof)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full, the unit was released.
    Dropped,
    /// End of stream already marked, or the consumer is gone; the unit was released.
    Closed,
}

/// Units that know whether they start a decodable sequence.
pub trait KeyUnit {
    fn is_key_unit(&self) -> bool;
}

impl KeyUnit for VideoFrame {
    fn is_key_unit(&self) -> bool {
        self.is_key
    }
}

#[derive(Debug, Default)]
pub struct QueueStats {
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl QueueStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Creates a queue holding at most `capacity` units.
pub fn unit_queue<T>(name: &'static str, capacity: usize) -> Result<(UnitSender<T>, UnitReceiver<T>)> {
    if capacity == 0 {
        return Err(CaptureError::config(format!(
            "{} queue capacity must be positive",
            name
        )));
    }
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(QueueStats::default());
    let sender = UnitSender {
        name,
        capacity,
        tx: Some(tx),
        stats: Arc::clone(&stats),
    };
    let receiver = UnitReceiver {
        name,
        rx,
        stats,
        skipped: 0,
    };
    Ok((sender, receiver))
}

/// Producer half. Dropping it marks end of stream.
pub struct UnitSender<T> {
    name: &'static str,
    capacity: usize,
    tx: Option<mpsc::Sender<T>>,
    stats: Arc<QueueStats>,
}

impl<T> UnitSender<T> {
    /// Enqueues `unit` without waiting.
    pub fn push(&mut self, unit: T) -> PushOutcome {
        let Some(tx) = self.tx.as_ref() else {
            log::debug!("{} queue: push after eof ignored", self.name);
            return PushOutcome::Closed;
        };
        match tx.try_send(unit) {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Queued
            }
            Err(TrySendError::Full(unit)) => {
                drop(unit);
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("{} queue overrun, unit dropped (total {})", self.name, dropped);
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("{} queue: consumer gone, unit released", self.name);
                PushOutcome::Closed
            }
        }
    }

    /// No more units will follow. Buffered units stay readable.
    pub fn mark_eof(&mut self) {
        if self.tx.take().is_some() {
            log::debug!("{} queue: eof marked", self.name);
        }
    }

    pub fn is_eof(&self) -> bool {
        self.tx.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Consumer half.
pub struct UnitReceiver<T> {
    name: &'static str,
    rx: mpsc::Receiver<T>,
    stats: Arc<QueueStats>,
    skipped: u64,
}

impl<T> UnitReceiver<T> {
    /// Single attempt, never waits.
    pub fn pull_nonblocking(&mut self) -> Pull<T> {
        match self.rx.try_recv() {
            Ok(unit) => Pull::Unit(unit),
            Err(TryRecvError::Empty) => Pull::TryAgain,
            Err(TryRecvError::Disconnected) => Pull::Eof,
        }
    }

    /// Parks the calling thread until a unit arrives or the stream ends.
    /// `None` is end of stream.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`recv`](Self::recv) there.
    pub fn pull_blocking(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }

    /// Async variant of [`pull_blocking`](Self::pull_blocking).
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Units still buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Non-key units released by [`pull_key_unit`](Self::pull_key_unit).
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn into_stream(self) -> ReceiverStream<T> {
        ReceiverStream::new(self.rx)
    }
}

impl<T: KeyUnit> UnitReceiver<T> {
    /// Skips (and releases) units until a key unit arrives. `None` is end of stream.
    pub fn pull_key_unit(&mut self) -> Option<T> {
        loop {
            let unit = match self.pull_nonblocking() {
                Pull::Unit(unit) => unit,
                Pull::TryAgain => self.pull_blocking()?,
                Pull::Eof => return None,
            };
            if unit.is_key_unit() {
                return Some(unit);
            }
            self.skipped += 1;
        }
    }
}

impl<T: KeyUnit + Send + 'static> UnitReceiver<T> {
    pub fn into_key_stream(self) -> Pin<Box<dyn Stream<Item = T> + Send>> {
        Box::pin(
            self.into_stream()
                .filter(|unit| futures::future::ready(unit.is_key_unit())),
        )
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
