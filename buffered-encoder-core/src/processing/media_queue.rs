use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::buffer_pool::BufferPool;
use super::recycle_buffer::{FrameMeta, RecycleBuffer};

/// A frame rejected by a saturated [`MediaQueue`].
///
/// Carries the buffer back so the producer can recycle it.
#[derive(Debug, Error)]
#[error("media queue is full")]
pub struct QueueFull(pub RecycleBuffer);

impl QueueFull {
    pub fn into_buffer(self) -> RecycleBuffer {
        self.0
    }
}

/// Bounded FIFO of filled buffers waiting for the encoder.
///
/// Decouples the capture cadence from the encoder cadence. The producer
/// never blocks on it; the consumer blocks only in [`poll`](Self::poll),
/// for at most the given timeout.
pub struct MediaQueue {
    max_depth: usize,
    items: Mutex<VecDeque<RecycleBuffer>>,
    available: Condvar,
}

impl MediaQueue {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            items: Mutex::new(VecDeque::with_capacity(max_depth)),
            available: Condvar::new(),
        }
    }

    /// Append a frame at the tail.
    pub fn queue_frame(&self, buffer: RecycleBuffer) -> Result<(), QueueFull> {
        {
            let mut items = self.items.lock();
            if items.len() >= self.max_depth {
                return Err(QueueFull(buffer));
            }
            items.push_back(buffer);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the head frame, waiting up to `timeout` for one to arrive.
    pub fn poll(&self, timeout: Duration) -> Option<RecycleBuffer> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(buffer) = items.pop_front() {
                return Some(buffer);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Take the head frame if one is queued.
    pub fn try_poll(&self) -> Option<RecycleBuffer> {
        self.items.lock().pop_front()
    }

    pub fn peek(&self) -> Option<FrameMeta> {
        self.items.lock().front().map(RecycleBuffer::meta)
    }

    pub fn count(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Drop every queued frame. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Hand every queued frame back to `pool`. Returns how many were moved.
    pub fn drain_into(&self, pool: &BufferPool) -> usize {
        let drained: Vec<RecycleBuffer> = self.items.lock().drain(..).collect();
        let count = drained.len();
        for buffer in drained {
            pool.recycle(buffer);
        }
        count
    }
}

impl std::fmt::Debug for MediaQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaQueue")
            .field("max_depth", &self.max_depth)
            .field("count", &self.count())
            .finish()
    }
}
