use std::sync::Arc;

use crate::models::config::CaptureConfiguration;
use crate::processing::buffer_pool::BufferPool;
use crate::processing::media_queue::MediaQueue;
use crate::processing::pts::PtsSource;
use crate::traits::clock::MonotonicClock;

use super::flags::SessionFlags;

/// Resources shared by the capture and drain threads of one session.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub pool: Arc<BufferPool>,
    pub queue: Arc<MediaQueue>,
    pub flags: Arc<SessionFlags>,
    pub pts: Arc<PtsSource>,
}

impl Pipeline {
    pub fn new(
        config: &CaptureConfiguration,
        clock: Arc<dyn MonotonicClock>,
        flags: Arc<SessionFlags>,
    ) -> Self {
        Self {
            pool: Arc::new(BufferPool::new(
                config.pool_initial,
                config.pool_max,
                config.frame_bytes,
            )),
            queue: Arc::new(MediaQueue::new(config.queue_depth)),
            flags,
            pts: Arc::new(PtsSource::new(clock)),
        }
    }

    /// Return queued frames to the pool, then drop the pool's buffers.
    ///
    /// Only valid once both workers have exited. Returns how many frames
    /// were still queued.
    pub fn teardown(&self) -> usize {
        let leftover = self.queue.drain_into(&self.pool);
        self.pool.clear();
        leftover
    }
}
