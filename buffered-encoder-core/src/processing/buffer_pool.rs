use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::recycle_buffer::{PoolTag, RecycleBuffer};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Produces backing storage for a new buffer of the given capacity.
pub type BufferFactory = Box<dyn Fn(usize) -> Vec<u8> + Send + Sync + 'static>;

struct PoolInner {
    free: VecDeque<RecycleBuffer>,
    created: usize,
    generation: u64,
}

/// Bounded object pool of [`RecycleBuffer`]s.
///
/// Buffers are created lazily up to `max_size` and reused afterwards.
/// `free + checked out <= max_size` always holds: once every instance is
/// out, [`obtain`](Self::obtain) returns `None` instead of allocating.
///
/// Share across threads with `Arc<BufferPool>`; every operation takes the
/// internal lock briefly and never blocks.
pub struct BufferPool {
    id: u64,
    max_size: usize,
    default_capacity: usize,
    factory: BufferFactory,
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    /// Pool of zero-filled buffers, `initial` of them allocated up front.
    pub fn new(initial: usize, max_size: usize, default_capacity: usize) -> Self {
        Self::with_factory(initial, max_size, default_capacity, |capacity| {
            vec![0u8; capacity]
        })
    }

    pub fn with_factory<F>(initial: usize, max_size: usize, default_capacity: usize, factory: F) -> Self
    where
        F: Fn(usize) -> Vec<u8> + Send + Sync + 'static,
    {
        let pool = Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            max_size,
            default_capacity,
            factory: Box::new(factory),
            inner: Mutex::new(PoolInner {
                free: VecDeque::with_capacity(max_size),
                created: 0,
                generation: 0,
            }),
        };
        pool.preallocate(initial.min(max_size));
        pool
    }

    fn preallocate(&self, count: usize) {
        let mut inner = self.inner.lock();
        let tag = self.tag(inner.generation);
        for slot in 0..count {
            let storage = (self.factory)(self.default_capacity);
            inner
                .free
                .push_back(RecycleBuffer::new(storage, self.default_capacity, slot, tag));
        }
        inner.created = count;
    }

    fn tag(&self, generation: u64) -> PoolTag {
        PoolTag {
            pool_id: self.id,
            generation,
        }
    }

    /// Take a buffer with capacity of at least `requested_size` bytes.
    ///
    /// Reuses the least-recently-recycled free buffer, otherwise creates a
    /// new one while under the cap. Returns `None` when every buffer the
    /// pool may create is checked out.
    pub fn obtain(&self, requested_size: usize) -> Option<RecycleBuffer> {
        let (slot, tag) = {
            let mut inner = self.inner.lock();
            if let Some(mut buffer) = inner.free.pop_front() {
                drop(inner);
                buffer.ensure_capacity(requested_size);
                return Some(buffer);
            }
            if inner.created >= self.max_size {
                return None;
            }
            let slot = inner.created;
            inner.created += 1;
            (slot, self.tag(inner.generation))
        };

        // Allocate outside the lock; the slot is already reserved.
        let capacity = requested_size.max(self.default_capacity);
        let storage = (self.factory)(capacity);
        log::trace!("buffer pool {}: created slot {}", self.id, slot);
        Some(RecycleBuffer::new(storage, capacity, slot, tag))
    }

    /// Return a buffer to the free list.
    ///
    /// Returns `false` and drops the buffer if the free list is full, or if
    /// the buffer belongs to another pool or predates the last
    /// [`clear`](Self::clear).
    pub fn recycle(&self, mut buffer: RecycleBuffer) -> bool {
        let mut inner = self.inner.lock();
        if buffer.tag() != self.tag(inner.generation) {
            log::debug!(
                "buffer pool {}: dropping foreign or stale buffer (slot {})",
                self.id,
                buffer.slot()
            );
            return false;
        }
        if inner.free.len() >= self.max_size {
            return false;
        }
        buffer.reset();
        inner.free.push_back(buffer);
        true
    }

    /// Drop every pooled buffer and forget the ones still checked out.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.free.clear();
        inner.created = 0;
        inner.generation += 1;
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Number of buffers created in the current generation.
    pub fn created_count(&self) -> usize {
        self.inner.lock().created
    }

    /// Buffers currently held outside the pool (producer, queue, consumer).
    pub fn checked_out(&self) -> usize {
        let inner = self.inner.lock();
        inner.created - inner.free.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BufferPool")
            .field("id", &self.id)
            .field("max_size", &self.max_size)
            .field("default_capacity", &self.default_capacity)
            .field("free", &inner.free.len())
            .field("created", &inner.created)
            .field("generation", &inner.generation)
            .finish()
    }
}
