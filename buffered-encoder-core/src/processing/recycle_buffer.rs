/// Identifies the pool (and pool generation) a buffer was created by.
///
/// A plain value rather than a pointer: a buffer never keeps its pool alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PoolTag {
    pub(crate) pool_id: u64,
    pub(crate) generation: u64,
}

/// Snapshot of a buffer's header, for introspection without taking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub slot: usize,
    pub len: usize,
    pub pts_us: u64,
}

/// Reusable byte buffer carrying one frame of PCM data.
///
/// Created by a [`BufferPool`](super::buffer_pool::BufferPool) and moved
/// from stage to stage: pool → producer → queue → consumer → pool. The
/// backing storage is always fully allocated; `len` marks the payload.
#[derive(Debug)]
pub struct RecycleBuffer {
    storage: Vec<u8>,
    len: usize,
    pts_us: u64,
    slot: usize,
    tag: PoolTag,
}

impl RecycleBuffer {
    pub(crate) fn new(mut storage: Vec<u8>, capacity: usize, slot: usize, tag: PoolTag) -> Self {
        if storage.len() < capacity {
            storage.resize(capacity, 0);
        }
        Self {
            storage,
            len: 0,
            pts_us: 0,
            slot,
            tag,
        }
    }

    pub(crate) fn tag(&self) -> PoolTag {
        self.tag
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn presentation_time_us(&self) -> u64 {
        self.pts_us
    }

    /// Index assigned by the pool when this instance was created.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The payload (`len` bytes).
    pub fn data(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// The whole backing storage, for reading into.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Mark the first `len` bytes of storage as payload. Clamped to capacity.
    pub fn set_payload(&mut self, len: usize, pts_us: u64) {
        self.len = len.min(self.capacity());
        self.pts_us = pts_us;
    }

    /// Copy `bytes` in as the payload, growing storage if needed.
    pub fn fill_from(&mut self, bytes: &[u8], pts_us: u64) {
        self.ensure_capacity(bytes.len());
        self.storage[..bytes.len()].copy_from_slice(bytes);
        self.set_payload(bytes.len(), pts_us);
    }

    pub fn ensure_capacity(&mut self, capacity: usize) {
        if self.storage.len() < capacity {
            self.storage.resize(capacity, 0);
        }
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.pts_us = 0;
    }

    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            slot: self.slot,
            len: self.len,
            pts_us: self.pts_us,
        }
    }
}
