use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::ListenerError;

/// What the drain thread just handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEvent {
    pub pts_us: u64,
    pub len: usize,
    /// True for synthesized silence.
    pub padding: bool,
}

/// Frame-available callback. Returning `Err` unsubscribes it.
pub type FrameListener = Arc<dyn Fn(&FrameEvent) -> Result<(), ListenerError> + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct NotifierInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, FrameListener)>>,
}

/// Fan-out set of frame-available listeners.
///
/// Cheap to clone; clones share the same listener set. A failing listener
/// is dropped without affecting the others, and listeners run without the
/// internal lock held.
#[derive(Clone, Default)]
pub struct FrameNotifier {
    inner: Arc<NotifierInner>,
}

impl FrameNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&FrameEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener. Returns how many accepted it.
    pub fn notify(&self, event: &FrameEvent) -> usize {
        let snapshot: Vec<(SubscriptionId, FrameListener)> = self.inner.listeners.lock().clone();
        if snapshot.is_empty() {
            return 0;
        }

        let mut failed = Vec::new();
        for (id, listener) in &snapshot {
            if let Err(e) = listener(event) {
                log::warn!("removing frame listener {:?}: {}", id, e);
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            self.inner
                .listeners
                .lock()
                .retain(|(id, _)| !failed.contains(id));
        }
        snapshot.len() - failed.len()
    }
}

impl std::fmt::Debug for FrameNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameNotifier")
            .field("listeners", &self.len())
            .finish()
    }
}
