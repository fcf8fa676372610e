use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::clock::{MonotonicClock, SystemClock};

/// Presentation-timestamp source shared by capture and padding.
///
/// Never hands out a value smaller than one it already returned, even if
/// the underlying clock steps backwards.
pub struct PtsSource {
    clock: Arc<dyn MonotonicClock>,
    last_us: AtomicU64,
}

impl PtsSource {
    pub fn new(clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            clock,
            last_us: AtomicU64::new(0),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }

    pub fn next_us(&self) -> u64 {
        let now = self.clock.now_us();
        let previous = self.last_us.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }

    /// Last timestamp handed out (0 before the first call).
    pub fn last_us(&self) -> u64 {
        self.last_us.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for PtsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtsSource")
            .field("last_us", &self.last_us())
            .finish_non_exhaustive()
    }
}
