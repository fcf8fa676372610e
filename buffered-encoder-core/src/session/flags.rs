use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Shared `capturing` / `stop_requested` pair read by both worker threads.
///
/// Waits go through [`wait_unless_stopped`](Self::wait_unless_stopped) so a
/// stop request cuts retry pauses short.
#[derive(Debug, Default)]
pub struct SessionFlags {
    capturing: AtomicBool,
    stop_requested: AtomicBool,
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// `capturing && !stop_requested`: the loop condition of both workers.
    pub fn should_run(&self) -> bool {
        self.is_capturing() && !self.is_stop_requested()
    }

    pub fn mark_capturing(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.capturing.store(true, Ordering::SeqCst);
    }

    pub fn clear_capturing(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.wake_all();
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake_all();
    }

    /// Sleep for up to `timeout`, returning early once the session should
    /// no longer run. Returns whether the session should still run.
    pub fn wait_unless_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.wake_lock.lock();
        while self.should_run() {
            if self.wake.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.should_run()
    }

    fn wake_all(&self) {
        let _guard = self.wake_lock.lock();
        self.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn run_condition() {
        let flags = SessionFlags::new();
        assert!(!flags.should_run());
        flags.mark_capturing();
        assert!(flags.should_run());
        flags.request_stop();
        assert!(!flags.should_run());
        assert!(flags.is_capturing());
    }

    #[test]
    fn mark_capturing_resets_stale_stop() {
        let flags = SessionFlags::new();
        flags.request_stop();
        flags.mark_capturing();
        assert!(flags.should_run());
    }

    #[test]
    fn wait_runs_full_timeout_while_capturing() {
        let flags = SessionFlags::new();
        flags.mark_capturing();
        let started = Instant::now();
        assert!(flags.wait_unless_stopped(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn stop_interrupts_wait() {
        let flags = Arc::new(SessionFlags::new());
        flags.mark_capturing();
        let stopper = {
            let flags = Arc::clone(&flags);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                flags.request_stop();
            })
        };
        let started = Instant::now();
        assert!(!flags.wait_unless_stopped(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }
}
