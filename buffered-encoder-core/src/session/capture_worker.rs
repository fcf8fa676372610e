use std::sync::Arc;
use std::time::Duration;

use crate::models::config::{CaptureConfiguration, ThreadPriority};
use crate::models::error::CaptureError;
use crate::models::report::{CaptureExit, CaptureStats};
use crate::traits::audio_input::{AudioBackend, AudioInput, InputParams, RecordingState};
use crate::traits::session_delegate::SessionDelegate;

use super::pipeline::Pipeline;

/// Capture-loop tuning taken from [`CaptureConfiguration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub frame_bytes: usize,
    pub max_not_recording: u32,
    pub max_read_errors: u32,
    pub retry_wait: Duration,
    pub priority: ThreadPriority,
}

impl From<&CaptureConfiguration> for CaptureSettings {
    fn from(config: &CaptureConfiguration) -> Self {
        Self {
            frame_bytes: config.frame_bytes,
            max_not_recording: config.max_not_recording,
            max_read_errors: config.max_read_errors,
            retry_wait: config.retry_wait,
            priority: config.producer_priority,
        }
    }
}

/// Producer side of the pipeline.
///
/// Owns the opened input for one session, packs each read into a pooled
/// buffer and queues it for the drain thread. Read failures are resolved
/// here and never cross the thread boundary:
///
/// ```text
/// Ok(n > 0)           → stamp, enqueue, reset error count
/// Ok(0)               → recycle, reset error count
/// recoverable error   → recycle, count; exit after max_read_errors
/// device gone         → recycle, exit
/// not recording       → count, wait, retry; exit after max_not_recording
/// ```
pub struct CaptureWorker<B: AudioBackend> {
    backend: Arc<B>,
    input: B::Input,
    pipeline: Pipeline,
    settings: CaptureSettings,
    delegate: Option<Arc<dyn SessionDelegate>>,
    released: bool,
}

impl<B: AudioBackend> CaptureWorker<B> {
    /// Open and start the input.
    ///
    /// Either failure is fatal for the session: nothing is retried and the
    /// input, if it was opened, is released before returning.
    pub fn open(
        backend: Arc<B>,
        params: &InputParams,
        pipeline: Pipeline,
        settings: CaptureSettings,
    ) -> Result<Self, CaptureError> {
        let input = backend.open(params)?;
        let mut worker = Self {
            backend,
            input,
            pipeline,
            settings,
            delegate: None,
            released: false,
        };
        worker.input.start()?;
        Ok(worker)
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Run the capture loop until stopped or capture fails.
    ///
    /// Always stops and releases the input and clears `capturing` before
    /// returning.
    pub fn run(mut self) -> CaptureStats {
        if let Err(e) = self.backend.elevate_current_thread(self.settings.priority) {
            log::warn!("could not raise capture thread priority: {}", e);
        }

        let mut stats = CaptureStats::default();
        stats.exit = self.capture_loop(&mut stats);
        self.release_input();
        self.pipeline.flags.clear_capturing();

        match stats.exit {
            CaptureExit::StopRequested => log::debug!(
                "capture finished: {} frames queued, {} read errors",
                stats.buffers_enqueued,
                stats.read_errors
            ),
            exit => log::error!("capture ended early: {:?}", exit),
        }
        if let Some(ref delegate) = self.delegate {
            delegate.on_capture_ended(stats.exit);
        }
        stats
    }

    fn capture_loop(&mut self, stats: &mut CaptureStats) -> CaptureExit {
        let Pipeline {
            pool, queue, flags, pts,
        } = self.pipeline.clone();
        let frame_bytes = self.settings.frame_bytes;
        let mut error_count: u32 = 0;
        let mut saturated = false;
        let mut exhausted = false;

        while flags.should_run() {
            if self.input.recording_state() != RecordingState::Recording {
                if error_count == 0 {
                    log::warn!("audio input is not in the recording state");
                }
                error_count += 1;
                stats.not_recording_polls += 1;
                if error_count > self.settings.max_not_recording {
                    return CaptureExit::NotRecording;
                }
                flags.wait_unless_stopped(self.settings.retry_wait);
                continue;
            }

            let Some(mut buffer) = pool.obtain(frame_bytes) else {
                stats.pool_exhaustions += 1;
                if !exhausted {
                    log::warn!("buffer pool exhausted ({} buffers in flight)", pool.checked_out());
                    exhausted = true;
                }
                flags.wait_unless_stopped(self.settings.retry_wait);
                continue;
            };
            exhausted = false;

            match self.input.read(&mut buffer.storage_mut()[..frame_bytes]) {
                Ok(0) => {
                    error_count = 0;
                    stats.empty_reads += 1;
                    pool.recycle(buffer);
                }
                Ok(read) => {
                    error_count = 0;
                    let read = read.min(frame_bytes);
                    buffer.set_payload(read, pts.next_us());
                    match queue.queue_frame(buffer) {
                        Ok(()) => {
                            if saturated {
                                log::info!("media queue drained, frames flowing again");
                                saturated = false;
                            }
                            stats.buffers_enqueued += 1;
                            stats.bytes_captured += read as u64;
                        }
                        Err(full) => {
                            if !saturated {
                                log::warn!(
                                    "media queue saturated at {} frames, dropping newest",
                                    queue.max_depth()
                                );
                                saturated = true;
                            }
                            stats.queue_rejections += 1;
                            pool.recycle(full.into_buffer());
                        }
                    }
                }
                Err(e) if e.is_fatal() => {
                    log::error!("{}", e);
                    pool.recycle(buffer);
                    return CaptureExit::DeviceGone;
                }
                Err(e) => {
                    if error_count == 0 {
                        log::warn!("{}", e);
                    }
                    error_count += 1;
                    stats.read_errors += 1;
                    pool.recycle(buffer);
                    if error_count > self.settings.max_read_errors {
                        return CaptureExit::TooManyReadErrors;
                    }
                }
            }
        }
        CaptureExit::StopRequested
    }

    fn release_input(&mut self) {
        if !self.released {
            self.input.stop();
            self.input.release();
            self.released = true;
        }
    }
}

impl<B: AudioBackend> Drop for CaptureWorker<B> {
    fn drop(&mut self) {
        // Covers a failed start and a worker that never got its thread.
        self.release_input();
    }
}
