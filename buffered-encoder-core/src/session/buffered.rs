use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::report::{CaptureStats, DrainStats, SessionReport};
use crate::models::state::SessionState;
use crate::traits::audio_input::AudioBackend;
use crate::traits::clock::{MonotonicClock, SystemClock};
use crate::traits::encoder::FrameEncoder;
use crate::traits::session_delegate::SessionDelegate;

use super::capture_worker::{CaptureSettings, CaptureWorker};
use super::drain_worker::{DrainSettings, DrainWorker};
use super::flags::SessionFlags;
use super::notifier::FrameNotifier;
use super::pipeline::Pipeline;

const CAPTURE_THREAD: &str = "audio-capture";
const DRAIN_THREAD: &str = "audio-dequeue";

/// Handles for the session currently in flight.
struct RunningSession {
    pipeline: Pipeline,
    capture: Option<thread::JoinHandle<CaptureStats>>,
    drain: Option<thread::JoinHandle<DrainStats>>,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Session orchestrator for a buffered capture → encode pipeline.
///
/// Generic over the audio backend and the frame encoder. Each session gets
/// a fresh pool and queue and exactly two threads:
/// ```text
/// [AudioInput] → audio-capture → [MediaQueue] → audio-dequeue → [FrameEncoder]
///                     ↑                                 │
///                     └────────── [BufferPool] ←────────┘
/// ```
/// The encoder is handed to the drain thread for the length of a session
/// and returned on [`stop`](Self::stop).
pub struct BufferedAudioEncoder<B: AudioBackend + 'static, E: FrameEncoder + 'static> {
    backend: Arc<B>,
    encoder: Arc<Mutex<Option<E>>>,
    config: CaptureConfiguration,
    clock: Arc<dyn MonotonicClock>,
    flags: Arc<SessionFlags>,
    notifier: FrameNotifier,
    delegate: Option<Arc<dyn SessionDelegate>>,
    state: Mutex<SessionState>,
    running: Option<RunningSession>,
}

impl<B: AudioBackend + 'static, E: FrameEncoder + 'static> BufferedAudioEncoder<B, E> {
    pub fn new(backend: B, encoder: E, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        Self::with_clock(backend, encoder, config, Arc::new(SystemClock::new()))
    }

    /// Like [`new`](Self::new) but timestamps come from `clock`.
    pub fn with_clock(
        backend: B,
        encoder: E,
        config: CaptureConfiguration,
        clock: Arc<dyn MonotonicClock>,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            backend: Arc::new(backend),
            encoder: Arc::new(Mutex::new(Some(encoder))),
            config,
            clock,
            flags: Arc::new(SessionFlags::new()),
            notifier: FrameNotifier::new(),
            delegate: None,
            state: Mutex::new(SessionState::Idle),
            running: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Listener registry fired for every frame handed to the encoder.
    pub fn frame_notifier(&self) -> &FrameNotifier {
        &self.notifier
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// True while a session is running and its capture thread is still
    /// pulling audio.
    pub fn is_capturing(&self) -> bool {
        self.running.is_some() && self.flags.is_capturing()
    }

    /// The encoder, unless a session currently owns it.
    pub fn encoder(&self) -> Option<MappedMutexGuard<'_, E>> {
        MutexGuard::try_map(self.encoder.lock(), |slot| slot.as_mut()).ok()
    }

    /// Stop any running session and hand back the encoder.
    pub fn into_encoder(mut self) -> Option<E> {
        self.shutdown();
        self.encoder.lock().take()
    }

    /// Open the input and spawn the capture and drain threads.
    ///
    /// Open and start failures are returned here and leave the session in
    /// [`SessionState::Failed`]. Transitions: idle → capturing.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        {
            let state = self.state.lock();
            if self.running.is_some() || !state.can_start() {
                return Err(CaptureError::InvalidState(format!(
                    "cannot start from {:?}",
                    *state
                )));
            }
        }
        if self.encoder.lock().is_none() {
            return Err(CaptureError::InvalidState("encoder not available".into()));
        }

        self.flags.mark_capturing();
        let pipeline = Pipeline::new(&self.config, Arc::clone(&self.clock), Arc::clone(&self.flags));

        let params = self.config.input_params();
        let mut capture = match CaptureWorker::open(
            Arc::clone(&self.backend),
            &params,
            pipeline.clone(),
            CaptureSettings::from(&self.config),
        ) {
            Ok(worker) => worker,
            Err(e) => {
                self.flags.clear_capturing();
                pipeline.teardown();
                return Err(self.fail(e));
            }
        };
        if let Some(ref delegate) = self.delegate {
            capture.set_delegate(Arc::clone(delegate));
        }

        let started_at = Utc::now();
        let started = Instant::now();

        let capture = match thread::Builder::new()
            .name(CAPTURE_THREAD.into())
            .spawn(move || capture.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                self.flags.clear_capturing();
                pipeline.teardown();
                return Err(self.fail(spawn_error(CAPTURE_THREAD, e)));
            }
        };

        let drain = match self.spawn_drain(pipeline.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                self.flags.request_stop();
                if capture.join().is_err() {
                    log::error!("{} thread panicked during failed start", CAPTURE_THREAD);
                }
                pipeline.teardown();
                return Err(self.fail(e));
            }
        };

        self.running = Some(RunningSession {
            pipeline,
            capture: Some(capture),
            drain: Some(drain),
            started_at,
            started,
        });
        log::info!(
            "capture session started: {} Hz, {} ch, {} byte frames",
            self.config.sample_rate,
            self.config.channels,
            self.config.frame_bytes
        );
        self.set_state(SessionState::Capturing);
        Ok(())
    }

    /// Stop the session, join both threads and tear down the pool.
    ///
    /// Transitions: capturing → stopping → completed → idle.
    pub fn stop(&mut self) -> Result<SessionReport, CaptureError> {
        let Some(mut session) = self.running.take() else {
            return Err(CaptureError::InvalidState("no session is running".into()));
        };
        self.set_state(SessionState::Stopping);
        self.flags.request_stop();

        let capture = join(session.capture.take(), CAPTURE_THREAD);
        let drain = join(session.drain.take(), DRAIN_THREAD);

        let leftover = session.pipeline.teardown();
        if leftover > 0 {
            log::debug!("recycled {} frames left in the queue", leftover);
        }
        self.flags.clear_capturing();

        let (capture, drain) = match (capture, drain) {
            (Ok(capture), Ok(drain)) => (capture, drain),
            (Err(e), _) | (_, Err(e)) => {
                self.set_state(SessionState::Failed(e.clone()));
                if let Some(ref delegate) = self.delegate {
                    delegate.on_error(&e);
                }
                return Err(e);
            }
        };

        let duration = session.started.elapsed().as_secs_f64();
        let report = SessionReport::new(session.started_at, duration, capture, drain);
        log::info!(
            "capture session stopped after {:.2}s: {} frames encoded, {} padding, exit {:?}",
            duration,
            report.drain.frames_delivered,
            report.drain.padding_frames,
            report.capture.exit
        );

        self.set_state(SessionState::Completed(Box::new(report.clone())));
        if let Some(ref delegate) = self.delegate {
            delegate.on_session_finished(&report);
        }

        // Reset for next session
        *self.state.lock() = SessionState::Idle;
        Ok(report)
    }

    /// The encoder leaves the shared slot before the thread exists, so
    /// `encoder()` never contends with the drain thread for it.
    fn spawn_drain(&self, pipeline: Pipeline) -> Result<thread::JoinHandle<DrainStats>, CaptureError> {
        let encoder = self
            .encoder
            .lock()
            .take()
            .ok_or_else(|| CaptureError::InvalidState("encoder not available".into()))?;
        let handoff = Arc::new(Mutex::new(Some(encoder)));

        let slot = Arc::clone(&self.encoder);
        let pending = Arc::clone(&handoff);
        let notifier = self.notifier.clone();
        let settings = DrainSettings::from(&self.config);

        let spawned = thread::Builder::new().name(DRAIN_THREAD.into()).spawn(move || {
            let Some(encoder) = pending.lock().take() else {
                log::error!("drain thread started without an encoder");
                return DrainStats::default();
            };
            let (encoder, stats) = DrainWorker::new(encoder, pipeline, notifier, settings).run();
            *slot.lock() = Some(encoder);
            stats
        });

        spawned.map_err(|e| {
            // The closure never ran; put the encoder back.
            *self.encoder.lock() = handoff.lock().take();
            spawn_error(DRAIN_THREAD, e)
        })
    }

    fn shutdown(&mut self) {
        if self.running.is_some() {
            if let Err(e) = self.stop() {
                log::error!("failed to stop capture session: {}", e);
            }
        }
    }

    fn fail(&self, error: CaptureError) -> CaptureError {
        log::error!("failed to start capture session: {}", error);
        self.set_state(SessionState::Failed(error.clone()));
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
        error
    }

    fn set_state(&self, new_state: SessionState) {
        *self.state.lock() = new_state.clone();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

impl<B: AudioBackend + 'static, E: FrameEncoder + 'static> Drop for BufferedAudioEncoder<B, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_error(name: &str, error: std::io::Error) -> CaptureError {
    CaptureError::ThreadSpawn {
        name: name.into(),
        reason: error.to_string(),
    }
}

fn join<T>(handle: Option<thread::JoinHandle<T>>, name: &str) -> Result<T, CaptureError> {
    handle
        .ok_or_else(|| CaptureError::InvalidState(format!("{} thread missing", name)))?
        .join()
        .map_err(|_| CaptureError::ThreadPanicked(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scripted::{ScriptEnd, ScriptStep, ScriptedBackend};
    use crate::models::report::CaptureExit;
    use crate::traits::clock::ManualClock;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        frames: Vec<(usize, u64)>,
    }

    impl FrameEncoder for Collect {
        fn encode(&mut self, data: &[u8], pts_us: u64) -> Result<(), CaptureError> {
            self.frames.push((data.len(), pts_us));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Events {
        states: Mutex<Vec<String>>,
        exits: Mutex<Vec<CaptureExit>>,
        errors: Mutex<Vec<CaptureError>>,
        reports: Mutex<usize>,
    }

    impl SessionDelegate for Events {
        fn on_state_changed(&self, state: &SessionState) {
            let name = match state {
                SessionState::Idle => "idle",
                SessionState::Capturing => "capturing",
                SessionState::Stopping => "stopping",
                SessionState::Completed(_) => "completed",
                SessionState::Failed(_) => "failed",
            };
            self.states.lock().push(name.into());
        }

        fn on_capture_ended(&self, exit: CaptureExit) {
            self.exits.lock().push(exit);
        }

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }

        fn on_session_finished(&self, _report: &SessionReport) {
            *self.reports.lock() += 1;
        }
    }

    fn config() -> CaptureConfiguration {
        CaptureConfiguration {
            frame_bytes: 320,
            pool_initial: 0,
            pool_max: 16,
            queue_depth: 16,
            retry_wait: Duration::from_millis(1),
            poll_timeout: Duration::from_millis(5),
            padding_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn session(backend: ScriptedBackend) -> BufferedAudioEncoder<ScriptedBackend, Collect> {
        BufferedAudioEncoder::with_clock(backend, Collect::default(), config(), Arc::new(ManualClock::new(0)))
            .unwrap()
    }

    fn wait_for_exit(session: &BufferedAudioEncoder<ScriptedBackend, Collect>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_capturing() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = CaptureConfiguration {
            frame_bytes: 321,
            ..Default::default()
        };
        let result = BufferedAudioEncoder::new(ScriptedBackend::new(vec![]), Collect::default(), config);
        assert!(matches!(result, Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn full_session_encodes_and_returns_to_idle() {
        let backend = ScriptedBackend::new(vec![
            ScriptStep::data(vec![1; 320]),
            ScriptStep::data(vec![2; 320]),
        ])
        .ending_with(ScriptEnd::DeviceGone);
        let mut session = session(backend);
        let events = Arc::new(Events::default());
        session.set_delegate(events.clone());

        session.start().unwrap();
        assert!(matches!(session.state(), SessionState::Capturing));
        wait_for_exit(&session);
        let report = session.stop().unwrap();

        assert_eq!(report.capture.exit, CaptureExit::DeviceGone);
        assert_eq!(report.capture.buffers_enqueued, 2);
        assert_eq!(report.drain.frames_delivered, 2);
        assert_eq!(report.drain.padding_frames, 0);
        assert!(session.state().is_idle());
        assert_eq!(session.encoder().unwrap().frames.len(), 2);

        assert_eq!(
            *events.states.lock(),
            vec!["capturing", "stopping", "completed"]
        );
        assert_eq!(*events.exits.lock(), vec![CaptureExit::DeviceGone]);
        assert_eq!(*events.reports.lock(), 1);

        let log = session.backend().log();
        assert_eq!(log.starts, 1);
        assert_eq!(log.releases, 1);
    }

    #[test]
    fn open_failure_leaves_failed_state() {
        let backend = ScriptedBackend::new(vec![]).failing_open(CaptureError::DeviceNotAvailable);
        let mut session = session(backend);
        let events = Arc::new(Events::default());
        session.set_delegate(events.clone());

        let err = session.start().unwrap_err();
        assert_eq!(err, CaptureError::DeviceNotAvailable);
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert!(!session.is_capturing());
        assert_eq!(*events.errors.lock(), vec![CaptureError::DeviceNotAvailable]);
        assert!(session.encoder().is_some());
        assert!(matches!(session.stop(), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn cannot_start_twice() {
        let backend = ScriptedBackend::new(vec![]).ending_with(ScriptEnd::Silence);
        let mut session = session(backend);
        session.start().unwrap();
        assert!(session.encoder().is_none());
        assert!(matches!(session.start(), Err(CaptureError::InvalidState(_))));
        session.stop().unwrap();
        assert!(session.encoder().is_some());
    }

    #[test]
    fn session_owns_encoder_until_stopped() {
        let backend = ScriptedBackend::new(vec![])
            .ending_with(ScriptEnd::Silence)
            .with_read_delay(Duration::from_millis(1));
        let mut session = session(backend);
        session.start().unwrap();

        let deadline = Instant::now() + Duration::from_millis(30);
        while Instant::now() < deadline {
            assert!(session.encoder().is_none());
            thread::sleep(Duration::from_millis(2));
        }
        let report = session.stop().unwrap();

        assert_eq!(report.capture.queue_rejections, 0);
        assert_eq!(report.drain.frames_delivered, report.capture.buffers_enqueued);
        assert_eq!(
            session.encoder().unwrap().frames.len() as u64,
            report.drain.frames_delivered
        );
    }

    #[test]
    fn silent_session_is_padded() {
        let backend = ScriptedBackend::new(vec![]).ending_with(ScriptEnd::DeviceGone);
        let mut session = session(backend);
        session.start().unwrap();
        wait_for_exit(&session);
        let report = session.stop().unwrap();

        assert!(report.is_silent());
        assert_eq!(report.drain.padding_frames, 5);
        let encoder = session.into_encoder().unwrap();
        assert_eq!(encoder.frames.len(), 5);
        assert!(encoder.frames.iter().all(|(len, _)| *len == 320));
    }

    #[test]
    fn restarts_after_completion() {
        let backend = ScriptedBackend::new(vec![ScriptStep::data(vec![3; 320])]).ending_with(ScriptEnd::DeviceGone);
        let mut session = session(backend);

        session.start().unwrap();
        wait_for_exit(&session);
        session.stop().unwrap();

        session
            .backend()
            .push_steps(vec![ScriptStep::data(vec![4; 320]), ScriptStep::data(vec![5; 320])]);
        session.start().unwrap();
        wait_for_exit(&session);
        let report = session.stop().unwrap();

        assert_eq!(report.drain.frames_delivered, 2);
        assert_eq!(session.encoder().unwrap().frames.len(), 3);
        assert_eq!(session.backend().log().opened.len(), 2);
    }

    #[test]
    fn drop_stops_running_session() {
        let backend = ScriptedBackend::new(vec![]).ending_with(ScriptEnd::Silence);
        let probe = Arc::new(Events::default());
        {
            let mut session = session(backend);
            session.set_delegate(probe.clone());
            session.start().unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*probe.exits.lock(), vec![CaptureExit::StopRequested]);
        assert_eq!(*probe.reports.lock(), 1);
    }
}
