//! Deterministic audio backend that replays a script of read outcomes.
//!
//! Lets the whole pipeline run without audio hardware, which keeps tests
//! and CI independent of the host's devices.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::ThreadPriority;
use crate::models::error::{CaptureError, ReadError};
use crate::traits::audio_input::{AudioBackend, AudioInput, InputParams, RecordingState};

/// One scripted outcome, consumed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A read returning these bytes (truncated to the read size).
    Data(Vec<u8>),
    /// A read returning zero bytes.
    Empty,
    /// A read failing with the given error.
    Error(ReadError),
    /// One state check reporting [`RecordingState::Stopped`].
    NotRecording,
    /// A read that blocks for the duration, then returns zero bytes.
    Stall(Duration),
}

impl ScriptStep {
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data(bytes.into())
    }
}

/// Behavior once the script has been fully consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptEnd {
    /// Every read fills the buffer with zeros.
    Silence,
    /// Every read returns zero bytes.
    #[default]
    Empty,
    /// Every read reports the device as gone.
    DeviceGone,
    /// The input reports it is no longer recording.
    NotRecording,
}

/// Calls observed by a [`ScriptedBackend`] and its inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptLog {
    pub opened: Vec<InputParams>,
    pub starts: u32,
    pub stops: u32,
    pub releases: u32,
    pub reads: u64,
    pub priority: Option<ThreadPriority>,
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    end: ScriptEnd,
    log: ScriptLog,
}

/// [`AudioBackend`] replaying a fixed sequence of [`ScriptStep`]s.
///
/// The script is shared by every input the backend opens, so a second
/// session continues where the first left off.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
    open_error: Option<CaptureError>,
    start_error: Option<CaptureError>,
    read_delay: Duration,
}

impl ScriptedBackend {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                steps: steps.into_iter().collect(),
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    pub fn ending_with(self, end: ScriptEnd) -> Self {
        self.state.lock().end = end;
        self
    }

    /// Delay applied to every read, emulating a blocking hardware read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn failing_open(mut self, error: CaptureError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn failing_start(mut self, error: CaptureError) -> Self {
        self.start_error = Some(error);
        self
    }

    /// Append more steps to the script.
    pub fn push_steps(&self, steps: impl IntoIterator<Item = ScriptStep>) {
        self.state.lock().steps.extend(steps);
    }

    pub fn remaining_steps(&self) -> usize {
        self.state.lock().steps.len()
    }

    pub fn log(&self) -> ScriptLog {
        self.state.lock().log.clone()
    }
}

impl AudioBackend for ScriptedBackend {
    type Input = ScriptedInput;

    fn open(&self, params: &InputParams) -> Result<Self::Input, CaptureError> {
        if let Some(ref error) = self.open_error {
            return Err(error.clone());
        }
        self.state.lock().log.opened.push(params.clone());
        Ok(ScriptedInput {
            state: Arc::clone(&self.state),
            start_error: self.start_error.clone(),
            read_delay: self.read_delay,
        })
    }

    fn elevate_current_thread(&self, priority: ThreadPriority) -> Result<(), CaptureError> {
        self.state.lock().log.priority = Some(priority);
        Ok(())
    }
}

/// Input handle produced by [`ScriptedBackend::open`].
#[derive(Debug)]
pub struct ScriptedInput {
    state: Arc<Mutex<ScriptState>>,
    start_error: Option<CaptureError>,
    read_delay: Duration,
}

impl AudioInput for ScriptedInput {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.state.lock().log.starts += 1;
        match self.start_error {
            Some(ref error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.state.lock().log.stops += 1;
    }

    fn release(&mut self) {
        self.state.lock().log.releases += 1;
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }

        let (step, end) = {
            let mut state = self.state.lock();
            state.log.reads += 1;
            (state.steps.pop_front(), state.end)
        };

        match step {
            Some(ScriptStep::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(ScriptStep::Error(error)) => Err(error),
            Some(ScriptStep::Stall(duration)) => {
                thread::sleep(duration);
                Ok(0)
            }
            Some(ScriptStep::Empty) | Some(ScriptStep::NotRecording) => Ok(0),
            None => match end {
                ScriptEnd::Silence => {
                    buf.fill(0);
                    Ok(buf.len())
                }
                ScriptEnd::Empty | ScriptEnd::NotRecording => Ok(0),
                ScriptEnd::DeviceGone => Err(ReadError::DeadObject),
            },
        }
    }

    fn recording_state(&self) -> RecordingState {
        let mut state = self.state.lock();
        match state.steps.front() {
            Some(ScriptStep::NotRecording) => {
                state.steps.pop_front();
                RecordingState::Stopped
            }
            None if state.end == ScriptEnd::NotRecording => RecordingState::Stopped,
            _ => RecordingState::Recording,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::CaptureConfiguration;

    fn open(backend: &ScriptedBackend) -> ScriptedInput {
        backend
            .open(&CaptureConfiguration::default().input_params())
            .unwrap()
    }

    #[test]
    fn replays_steps_in_order() {
        let backend = ScriptedBackend::new([
            ScriptStep::data([1u8, 2, 3]),
            ScriptStep::Empty,
            ScriptStep::Error(ReadError::BadValue),
        ])
        .ending_with(ScriptEnd::DeviceGone);
        let mut input = open(&backend);
        let mut buf = [0u8; 8];

        assert_eq!(input.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(input.read(&mut buf), Ok(0));
        assert_eq!(input.read(&mut buf), Err(ReadError::BadValue));
        assert_eq!(input.read(&mut buf), Err(ReadError::DeadObject));
        assert_eq!(backend.log().reads, 4);
    }

    #[test]
    fn data_is_truncated_to_read_size() {
        let backend = ScriptedBackend::new([ScriptStep::data(vec![7u8; 16])]);
        let mut input = open(&backend);
        let mut buf = [0u8; 4];
        assert_eq!(input.read(&mut buf), Ok(4));
    }

    #[test]
    fn not_recording_is_consumed_by_state_check() {
        let backend = ScriptedBackend::new([ScriptStep::NotRecording, ScriptStep::data([5u8])]);
        let mut input = open(&backend);
        assert_eq!(input.recording_state(), RecordingState::Stopped);
        assert_eq!(input.recording_state(), RecordingState::Recording);
        assert_eq!(input.read(&mut [0u8; 2]), Ok(1));
    }

    #[test]
    fn silence_tail_fills_buffer() {
        let backend = ScriptedBackend::new([]).ending_with(ScriptEnd::Silence);
        let mut input = open(&backend);
        let mut buf = [9u8; 6];
        assert_eq!(input.read(&mut buf), Ok(6));
        assert_eq!(buf, [0u8; 6]);
    }

    #[test]
    fn records_lifecycle_calls() {
        let backend = ScriptedBackend::new([]);
        let mut input = open(&backend);
        input.start().unwrap();
        input.stop();
        input.release();
        backend.elevate_current_thread(ThreadPriority::UrgentAudio).unwrap();

        let log = backend.log();
        assert_eq!(log.opened.len(), 1);
        assert_eq!(log.opened[0].sample_rate, 44100);
        assert_eq!((log.starts, log.stops, log.releases), (1, 1, 1));
        assert_eq!(log.priority, Some(ThreadPriority::UrgentAudio));
    }

    #[test]
    fn injected_failures() {
        let params = CaptureConfiguration::default().input_params();
        let backend = ScriptedBackend::new([]).failing_open(CaptureError::DeviceNotAvailable);
        assert_eq!(backend.open(&params).unwrap_err(), CaptureError::DeviceNotAvailable);

        let backend =
            ScriptedBackend::new([]).failing_start(CaptureError::StartFailed("busy".into()));
        let mut input = backend.open(&params).unwrap();
        assert!(input.start().is_err());
    }
}
