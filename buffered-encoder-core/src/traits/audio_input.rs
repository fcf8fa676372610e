use crate::models::config::{SampleFormat, ThreadPriority};
use crate::models::error::{CaptureError, ReadError};

/// Parameters handed to [`AudioBackend::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputParams {
    pub source_id: String,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub format: SampleFormat,
    /// Suggested size in bytes of the input's internal buffer.
    pub buffer_size_hint: usize,
}

/// Reported state of an opened input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    Recording,
    Stopped,
}

/// An opened platform capture stream.
///
/// Owned by the capture thread for the whole session, so it only needs to
/// be `Send`. `read` is allowed to block until data is available.
pub trait AudioInput: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self);

    /// Release the underlying handle. Called exactly once, after `stop`.
    fn release(&mut self);

    /// Read up to `buf.len()` bytes of PCM data.
    ///
    /// `Ok(0)` means "no error, no data".
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;

    fn recording_state(&self) -> RecordingState;
}

/// Factory for platform capture streams.
///
/// Implemented by platform backends (AudioRecord, WASAPI, Core Audio...)
/// and by [`ScriptedBackend`](crate::backends::scripted::ScriptedBackend)
/// for hardware-free runs.
pub trait AudioBackend: Send + Sync {
    type Input: AudioInput + 'static;

    fn open(&self, params: &InputParams) -> Result<Self::Input, CaptureError>;

    /// Raise the scheduling priority of the calling thread.
    ///
    /// Invoked from the capture thread before its first read. The default
    /// leaves the thread untouched.
    fn elevate_current_thread(&self, _priority: ThreadPriority) -> Result<(), CaptureError> {
        Ok(())
    }
}
