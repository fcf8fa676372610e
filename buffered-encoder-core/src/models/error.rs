use thiserror::Error;

/// Errors that can occur while configuring, starting or stopping a
/// buffered encoder session.
///
/// Only the caller-facing paths return these. Failures on the capture
/// thread after the session has started are resolved locally and surface
/// as a [`CaptureExit`](crate::models::report::CaptureExit) in the report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("failed to open audio input: {0}")]
    OpenFailed(String),

    #[error("failed to start audio input: {0}")]
    StartFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("failed to spawn {name} thread: {reason}")]
    ThreadSpawn { name: String, reason: String },

    #[error("{0} thread panicked")]
    ThreadPanicked(String),
}

/// Classified failure of a single [`AudioInput::read`](crate::traits::audio_input::AudioInput::read).
///
/// Everything except [`ReadError::DeadObject`] is recoverable: the capture
/// loop retries up to its error budget.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadError {
    #[error("read error: bad value")]
    BadValue,

    #[error("read error: generic failure")]
    Generic,

    #[error("read error: invalid operation")]
    InvalidOperation,

    /// The device disappeared; the input must be reopened.
    #[error("read error: device gone")]
    DeadObject,

    #[error("read error: unknown code {0}")]
    Unknown(i32),
}

impl ReadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeadObject)
    }
}

/// Returned by a frame listener to ask for its own removal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("frame listener failed: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dead_object_is_fatal() {
        assert!(ReadError::DeadObject.is_fatal());
        for err in [
            ReadError::BadValue,
            ReadError::Generic,
            ReadError::InvalidOperation,
            ReadError::Unknown(-42),
        ] {
            assert!(!err.is_fatal(), "{err} should be recoverable");
        }
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            CaptureError::OpenFailed("busy".into()).to_string(),
            "failed to open audio input: busy"
        );
        assert_eq!(
            CaptureError::ThreadSpawn {
                name: "audio-capture".into(),
                reason: "oom".into()
            }
            .to_string(),
            "failed to spawn audio-capture thread: oom"
        );
        assert_eq!(ReadError::Unknown(-7).to_string(), "read error: unknown code -7");
        assert_eq!(
            ListenerError::new("closed").to_string(),
            "frame listener failed: closed"
        );
    }
}
