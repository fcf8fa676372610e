use super::error::CaptureError;
use super::report::SessionReport;

/// Session state machine.
///
/// State transitions:
/// ```text
/// idle → capturing → stopping → completed → idle
///   ↓
/// failed (start error) → idle on next start
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopping,
    Completed(Box<SessionReport>),
    Failed(CaptureError),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Whether a new session may be started from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Completed(_) | Self::Failed(_))
    }
}
