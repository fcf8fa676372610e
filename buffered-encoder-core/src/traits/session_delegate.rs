use crate::models::error::CaptureError;
use crate::models::report::{CaptureExit, SessionReport};
use crate::models::state::SessionState;

/// Event delegate for session notifications.
///
/// `on_capture_ended` fires on the capture thread; everything else fires on
/// the thread calling into the session. Implementations must not block.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &SessionState);

    /// Called when the capture loop exits, after the input is released.
    fn on_capture_ended(&self, exit: CaptureExit);

    /// Called when a session fails to start.
    fn on_error(&self, error: &CaptureError);

    /// Called once both worker threads have been joined.
    fn on_session_finished(&self, report: &SessionReport);
}
