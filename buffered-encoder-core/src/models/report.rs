use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::error::CaptureError;

/// Why the capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureExit {
    /// Stop was requested (or `capturing` was cleared) by the session owner.
    #[default]
    StopRequested,
    /// The input stayed out of the recording state past the retry budget.
    NotRecording,
    /// Recoverable read errors exceeded the retry budget.
    TooManyReadErrors,
    /// The device disappeared mid-session.
    DeviceGone,
}

impl CaptureExit {
    /// Whether the session ended because capture could not continue.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StopRequested)
    }
}

/// Counters collected by the capture thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub buffers_enqueued: u64,
    pub bytes_captured: u64,
    pub empty_reads: u64,
    pub read_errors: u64,
    pub not_recording_polls: u64,
    pub queue_rejections: u64,
    pub pool_exhaustions: u64,
    pub exit: CaptureExit,
}

/// Counters collected by the drain thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainStats {
    /// Real captured frames handed to the encoder, flushed ones included.
    pub frames_delivered: u64,
    /// Frames forwarded by the final flush after the loop ended.
    pub frames_flushed: u64,
    pub padding_frames: u64,
    pub empty_buffers: u64,
    pub poll_timeouts: u64,
    pub encode_errors: u64,
}

/// Summary returned when a session stops.
///
/// Serializable for JSON export next to the encoded output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub started_at: String,
    pub duration_secs: f64,
    pub capture: CaptureStats,
    pub drain: DrainStats,
}

impl SessionReport {
    pub fn new(
        started_at: chrono::DateTime<chrono::Utc>,
        duration_secs: f64,
        capture: CaptureStats,
        drain: DrainStats,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: started_at.to_rfc3339(),
            duration_secs,
            capture,
            drain,
        }
    }

    /// True when the encoder only ever saw synthesized silence.
    pub fn is_silent(&self) -> bool {
        self.drain.frames_delivered == 0 && self.drain.padding_frames > 0
    }

    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::StorageError(format!("failed to serialize report: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::StorageError(format!("failed to parse report: {}", e)))
    }
}
