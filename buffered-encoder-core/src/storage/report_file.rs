use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::report::SessionReport;

/// Sidecar path for a recording: `{recording}.report.json`.
pub fn report_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("report.json")
}

/// Write a session report as a JSON sidecar next to the recording.
pub fn write_report(report: &SessionReport, recording_path: &Path) -> Result<PathBuf, CaptureError> {
    let path = report_path(recording_path);
    fs::write(&path, report.to_json()?)
        .map_err(|e| CaptureError::StorageError(format!("failed to write report: {}", e)))?;
    Ok(path)
}

/// Read a session report back from its JSON sidecar.
pub fn read_report(recording_path: &Path) -> Result<SessionReport, CaptureError> {
    let json = fs::read_to_string(report_path(recording_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read report: {}", e)))?;
    SessionReport::from_json(&json)
}
