use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::processing::wav_format::{WavSpec, MAX_DATA_SIZE, WAV_HEADER_SIZE};
use crate::traits::encoder::FrameEncoder;

/// Frame encoder that streams PCM into a WAV file.
///
/// ```text
/// [44-byte WAV header, sizes patched on finish]
/// [raw PCM frames in arrival order...]
/// ```
///
/// Frames must arrive with non-decreasing timestamps.
pub struct WavFileEncoder {
    file_path: PathBuf,
    spec: WavSpec,
    writer: Option<BufWriter<File>>,
    data_bytes: u64,
    frames: u64,
    last_pts_us: Option<u64>,
}

impl WavFileEncoder {
    /// Create the file (and its directory) and write a placeholder header.
    pub fn create(
        path: impl Into<PathBuf>,
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
    ) -> Result<Self, CaptureError> {
        let spec = WavSpec {
            sample_rate,
            channels,
            bit_depth,
        };
        let header = spec.header(0).ok_or_else(|| {
            CaptureError::ConfigurationFailed(format!(
                "unrepresentable WAV layout: {} Hz, {} ch, {} bit",
                sample_rate, channels, bit_depth
            ))
        })?;

        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(&file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(&header)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;

        Ok(Self {
            file_path,
            spec,
            writer: Some(writer),
            data_bytes: 0,
            frames: 0,
            last_pts_us: None,
        })
    }

    /// Create an encoder matching the capture format of `config`.
    pub fn for_config(path: impl Into<PathBuf>, config: &CaptureConfiguration) -> Result<Self, CaptureError> {
        Self::create(path, config.sample_rate, config.channels, config.format.bit_depth())
    }

    /// Patch the header sizes, flush, and return the file's SHA-256 hex digest.
    pub fn finish(&mut self) -> Result<String, CaptureError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;

        let header = u32::try_from(self.data_bytes)
            .ok()
            .and_then(|data_size| self.spec.header(data_size))
            .ok_or_else(|| CaptureError::StorageError("recording exceeds WAV size limit".into()))?;
        writer
            .seek(SeekFrom::Start(0))
            .and_then(|_| writer.write_all(&header))
            .and_then(|_| writer.flush())
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        drop(writer);

        log::debug!(
            "finished {}: {} frames, {} data bytes",
            self.file_path.display(),
            self.frames,
            self.data_bytes
        );
        sha256_file(&self.file_path)
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Total bytes written so far, header included.
    pub fn bytes_written(&self) -> u64 {
        WAV_HEADER_SIZE as u64 + self.data_bytes
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl FrameEncoder for WavFileEncoder {
    fn encode(&mut self, data: &[u8], pts_us: u64) -> Result<(), CaptureError> {
        if let Some(last) = self.last_pts_us {
            if pts_us < last {
                return Err(CaptureError::EncodingFailed(format!(
                    "timestamp {}us precedes previous frame at {}us",
                    pts_us, last
                )));
            }
        }
        if self.data_bytes + data.len() as u64 > MAX_DATA_SIZE as u64 {
            return Err(CaptureError::StorageError("recording exceeds WAV size limit".into()));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        writer
            .write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;

        self.data_bytes += data.len() as u64;
        self.frames += 1;
        self.last_pts_us = Some(pts_us);
        Ok(())
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data =
        fs::read(path).map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&Sha256::digest(&data)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
