use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::audio_input::InputParams;

/// PCM sample encoding requested from the audio input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    Pcm8,
    Pcm16,
    PcmFloat,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Pcm8 => 1,
            Self::Pcm16 => 2,
            Self::PcmFloat => 4,
        }
    }

    pub fn bit_depth(&self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }
}

/// Scheduling class requested for the capture thread.
///
/// The core never touches the OS scheduler itself; backends map this onto
/// their platform call (MMCSS, `setThreadPriority`, SCHED_FIFO...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    Normal,
    #[default]
    Audio,
    UrgentAudio,
}

/// Configuration for a buffered encoder session.
///
/// Defaults reproduce the classic AAC feeding setup: 44.1 kHz mono PCM16,
/// 1024-byte frames, 100 pooled buffers and a queue depth of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Backend-specific input identifier ("default" for the system default).
    pub source_id: String,

    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Channel count, 1 or 2 (default: 1).
    pub channels: u16,

    /// Sample encoding (default: PCM16).
    pub format: SampleFormat,

    /// Bytes read per frame and handed to the encoder (default: 1024).
    pub frame_bytes: usize,

    /// Frames of headroom requested from the input's internal buffer (default: 25).
    pub frames_per_buffer: usize,

    /// Buffers allocated eagerly when the pool is built (default: 100).
    pub pool_initial: usize,

    /// Hard cap on buffers the pool will ever create (default: 100).
    pub pool_max: usize,

    /// Maximum number of frames waiting for the encoder (default: 100).
    pub queue_depth: usize,

    /// Contiguous "not recording" polls tolerated before giving up (default: 20).
    pub max_not_recording: u32,

    /// Contiguous recoverable read errors tolerated before giving up (default: 10).
    pub max_read_errors: u32,

    /// Pause between retries on the capture thread (default: 100ms).
    #[serde(with = "duration_ms")]
    pub retry_wait: Duration,

    /// Dequeue timeout on the drain thread; bounds shutdown latency (default: 30ms).
    #[serde(with = "duration_ms")]
    pub poll_timeout: Duration,

    /// Silent frames emitted when a session delivered nothing (default: 5).
    pub padding_frames: u32,

    /// Pacing between padding frames (default: 50ms).
    #[serde(with = "duration_ms")]
    pub padding_interval: Duration,

    /// Forward frames still queued when the session stops (default: true).
    pub flush_on_stop: bool,

    /// Scheduling class requested for the capture thread (default: audio).
    pub producer_priority: ThreadPriority,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        let frame_align = self.bytes_per_frame();
        if self.frame_bytes == 0 || self.frame_bytes % frame_align != 0 {
            return Err(format!(
                "frame size {} is not a positive multiple of {} bytes",
                self.frame_bytes, frame_align
            ));
        }
        if self.frames_per_buffer == 0 {
            return Err("frames per buffer must be positive".into());
        }
        if self.pool_max == 0 {
            return Err("pool size must be positive".into());
        }
        if self.pool_initial > self.pool_max {
            return Err(format!(
                "initial pool size {} exceeds maximum {}",
                self.pool_initial, self.pool_max
            ));
        }
        if self.queue_depth == 0 {
            return Err("queue depth must be positive".into());
        }
        if self.poll_timeout.is_zero() {
            return Err("poll timeout must be positive".into());
        }
        Ok(())
    }

    /// Bytes in one sample frame (one sample for every channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Size hint for the input's internal buffer.
    pub fn buffer_size_hint(&self) -> usize {
        self.frame_bytes * self.frames_per_buffer
    }

    /// Audio duration covered by one encoder frame.
    pub fn frame_duration(&self) -> Duration {
        let sample_frames = (self.frame_bytes / self.bytes_per_frame()) as u64;
        Duration::from_micros(sample_frames * 1_000_000 / self.sample_rate as u64)
    }

    pub fn input_params(&self) -> InputParams {
        InputParams {
            source_id: self.source_id.clone(),
            sample_rate: self.sample_rate,
            channel_count: self.channels,
            format: self.format,
            buffer_size_hint: self.buffer_size_hint(),
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            source_id: "default".into(),
            sample_rate: 44100,
            channels: 1,
            format: SampleFormat::Pcm16,
            frame_bytes: 1024,
            frames_per_buffer: 25,
            pool_initial: 100,
            pool_max: 100,
            queue_depth: 100,
            max_not_recording: 20,
            max_read_errors: 10,
            retry_wait: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(30),
            padding_frames: 5,
            padding_interval: Duration::from_millis(50),
            flush_on_stop: true,
            producer_priority: ThreadPriority::Audio,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
