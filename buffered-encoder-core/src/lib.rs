//! # buffered-encoder-core
//!
//! Buffered audio encoder core.
//!
//! Decouples a blocking audio input from a frame encoder with a bounded
//! queue of recyclable buffers. A capture thread reads the input into
//! pooled buffers; a drain thread feeds them to the encoder and returns
//! them to the pool. Platform backends implement the `AudioBackend` trait
//! and plug into the generic `BufferedAudioEncoder`.
//!
//! ## Architecture
//!
//! ```text
//! buffered-encoder-core (this crate)
//! ├── traits/       ← AudioBackend, AudioInput, FrameEncoder, MonotonicClock, SessionDelegate
//! ├── models/       ← CaptureError, ReadError, SessionState, CaptureConfiguration, SessionReport
//! ├── processing/   ← RecycleBuffer, BufferPool, MediaQueue, PtsSource, WAV header encoding
//! ├── session/      ← CaptureWorker, DrainWorker, FrameNotifier, BufferedAudioEncoder
//! ├── storage/      ← WavFileEncoder, report sidecar
//! └── backends/     ← ScriptedBackend (deterministic input for tests and demos)
//! ```

pub mod backends;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backends::scripted::{ScriptEnd, ScriptLog, ScriptStep, ScriptedBackend, ScriptedInput};
pub use models::config::{CaptureConfiguration, SampleFormat, ThreadPriority};
pub use models::error::{CaptureError, ListenerError, ReadError};
pub use models::report::{CaptureExit, CaptureStats, DrainStats, SessionReport};
pub use models::state::SessionState;
pub use processing::buffer_pool::BufferPool;
pub use processing::media_queue::{MediaQueue, QueueFull};
pub use processing::pts::PtsSource;
pub use processing::recycle_buffer::{FrameMeta, RecycleBuffer};
pub use session::buffered::BufferedAudioEncoder;
pub use session::notifier::{FrameEvent, FrameNotifier, SubscriptionId};
pub use storage::wav_encoder::WavFileEncoder;
pub use traits::audio_input::{AudioBackend, AudioInput, InputParams, RecordingState};
pub use traits::clock::{ManualClock, MonotonicClock, SystemClock};
pub use traits::encoder::FrameEncoder;
pub use traits::session_delegate::SessionDelegate;
