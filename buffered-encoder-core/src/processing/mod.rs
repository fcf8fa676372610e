pub mod buffer_pool;
pub mod media_queue;
pub mod pts;
pub mod recycle_buffer;
pub mod wav_format;
