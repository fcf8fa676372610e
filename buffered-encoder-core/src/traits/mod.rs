pub mod audio_input;
pub mod clock;
pub mod encoder;
pub mod session_delegate;
