pub mod report_file;
pub mod wav_encoder;
