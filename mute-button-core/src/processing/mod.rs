pub mod recording_buffer;
pub mod wav_format;
