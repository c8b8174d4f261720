pub mod metadata;
pub mod sample_library;
pub mod wav_writer;
