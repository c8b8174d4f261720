pub mod audio_host;
pub mod liveness;
pub mod supervisor_delegate;
