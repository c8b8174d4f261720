pub mod audio_route;
pub mod callback;
