pub mod config;
pub mod endpoint;
pub mod error;
pub mod recording;
pub mod state;
pub mod status;
