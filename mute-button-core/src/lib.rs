//! # mute-button-core
//!
//! Platform-agnostic core of the loopback audio router.
//!
//! Mirrors whatever a playback device is rendering (its loopback capture) to
//! another playback device, with per-session mute, forwarding, and recording.
//! Platform backends (Windows WASAPI) implement [`AudioHost`] and plug into
//! the generic [`SessionSupervisor`].
//!
//! ## Architecture
//!
//! ```text
//! mute-button-core (this crate)
//! ├── traits/       ← AudioHost, PlaybackStream, CaptureStream, LivenessProbe, SupervisorDelegate
//! ├── models/       ← Endpoint, RouteError, SupervisorState, SupervisorConfig, SessionStatus
//! ├── catalog/      ← DeviceCatalog (loopback/playback name maps, selection warnings)
//! ├── route/        ← AudioRoute, RouteCallback, RouteFlags
//! ├── processing/   ← RecordingBuffer, WAV header generation
//! ├── session/      ← SessionSupervisor (per-client control loop), ConnectionRegistry
//! ├── storage/      ← WavFileWriter, SampleLibrary, metadata sidecars
//! └── mock          ← MockHost for tests (`mock` feature)
//! ```

pub mod catalog;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod processing;
pub mod route;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use catalog::device_catalog::{DeviceCatalog, RouteSelection};
pub use models::config::{AudioPaths, SupervisorConfig};
pub use models::endpoint::{Direction, Endpoint, EndpointIndex, EndpointInfo, LOOPBACK_SUFFIX};
pub use models::error::RouteError;
pub use models::recording::{RecordingArtifact, SampleMetadata};
pub use models::state::SupervisorState;
pub use models::status::SessionStatus;
pub use processing::recording_buffer::RecordingBuffer;
pub use route::audio_route::AudioRoute;
pub use route::callback::{RouteCallback, RouteFlags};
pub use session::registry::ConnectionRegistry;
pub use session::supervisor::SessionSupervisor;
pub use storage::sample_library::SampleLibrary;
pub use storage::wav_writer::WavFileWriter;
pub use traits::audio_host::{AudioHost, CaptureStream, PlaybackStream, StreamFormat};
pub use traits::liveness::LivenessProbe;
pub use traits::supervisor_delegate::SupervisorDelegate;
