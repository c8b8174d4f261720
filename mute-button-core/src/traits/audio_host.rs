use std::sync::Arc;

use crate::models::endpoint::Endpoint;
use crate::models::error::RouteError;
use crate::route::callback::RouteCallback;

/// PCM layout of one stream. Samples are always 16-bit signed little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
    pub bit_depth: u16,
}

impl StreamFormat {
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bit_depth / 8) as usize
    }

    /// Size in bytes of one full callback buffer.
    pub fn buffer_bytes(&self) -> usize {
        self.frames_per_buffer as usize * self.bytes_per_frame()
    }
}

/// An open output stream in blocking/push mode.
///
/// Shared between the route callback (which writes) and the supervisor's
/// control thread (which stops and closes), hence `&self` everywhere.
pub trait PlaybackStream: Send + Sync {
    /// Push interleaved frames, blocking until the device accepts them.
    fn write(&self, frames: &[u8]) -> Result<(), RouteError>;

    /// Stop playback. Idempotent.
    fn stop(&self) -> Result<(), RouteError>;

    /// Release the device. Idempotent; implies `stop`.
    fn close(&self) -> Result<(), RouteError>;
}

/// An open input stream in callback mode.
///
/// The backend invokes the [`RouteCallback`] it was opened with on its own
/// real-time thread until the stream is stopped.
pub trait CaptureStream: Send {
    /// Stop delivering buffers. Returns once no callback is in flight. Idempotent.
    fn stop(&mut self) -> Result<(), RouteError>;

    /// Release the device. Idempotent; implies `stop`.
    fn close(&mut self) -> Result<(), RouteError>;
}

/// Interface for platform-specific audio hosts.
///
/// Implemented by:
/// - `WasapiHost` (Windows, `mute-button-windows`)
/// - `mock::MockHost` for tests, behind the `mock` feature
pub trait AudioHost: Send + Sync {
    /// All endpoints under the host's low-latency API, loopback endpoints included.
    fn enumerate_endpoints(&self) -> Result<Vec<Endpoint>, RouteError>;

    /// Open `endpoint` for playback at `format`.
    fn open_playback(
        &self,
        endpoint: &Endpoint,
        format: StreamFormat,
    ) -> Result<Arc<dyn PlaybackStream>, RouteError>;

    /// Open `endpoint` for capture at `format`, delivering buffers to `callback`.
    fn open_capture(
        &self,
        endpoint: &Endpoint,
        format: StreamFormat,
        callback: RouteCallback,
    ) -> Result<Box<dyn CaptureStream>, RouteError>;
}
