use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::processing::recording_buffer::RecordingBuffer;
use crate::traits::audio_host::PlaybackStream;

/// Forward/mute switches read by the route callback.
///
/// Written only by the supervisor; the callback reads them with relaxed
/// loads on every buffer.
#[derive(Debug, Default)]
pub struct RouteFlags {
    forwarding_enabled: AtomicBool,
    muted: AtomicBool,
    failed_writes: AtomicU64,
}

impl RouteFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_forwarding(&self, enabled: bool) {
        self.forwarding_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn forwarding_enabled(&self) -> bool {
        self.forwarding_enabled.load(Ordering::Relaxed)
    }

    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Whether the callback should write to the output stream.
    pub fn should_forward(&self) -> bool {
        self.forwarding_enabled() && !self.muted()
    }

    /// Output writes that returned an error, reset by [`take_failed_writes`](Self::take_failed_writes).
    pub fn take_failed_writes(&self) -> u64 {
        self.failed_writes.swap(0, Ordering::Relaxed)
    }
}

/// State handed to the backend when a capture stream is opened.
///
/// Holds exactly what the real-time thread may touch: the flags, the output
/// stream, and the session's recording buffer. It never sees the
/// supervisor's control state.
pub struct RouteCallback {
    flags: Arc<RouteFlags>,
    output: Arc<dyn PlaybackStream>,
    recording: Arc<RecordingBuffer>,
}

impl RouteCallback {
    pub fn new(flags: Arc<RouteFlags>, output: Arc<dyn PlaybackStream>, recording: Arc<RecordingBuffer>) -> Self {
        Self {
            flags,
            output,
            recording,
        }
    }

    /// Handle one buffer of captured frames. `frames` is never modified.
    ///
    /// A slow output write stalls this call; that is the route's only
    /// backpressure. The stream only stops when the route is closed.
    pub fn process(&self, frames: &[u8]) {
        if self.flags.should_forward() && self.output.write(frames).is_err() {
            self.flags.failed_writes.fetch_add(1, Ordering::Relaxed);
        }
        self.recording.push(frames);
    }
}
