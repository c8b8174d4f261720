//! In-memory audio host for exercising routes and supervisors without hardware.
//!
//! [`MockHost`] records every stream open/stop/close as a [`HostEvent`], lets
//! tests inject open failures, and delivers synthetic capture buffers to the
//! currently open route via [`MockHost::feed`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::endpoint::{Direction, Endpoint, EndpointIndex, EndpointInfo, LOOPBACK_SUFFIX};
use crate::models::error::RouteError;
use crate::route::callback::RouteCallback;
use crate::traits::audio_host::{AudioHost, CaptureStream, PlaybackStream, StreamFormat};

/// A stream lifecycle event, tagged with the endpoint's raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    OpenPlayback(String),
    OpenCapture(String),
    StopCapture(String),
    CloseCapture(String),
    StopPlayback(String),
    ClosePlayback(String),
}

type EventLog = Arc<Mutex<Vec<HostEvent>>>;
type CallbackSlot = Arc<Mutex<Option<Arc<RouteCallback>>>>;

#[derive(Default)]
struct Counters {
    open_streams: AtomicUsize,
    open_captures: AtomicUsize,
    max_open_captures: AtomicUsize,
}

/// Scriptable [`AudioHost`] implementation.
pub struct MockHost {
    endpoints: Mutex<Vec<Endpoint>>,
    unavailable: AtomicBool,
    failing: Mutex<HashSet<String>>,
    events: EventLog,
    capture: CallbackSlot,
    capture_format: Mutex<Option<StreamFormat>>,
    playbacks: Mutex<Vec<Arc<MockPlayback>>>,
    counters: Arc<Counters>,
}

impl MockHost {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: Mutex::new(endpoints),
            unavailable: AtomicBool::new(false),
            failing: Mutex::new(HashSet::new()),
            events: Arc::new(Mutex::new(Vec::new())),
            capture: Arc::new(Mutex::new(None)),
            capture_format: Mutex::new(None),
            playbacks: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// A typical desktop: two render devices, each with a loopback twin, and
    /// one microphone.
    ///
    /// | index | name                   | kind     | in | out | rate  |
    /// |-------|------------------------|----------|----|-----|-------|
    /// | 0     | Speakers               | playback | 0  | 2   | 48000 |
    /// | 1     | Headphones             | playback | 0  | 2   | 44100 |
    /// | 2     | Microphone             | capture  | 1  | 0   | 16000 |
    /// | 3     | Speakers [Loopback]    | loopback | 2  | 0   | 48000 |
    /// | 4     | Headphones [Loopback]  | loopback | 2  | 0   | 44100 |
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            playback_endpoint(0, "Speakers", 2, 48000),
            playback_endpoint(1, "Headphones", 2, 44100),
            capture_endpoint(2, "Microphone", 1, 16000),
            loopback_endpoint(3, "Speakers", 2, 48000),
            loopback_endpoint(4, "Headphones", 2, 44100),
        ])
    }

    /// Replace the endpoint list returned by the next enumeration.
    pub fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        *self.endpoints.lock() = endpoints;
    }

    /// Make enumeration fail as if the host API were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make opening any stream on the endpoint with raw `name` fail.
    pub fn fail_open(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Deliver one buffer to the open capture stream's callback.
    ///
    /// Returns `false` if no capture stream is running.
    pub fn feed(&self, frames: &[u8]) -> bool {
        let Some(callback) = self.capture.lock().clone() else {
            return false;
        };
        callback.process(frames);
        true
    }

    /// Format of the most recently opened capture stream.
    pub fn capture_format(&self) -> Option<StreamFormat> {
        *self.capture_format.lock()
    }

    /// Most recently opened playback stream.
    pub fn last_playback(&self) -> Option<Arc<MockPlayback>> {
        self.playbacks.lock().last().cloned()
    }

    /// Streams opened and not yet closed.
    pub fn open_stream_count(&self) -> usize {
        self.counters.open_streams.load(Ordering::SeqCst)
    }

    /// Highest number of capture streams ever open at the same time.
    pub fn max_concurrent_captures(&self) -> usize {
        self.counters.max_open_captures.load(Ordering::SeqCst)
    }

    fn check_open(&self, endpoint: &Endpoint) -> Result<(), RouteError> {
        if self.failing.lock().contains(endpoint.name()) {
            return Err(RouteError::stream_open(endpoint.name(), "device is in use"));
        }
        Ok(())
    }
}

impl AudioHost for MockHost {
    fn enumerate_endpoints(&self) -> Result<Vec<Endpoint>, RouteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RouteError::HostUnavailable("mock host disabled".into()));
        }
        Ok(self.endpoints.lock().clone())
    }

    fn open_playback(
        &self,
        endpoint: &Endpoint,
        _format: StreamFormat,
    ) -> Result<Arc<dyn PlaybackStream>, RouteError> {
        self.check_open(endpoint)?;
        let playback = Arc::new(MockPlayback {
            name: endpoint.name().to_string(),
            writes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            events: Some(Arc::clone(&self.events)),
            counters: Some(Arc::clone(&self.counters)),
        });
        self.counters.open_streams.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(HostEvent::OpenPlayback(endpoint.name().to_string()));
        self.playbacks.lock().push(Arc::clone(&playback));
        Ok(playback)
    }

    fn open_capture(
        &self,
        endpoint: &Endpoint,
        format: StreamFormat,
        callback: RouteCallback,
    ) -> Result<Box<dyn CaptureStream>, RouteError> {
        self.check_open(endpoint)?;
        *self.capture.lock() = Some(Arc::new(callback));
        *self.capture_format.lock() = Some(format);

        self.counters.open_streams.fetch_add(1, Ordering::SeqCst);
        let open = self.counters.open_captures.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open_captures.fetch_max(open, Ordering::SeqCst);
        self.events.lock().push(HostEvent::OpenCapture(endpoint.name().to_string()));

        Ok(Box::new(MockCapture {
            name: endpoint.name().to_string(),
            slot: Arc::clone(&self.capture),
            events: Arc::clone(&self.events),
            counters: Arc::clone(&self.counters),
            stopped: false,
            closed: false,
        }))
    }
}

/// Playback stream that records every write.
pub struct MockPlayback {
    name: String,
    writes: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
    stopped: AtomicBool,
    closed: AtomicBool,
    events: Option<EventLog>,
    counters: Option<Arc<Counters>>,
}

impl MockPlayback {
    /// A standalone stream, not attached to any host.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            writes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            events: None,
            counters: None,
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, event: HostEvent) {
        if let Some(events) = &self.events {
            events.lock().push(event);
        }
    }
}

impl PlaybackStream for MockPlayback {
    fn write(&self, frames: &[u8]) -> Result<(), RouteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RouteError::StreamWriteFailed("mock write failure".into()));
        }
        if self.stopped.load(Ordering::SeqCst) {
            return Err(RouteError::StreamWriteFailed("stream stopped".into()));
        }
        self.writes.lock().push(frames.to_vec());
        Ok(())
    }

    fn stop(&self) -> Result<(), RouteError> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.record(HostEvent::StopPlayback(self.name.clone()));
        }
        Ok(())
    }

    fn close(&self) -> Result<(), RouteError> {
        self.stop()?;
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.record(HostEvent::ClosePlayback(self.name.clone()));
            if let Some(counters) = &self.counters {
                counters.open_streams.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

struct MockCapture {
    name: String,
    slot: CallbackSlot,
    events: EventLog,
    counters: Arc<Counters>,
    stopped: bool,
    closed: bool,
}

impl CaptureStream for MockCapture {
    fn stop(&mut self) -> Result<(), RouteError> {
        if !self.stopped {
            self.stopped = true;
            self.slot.lock().take();
            self.events.lock().push(HostEvent::StopCapture(self.name.clone()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), RouteError> {
        self.stop()?;
        if !self.closed {
            self.closed = true;
            self.counters.open_streams.fetch_sub(1, Ordering::SeqCst);
            self.counters.open_captures.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().push(HostEvent::CloseCapture(self.name.clone()));
        }
        Ok(())
    }
}

/// Render endpoint with `channels` output channels.
pub fn playback_endpoint(index: u32, name: &str, channels: u16, sample_rate: u32) -> Endpoint {
    endpoint(EndpointInfo {
        index: EndpointIndex(index),
        host_id: format!("mock-render-{}", index),
        name: name.to_string(),
        direction: Direction::Playback,
        is_loopback: false,
        max_input_channels: 0,
        max_output_channels: channels,
        default_sample_rate: sample_rate,
    })
}

/// Microphone-style capture endpoint.
pub fn capture_endpoint(index: u32, name: &str, channels: u16, sample_rate: u32) -> Endpoint {
    endpoint(EndpointInfo {
        index: EndpointIndex(index),
        host_id: format!("mock-capture-{}", index),
        name: name.to_string(),
        direction: Direction::Capture,
        is_loopback: false,
        max_input_channels: channels,
        max_output_channels: 0,
        default_sample_rate: sample_rate,
    })
}

/// Loopback twin of the render device `render_name`; the raw name carries
/// the loopback suffix.
pub fn loopback_endpoint(index: u32, render_name: &str, channels: u16, sample_rate: u32) -> Endpoint {
    endpoint(EndpointInfo {
        index: EndpointIndex(index),
        host_id: format!("mock-loopback-{}", index),
        name: format!("{}{}", render_name, LOOPBACK_SUFFIX),
        direction: Direction::Capture,
        is_loopback: true,
        max_input_channels: channels,
        max_output_channels: 0,
        default_sample_rate: sample_rate,
    })
}

fn endpoint(info: EndpointInfo) -> Endpoint {
    let name = info.name.clone();
    Endpoint::new(info).unwrap_or_else(|| panic!("invalid mock endpoint: {}", name))
}
