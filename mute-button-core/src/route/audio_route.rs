use std::sync::Arc;

use crate::models::endpoint::Endpoint;
use crate::models::error::RouteError;
use crate::processing::recording_buffer::RecordingBuffer;
use crate::route::callback::{RouteCallback, RouteFlags};
use crate::traits::audio_host::{AudioHost, CaptureStream, PlaybackStream, StreamFormat};

/// One live loopback → playback stream pair.
///
/// ```text
/// [Loopback capture] → RouteCallback ─┬→ [Playback stream]   (forwarding && !muted)
///                                     └→ [RecordingBuffer]   (recording armed)
/// ```
///
/// Opened and closed only by the supervisor's control thread. Both streams
/// are either open together or closed together.
pub struct AudioRoute {
    loopback_name: String,
    playback_name: String,
    input_format: StreamFormat,
    output_format: StreamFormat,
    input: Option<Box<dyn CaptureStream>>,
    output: Option<Arc<dyn PlaybackStream>>,
}

impl AudioRoute {
    /// Open the output stream, then the input stream with a callback bound
    /// to `flags` and `recording`.
    ///
    /// The capture side uses the loopback endpoint's *input* channel count;
    /// the playback side its own output channel count. Both run at their
    /// endpoint's native rate with `frames_per_buffer` frames per buffer.
    pub fn open(
        host: &dyn AudioHost,
        loopback: &Endpoint,
        playback: &Endpoint,
        frames_per_buffer: u32,
        bit_depth: u16,
        flags: Arc<RouteFlags>,
        recording: Arc<RecordingBuffer>,
    ) -> Result<Self, RouteError> {
        let output_format = StreamFormat {
            channels: playback.max_output_channels(),
            sample_rate: playback.default_sample_rate(),
            frames_per_buffer,
            bit_depth,
        };
        let input_format = StreamFormat {
            channels: loopback.max_input_channels(),
            sample_rate: loopback.default_sample_rate(),
            frames_per_buffer,
            bit_depth,
        };

        let output = host.open_playback(playback, output_format)?;

        let callback = RouteCallback::new(flags, Arc::clone(&output), recording);
        let input = match host.open_capture(loopback, input_format, callback) {
            Ok(input) => input,
            Err(e) => {
                close_output(&*output, playback.display_name());
                return Err(e);
            }
        };

        Ok(Self {
            loopback_name: loopback.display_name().to_string(),
            playback_name: playback.display_name().to_string(),
            input_format,
            output_format,
            input: Some(input),
            output: Some(output),
        })
    }

    pub fn loopback_name(&self) -> &str {
        &self.loopback_name
    }

    pub fn playback_name(&self) -> &str {
        &self.playback_name
    }

    pub fn frames_per_buffer(&self) -> u32 {
        self.input_format.frames_per_buffer
    }

    pub fn sample_rate(&self) -> u32 {
        self.input_format.sample_rate
    }

    pub fn input_format(&self) -> StreamFormat {
        self.input_format
    }

    pub fn output_format(&self) -> StreamFormat {
        self.output_format
    }

    pub fn is_open(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }

    /// Stop and close the input stream, then the output stream.
    ///
    /// Idempotent. Errors are logged; the streams are dropped regardless.
    pub fn close(&mut self) {
        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.stop() {
                log::warn!("Failed to stop capture from {}: {}", self.loopback_name, e);
            }
            if let Err(e) = input.close() {
                log::warn!("Failed to close capture from {}: {}", self.loopback_name, e);
            }
        }
        if let Some(output) = self.output.take() {
            close_output(&*output, &self.playback_name);
        }
    }
}

impl Drop for AudioRoute {
    fn drop(&mut self) {
        self.close();
    }
}

fn close_output(output: &dyn PlaybackStream, name: &str) {
    if let Err(e) = output.stop() {
        log::warn!("Failed to stop playback to {}: {}", name, e);
    }
    if let Err(e) = output.close() {
        log::warn!("Failed to close playback to {}: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HostEvent, MockHost};

    fn open_route(host: &MockHost) -> Result<AudioRoute, RouteError> {
        let catalog = host.enumerate_endpoints().unwrap();
        let loopback = catalog.iter().find(|e| e.is_loopback()).unwrap().clone();
        let playback = catalog.iter().find(|e| e.name() == "Headphones").unwrap().clone();
        AudioRoute::open(
            host,
            &loopback,
            &playback,
            2400,
            16,
            Arc::new(RouteFlags::new()),
            Arc::new(RecordingBuffer::new()),
        )
    }

    #[test]
    fn opens_output_before_input_with_endpoint_formats() {
        let host = MockHost::with_default_devices();
        let route = open_route(&host).unwrap();

        assert_eq!(route.loopback_name(), "Speakers");
        assert_eq!(route.playback_name(), "Headphones");
        assert_eq!(route.input_format().channels, 2);
        assert_eq!(route.output_format().channels, 2);
        assert_eq!(route.output_format().sample_rate, 44100);
        assert_eq!(route.sample_rate(), 48000);
        assert_eq!(
            host.events(),
            vec![
                HostEvent::OpenPlayback("Headphones".into()),
                HostEvent::OpenCapture("Speakers [Loopback]".into()),
            ]
        );
    }

    #[test]
    fn close_stops_input_before_output_once() {
        let host = MockHost::with_default_devices();
        let mut route = open_route(&host).unwrap();
        host.clear_events();

        route.close();
        route.close();
        drop(route);

        assert_eq!(
            host.events(),
            vec![
                HostEvent::StopCapture("Speakers [Loopback]".into()),
                HostEvent::CloseCapture("Speakers [Loopback]".into()),
                HostEvent::StopPlayback("Headphones".into()),
                HostEvent::ClosePlayback("Headphones".into()),
            ]
        );
    }

    #[test]
    fn failed_capture_open_closes_output() {
        let host = MockHost::with_default_devices();
        host.fail_open("Speakers [Loopback]");

        assert!(matches!(open_route(&host), Err(RouteError::StreamOpenFailed { .. })));
        assert_eq!(host.open_stream_count(), 0);
        assert_eq!(
            host.events(),
            vec![
                HostEvent::OpenPlayback("Headphones".into()),
                HostEvent::StopPlayback("Headphones".into()),
                HostEvent::ClosePlayback("Headphones".into()),
            ]
        );
    }
}
