use std::sync::Arc;

use mute_button_core::models::endpoint::Endpoint;
use mute_button_core::models::error::RouteError;
use mute_button_core::route::callback::RouteCallback;
use mute_button_core::traits::audio_host::{AudioHost, CaptureStream, PlaybackStream, StreamFormat};

use crate::com::ComGuard;
use crate::device_enumerator::DeviceEnumerator;
use crate::wasapi_loopback::WasapiLoopbackCapture;
use crate::wasapi_render::WasapiRenderStream;

/// [`AudioHost`] backed by WASAPI shared mode.
///
/// Stateless: every stream owns its own thread and COM apartment, and
/// enumeration initializes COM on the calling thread for its duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiHost;

impl WasapiHost {
    pub fn new() -> Self {
        Self
    }
}

fn check_format(endpoint: &Endpoint, format: &StreamFormat) -> Result<(), RouteError> {
    if format.bytes_per_frame() == 0 || format.sample_rate == 0 {
        return Err(RouteError::stream_open(
            endpoint.name(),
            format!("unusable format {:?}", format),
        ));
    }
    Ok(())
}

impl AudioHost for WasapiHost {
    fn enumerate_endpoints(&self) -> Result<Vec<Endpoint>, RouteError> {
        let _com = ComGuard::init()?;
        DeviceEnumerator::new()?.endpoints()
    }

    fn open_playback(
        &self,
        endpoint: &Endpoint,
        format: StreamFormat,
    ) -> Result<Arc<dyn PlaybackStream>, RouteError> {
        check_format(endpoint, &format)?;
        Ok(Arc::new(WasapiRenderStream::open(endpoint, format)?))
    }

    fn open_capture(
        &self,
        endpoint: &Endpoint,
        format: StreamFormat,
        callback: RouteCallback,
    ) -> Result<Box<dyn CaptureStream>, RouteError> {
        check_format(endpoint, &format)?;
        Ok(Box::new(WasapiLoopbackCapture::open(endpoint, format, callback)?))
    }
}
