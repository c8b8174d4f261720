//! Windows audio device enumeration via the MMDevice API.
//!
//! Lists active render and capture endpoints with their friendly names and
//! shared-mode mix formats. Every render endpoint is reported twice: once as
//! a playback device and once as its loopback capture twin.

use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use mute_button_core::models::endpoint::{Direction, Endpoint, EndpointIndex, EndpointInfo, LOOPBACK_SUFFIX};
use mute_button_core::models::error::RouteError;

use crate::com;

/// A raw MMDevice endpoint before it is numbered.
struct RawDevice {
    id: String,
    name: String,
    channels: u16,
    sample_rate: u32,
}

/// Audio device enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, RouteError> {
        Ok(Self {
            enumerator: com::device_enumerator()?,
        })
    }

    /// Enumerate every usable endpoint.
    ///
    /// Order: render devices, capture devices, then one loopback twin per
    /// render device. Indices are assigned in that order.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, RouteError> {
        let render = self.list_devices(eRender)?;
        let capture = self.list_devices(eCapture)?;

        let mut infos = Vec::with_capacity(render.len() * 2 + capture.len());
        for device in &render {
            infos.push(EndpointInfo {
                index: EndpointIndex(0),
                host_id: device.id.clone(),
                name: device.name.clone(),
                direction: Direction::Playback,
                is_loopback: false,
                max_input_channels: 0,
                max_output_channels: device.channels,
                default_sample_rate: device.sample_rate,
            });
        }
        for device in &capture {
            infos.push(EndpointInfo {
                index: EndpointIndex(0),
                host_id: device.id.clone(),
                name: device.name.clone(),
                direction: Direction::Capture,
                is_loopback: false,
                max_input_channels: device.channels,
                max_output_channels: 0,
                default_sample_rate: device.sample_rate,
            });
        }
        for device in &render {
            infos.push(EndpointInfo {
                index: EndpointIndex(0),
                host_id: device.id.clone(),
                name: format!("{}{}", device.name, LOOPBACK_SUFFIX),
                direction: Direction::Capture,
                is_loopback: true,
                max_input_channels: device.channels,
                max_output_channels: 0,
                default_sample_rate: device.sample_rate,
            });
        }

        let mut endpoints = Vec::with_capacity(infos.len());
        for (i, mut info) in infos.into_iter().enumerate() {
            info.index = EndpointIndex(i as u32);
            let name = info.name.clone();
            match Endpoint::new(info) {
                Some(endpoint) => endpoints.push(endpoint),
                None => log::debug!("Skipping endpoint without a usable format: {}", name),
            }
        }
        Ok(endpoints)
    }

    fn list_devices(&self, data_flow: EDataFlow) -> Result<Vec<RawDevice>, RouteError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| RouteError::HostUnavailable(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| RouteError::HostUnavailable(format!("GetCount failed: {}", e)))?;

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device.GetId().ok().and_then(|id| id.to_string().ok()) else {
                    continue;
                };
                let name = Self::friendly_name(&device).unwrap_or_else(|| format!("Device {}", i));

                match Self::mix_format(&device) {
                    Some((channels, sample_rate)) => devices.push(RawDevice {
                        id,
                        name,
                        channels,
                        sample_rate,
                    }),
                    None => log::debug!("No mix format for {}, skipping", name),
                }
            }
            Ok(devices)
        }
    }

    /// Read PKEY_Device_FriendlyName from the device's property store.
    fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            let name = value.to_string();
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        }
    }

    /// Channel count and rate of the shared-mode mix format.
    fn mix_format(device: &IMMDevice) -> Option<(u16, u32)> {
        unsafe {
            let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).ok()?;
            let format_ptr = audio_client.GetMixFormat().ok()?;
            let format = &*format_ptr;
            let result = (format.nChannels, format.nSamplesPerSec);
            CoTaskMemFree(Some(format_ptr as *const _));
            Some(result)
        }
    }
}
