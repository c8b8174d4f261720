//! COM apartment and device lookup helpers shared by every WASAPI thread.

use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use mute_button_core::models::error::RouteError;

/// Initializes COM (MTA) for the current thread; uninitializes on drop.
pub(crate) struct ComGuard;

impl ComGuard {
    pub(crate) fn init() -> Result<Self, RouteError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| RouteError::HostUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        }
        Ok(Self)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

pub(crate) fn device_enumerator() -> Result<IMMDeviceEnumerator, RouteError> {
    unsafe {
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| RouteError::HostUnavailable(format!("failed to create enumerator: {}", e)))
    }
}

/// Look up an endpoint by its MMDevice id.
pub(crate) fn device_by_id(enumerator: &IMMDeviceEnumerator, id: &str) -> Result<IMMDevice, RouteError> {
    let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        enumerator
            .GetDevice(PCWSTR(wide_id.as_ptr()))
            .map_err(|e| RouteError::DeviceNotAvailable(format!("{}: {}", id, e)))
    }
}

/// 16-bit integer PCM format for `channels` at `sample_rate`.
pub(crate) fn pcm16_format(channels: u16, sample_rate: u32) -> WAVEFORMATEX {
    let block_align = channels * 2;
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: channels,
        nSamplesPerSec: sample_rate,
        nAvgBytesPerSec: sample_rate * u32::from(block_align),
        nBlockAlign: block_align,
        wBitsPerSample: 16,
        cbSize: 0,
    }
}
