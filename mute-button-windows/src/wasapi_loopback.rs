//! WASAPI capture stream for loopback (and microphone) endpoints.
//!
//! Loopback endpoints open their render device with
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`, capturing whatever is being played to it.
//! No special permissions needed on Windows. DRM-protected audio is
//! silenced in loopback.
//!
//! The engine converts to 16-bit PCM (`AUTOCONVERTPCM`) and packets are
//! regrouped into fixed `frames_per_buffer` blocks before each callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use mute_button_core::models::endpoint::Endpoint;
use mute_button_core::models::error::RouteError;
use mute_button_core::route::callback::RouteCallback;
use mute_button_core::traits::audio_host::{CaptureStream, StreamFormat};

use crate::com::{self, ComGuard};

/// Shared-mode buffer duration: 100ms in 100ns units.
const BUFFER_DURATION: i64 = 1_000_000;

/// Running capture stream. COM objects live on the capture thread only.
pub struct WasapiLoopbackCapture {
    device_name: String,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
    closed: bool,
}

impl WasapiLoopbackCapture {
    /// Start capturing from `endpoint`, invoking `callback` once per block.
    ///
    /// Returns after the stream has started, or with the error that
    /// prevented it.
    pub fn open(endpoint: &Endpoint, format: StreamFormat, callback: RouteCallback) -> Result<Self, RouteError> {
        let device_id = endpoint.host_id().to_string();
        let device_name = endpoint.name().to_string();
        let loopback = endpoint.is_loopback();

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), RouteError>>(1);

        let thread_running = Arc::clone(&running);
        let thread_name = device_name.clone();
        let handle = thread::Builder::new()
            .name("wasapi-loopback-capture".into())
            .spawn(move || {
                let result = capture_loop(&thread_running, &device_id, loopback, format, &callback, &ready_tx);
                if let Err(e) = result {
                    // open failures were already reported through `ready_tx`
                    if ready_tx.try_send(Err(e.clone())).is_err() {
                        log::error!("Capture from {} failed: {}", thread_name, e);
                    }
                }
                thread_running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| RouteError::Unknown(format!("failed to spawn capture thread: {}", e)))?;

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(RouteError::Unknown("capture thread exited during startup".into())));
        if let Err(e) = started {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(match e {
                RouteError::StreamOpenFailed { .. } => e,
                other => RouteError::stream_open(&device_name, other.to_string()),
            });
        }

        log::debug!("Capture started on {} ({:?})", device_name, format);
        Ok(Self {
            device_name,
            running,
            capture_handle: Mutex::new(Some(handle)),
            closed: false,
        })
    }
}

impl CaptureStream for WasapiLoopbackCapture {
    fn stop(&mut self) -> Result<(), RouteError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                return Err(RouteError::Unknown(format!("capture thread for {} panicked", self.device_name)));
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), RouteError> {
        if self.closed {
            return Ok(());
        }
        self.stop()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for WasapiLoopbackCapture {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Look up the endpoint by id
/// 3. Activate IAudioClient
/// 4. Initialize in shared mode with a 16-bit PCM format (LOOPBACK for twins)
/// 5. Get IAudioCaptureClient
/// 6. Register with MMCSS
/// 7. Start, report ready, poll for packets
fn capture_loop(
    running: &AtomicBool,
    device_id: &str,
    loopback: bool,
    format: StreamFormat,
    callback: &RouteCallback,
    ready: &channel::Sender<Result<(), RouteError>>,
) -> Result<(), RouteError> {
    let _com = ComGuard::init()?;
    let enumerator = com::device_enumerator()?;
    let device = com::device_by_id(&enumerator, device_id)?;

    unsafe {
        let audio_client: IAudioClient = device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| RouteError::ConfigurationFailed(format!("Activate failed: {}", e)))?;

        let wave_format = com::pcm16_format(format.channels, format.sample_rate);
        let mut stream_flags = AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY;
        if loopback {
            stream_flags |= AUDCLNT_STREAMFLAGS_LOOPBACK;
        }

        audio_client
            .Initialize(AUDCLNT_SHAREMODE_SHARED, stream_flags, BUFFER_DURATION, 0, &wave_format, None)
            .map_err(|e| RouteError::ConfigurationFailed(format!("IAudioClient::Initialize failed: {}", e)))?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| RouteError::ConfigurationFailed(format!("GetService failed: {}", e)))?;

        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

        audio_client
            .Start()
            .map_err(|e| RouteError::Unknown(format!("IAudioClient::Start failed: {}", e)))?;
        let _ = ready.send(Ok(()));

        let frame_bytes = format.bytes_per_frame();
        let block_bytes = format.buffer_bytes();
        let mut block: Vec<u8> = Vec::with_capacity(block_bytes);

        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));

            let mut packet_length = capture_client
                .GetNextPacketSize()
                .map_err(|e| RouteError::Unknown(format!("GetNextPacketSize failed: {}", e)))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(|e| RouteError::Unknown(format!("GetBuffer failed: {}", e)))?;

                let len = num_frames as usize * frame_bytes;
                let mut packet: &[u8] = if num_frames == 0 || buffer_ptr.is_null() {
                    &[]
                } else if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                    &[]
                } else {
                    std::slice::from_raw_parts(buffer_ptr, len)
                };
                let silent = packet.is_empty() && len > 0;

                // regroup into fixed-size blocks
                let mut remaining = len;
                while remaining > 0 {
                    let take = (block_bytes - block.len()).min(remaining);
                    if silent {
                        block.resize(block.len() + take, 0);
                    } else {
                        block.extend_from_slice(&packet[..take]);
                        packet = &packet[take..];
                    }
                    remaining -= take;

                    if block.len() == block_bytes {
                        callback.process(&block);
                        block.clear();
                    }
                }

                capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| RouteError::Unknown(format!("ReleaseBuffer failed: {}", e)))?;

                packet_length = capture_client
                    .GetNextPacketSize()
                    .map_err(|e| RouteError::Unknown(format!("GetNextPacketSize failed: {}", e)))?;
            }
        }

        let _ = audio_client.Stop();
    }

    Ok(())
}
