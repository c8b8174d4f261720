//! WASAPI render stream in push mode.
//!
//! `write` hands each buffer to a dedicated render thread over a bounded
//! channel and blocks while the channel is full, so the capture callback is
//! paced by the output device. The render thread owns every COM object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, SendTimeoutError};
use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use mute_button_core::models::endpoint::Endpoint;
use mute_button_core::models::error::RouteError;
use mute_button_core::traits::audio_host::{PlaybackStream, StreamFormat};

use crate::com::{self, ComGuard};

/// Shared-mode buffer duration: 100ms in 100ns units.
const BUFFER_DURATION: i64 = 1_000_000;

/// Buffers queued ahead of the device before `write` blocks.
const QUEUE_DEPTH: usize = 4;

/// Longest `write` waits for queue space before reporting a failure.
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct WasapiRenderStream {
    device_name: String,
    sender: channel::Sender<Vec<u8>>,
    running: Arc<AtomicBool>,
    render_handle: Mutex<Option<thread::JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WasapiRenderStream {
    /// Open `endpoint` for playback and start its render thread.
    pub fn open(endpoint: &Endpoint, format: StreamFormat) -> Result<Self, RouteError> {
        let device_id = endpoint.host_id().to_string();
        let device_name = endpoint.name().to_string();

        let running = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = channel::bounded::<Vec<u8>>(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = channel::bounded::<Result<(), RouteError>>(1);

        let thread_running = Arc::clone(&running);
        let thread_name = device_name.clone();
        let handle = thread::Builder::new()
            .name("wasapi-render".into())
            .spawn(move || {
                if let Err(e) = render_loop(&thread_running, &device_id, format, &receiver, &ready_tx) {
                    if ready_tx.try_send(Err(e.clone())).is_err() {
                        log::error!("Playback to {} failed: {}", thread_name, e);
                    }
                }
                thread_running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| RouteError::Unknown(format!("failed to spawn render thread: {}", e)))?;

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(RouteError::Unknown("render thread exited during startup".into())));
        if let Err(e) = started {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(RouteError::stream_open(&device_name, e.to_string()));
        }

        log::debug!("Playback started on {} ({:?})", device_name, format);
        Ok(Self {
            device_name,
            sender,
            running,
            render_handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }
}

impl PlaybackStream for WasapiRenderStream {
    fn write(&self, frames: &[u8]) -> Result<(), RouteError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(RouteError::StreamWriteFailed(format!("{} is stopped", self.device_name)));
        }
        match self.sender.send_timeout(frames.to_vec(), WRITE_TIMEOUT) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(RouteError::StreamWriteFailed(format!(
                "{} did not accept audio in time",
                self.device_name
            ))),
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(RouteError::StreamWriteFailed(format!("{} has shut down", self.device_name)))
            }
        }
    }

    fn stop(&self) -> Result<(), RouteError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.render_handle.lock().take() {
            if handle.join().is_err() {
                return Err(RouteError::Unknown(format!("render thread for {} panicked", self.device_name)));
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), RouteError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.stop()
    }
}

impl Drop for WasapiRenderStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Render loop running on a dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Look up the endpoint by id
/// 3. Activate IAudioClient, initialize shared mode with 16-bit PCM
/// 4. Get IAudioRenderClient
/// 5. Register with MMCSS
/// 6. Start, report ready, copy queued buffers into free device space
fn render_loop(
    running: &AtomicBool,
    device_id: &str,
    format: StreamFormat,
    receiver: &channel::Receiver<Vec<u8>>,
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
        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
                BUFFER_DURATION,
                0,
                &wave_format,
                None,
            )
            .map_err(|e| RouteError::ConfigurationFailed(format!("IAudioClient::Initialize failed: {}", e)))?;

        let buffer_frames = audio_client
            .GetBufferSize()
            .map_err(|e| RouteError::ConfigurationFailed(format!("GetBufferSize failed: {}", e)))?;

        let render_client: IAudioRenderClient = audio_client
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

        while running.load(Ordering::SeqCst) {
            let chunk = match receiver.recv_timeout(Duration::from_millis(10)) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            // a trailing partial frame is dropped
            let mut pending = &chunk[..chunk.len() - chunk.len() % frame_bytes];
            while !pending.is_empty() && running.load(Ordering::SeqCst) {
                let padding = audio_client
                    .GetCurrentPadding()
                    .map_err(|e| RouteError::Unknown(format!("GetCurrentPadding failed: {}", e)))?;
                let available = buffer_frames.saturating_sub(padding);
                if available == 0 {
                    thread::sleep(Duration::from_millis(2));
                    continue;
                }

                let frames = available.min((pending.len() / frame_bytes) as u32);
                let bytes = frames as usize * frame_bytes;
                let buffer_ptr = render_client
                    .GetBuffer(frames)
                    .map_err(|e| RouteError::Unknown(format!("GetBuffer failed: {}", e)))?;
                std::ptr::copy_nonoverlapping(pending.as_ptr(), buffer_ptr, bytes);
                render_client
                    .ReleaseBuffer(frames, 0)
                    .map_err(|e| RouteError::Unknown(format!("ReleaseBuffer failed: {}", e)))?;
                pending = &pending[bytes..];
            }
        }

        let _ = audio_client.Stop();
    }

    Ok(())
}
