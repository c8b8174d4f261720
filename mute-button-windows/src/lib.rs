//! # mute-button-windows
//!
//! Windows WASAPI backend for mute-button.
//!
//! Provides:
//! - `WasapiHost` — [`AudioHost`](mute_button_core::AudioHost) over WASAPI shared mode
//! - `WasapiLoopbackCapture` — loopback capture on a render endpoint
//! - `WasapiRenderStream` — push-mode playback on a render endpoint
//! - `DeviceEnumerator` — MMDevice enumeration, with a loopback twin per render device
//!
//! ## Platform Requirements
//! - Windows 10 or later
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use mute_button_core::{ConnectionRegistry, SessionSupervisor, SupervisorConfig};
//! use mute_button_windows::WasapiHost;
//!
//! let registry = Arc::new(ConnectionRegistry::new());
//! registry.connect("console");
//! let supervisor = SessionSupervisor::start(
//!     "console",
//!     Arc::new(WasapiHost::new()),
//!     registry,
//!     SupervisorConfig::default(),
//! )?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod host;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;
#[cfg(target_os = "windows")]
pub mod wasapi_render;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use host::WasapiHost;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackCapture;
#[cfg(target_os = "windows")]
pub use wasapi_render::WasapiRenderStream;
