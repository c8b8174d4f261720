use serde::Serialize;

use super::state::SupervisorState;

/// Snapshot of everything a front end renders for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SupervisorState,
    pub loopback_device: String,
    pub playback_device: String,
    pub loopback_device_names: Vec<String>,
    pub playback_device_names: Vec<String>,
    pub device_warning: String,
    pub devices_invalid: bool,
    pub forwarding_enabled: bool,
    pub muted: bool,
    pub recording: bool,
    pub recording_exists: bool,
    /// Last artifact path relative to the upload root.
    pub recording_path: Option<String>,
    pub speaker_for_sample: String,
    pub save_sample_disabled: bool,
}
