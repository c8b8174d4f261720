use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::catalog::device_catalog::{DeviceCatalog, RouteSelection};
use crate::models::config::SupervisorConfig;
use crate::models::error::RouteError;
use crate::models::recording::RecordingArtifact;
use crate::models::state::SupervisorState;
use crate::models::status::SessionStatus;
use crate::processing::recording_buffer::RecordingBuffer;
use crate::route::audio_route::AudioRoute;
use crate::route::callback::RouteFlags;
use crate::storage::sample_library::SampleLibrary;
use crate::storage::wav_writer;
use crate::traits::audio_host::AudioHost;
use crate::traits::liveness::LivenessProbe;
use crate::traits::supervisor_delegate::SupervisorDelegate;

/// Mutable session state, guarded by the per-session lock.
///
/// Every user operation and every control-loop tick takes this lock; the
/// route callback never does.
struct ControlState {
    state: SupervisorState,
    catalog: Arc<DeviceCatalog>,
    selection: RouteSelection,
    route: Option<AudioRoute>,
    last_artifact: Option<RecordingArtifact>,
    recording_exists: bool,
    speaker_for_sample: String,
    save_sample_disabled: bool,
    delegate: Option<Arc<dyn SupervisorDelegate>>,
}

impl ControlState {
    fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            catalog: Arc::new(DeviceCatalog::default()),
            selection: RouteSelection::default(),
            route: None,
            last_artifact: None,
            recording_exists: false,
            speaker_for_sample: String::new(),
            save_sample_disabled: true,
            delegate: None,
        }
    }

    fn set_state(&mut self, new_state: SupervisorState) {
        if self.state == new_state {
            return;
        }
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(new_state);
        }
    }

    fn selection_changed(&self, route: &AudioRoute) -> bool {
        route.loopback_name() != self.selection.loopback_name || route.playback_name() != self.selection.playback_name
    }
}

/// Everything the control thread and the user-facing handle share.
struct SessionCore {
    token: String,
    host: Arc<dyn AudioHost>,
    liveness: Arc<dyn LivenessProbe>,
    config: SupervisorConfig,
    library: SampleLibrary,
    flags: Arc<RouteFlags>,
    recording: Arc<RecordingBuffer>,
    control: Mutex<ControlState>,
}

impl SessionCore {
    /// One control-loop tick.
    ///
    /// ```text
    /// stale            → close route (if any) → torn_down
    /// route, changed   → close route → open
    /// no route         → open: idle | probing → active | probing → idle
    /// ```
    fn poll_once(&self) -> SupervisorState {
        let mut control = self.control.lock();
        if control.state.is_terminal() {
            return SupervisorState::TornDown;
        }

        let connected = self.liveness.is_connected(&self.token);

        let close = match control.route {
            Some(ref route) => !connected || control.selection_changed(route),
            None => false,
        };
        if close {
            self.close_route(&mut control);
        }

        if !connected {
            self.recording.clear();
            control.set_state(SupervisorState::TornDown);
            log::info!("Stale audio processing handler removed for session {}.", self.token);
            return SupervisorState::TornDown;
        }

        if control.route.is_none() {
            self.open_selected_route(&mut control);
        }
        control.state
    }

    fn open_selected_route(&self, control: &mut ControlState) {
        if !control.selection.is_candidate() {
            control.set_state(SupervisorState::Idle);
            return;
        }
        control.set_state(SupervisorState::Probing);

        let catalog = Arc::clone(&control.catalog);
        let loopback = catalog.resolve_loopback(&control.selection.loopback_name);
        let playback = catalog.resolve_playback(&control.selection.playback_name);
        let (Some(loopback), Some(playback)) = (loopback, playback) else {
            log::debug!(
                "Selection {:?} / {:?} does not resolve in the current catalog",
                control.selection.loopback_name,
                control.selection.playback_name
            );
            control.set_state(SupervisorState::Idle);
            return;
        };

        let frames_per_buffer = self.config.frames_per_buffer(loopback.default_sample_rate());
        match AudioRoute::open(
            &*self.host,
            loopback,
            playback,
            frames_per_buffer,
            self.config.bit_depth,
            Arc::clone(&self.flags),
            Arc::clone(&self.recording),
        ) {
            Ok(route) => {
                log::info!(
                    "Processing audio from {} to {}.",
                    route.loopback_name(),
                    route.playback_name()
                );
                control.route = Some(route);
                control.set_state(SupervisorState::Active);
            }
            Err(e) => {
                log::warn!(
                    "Could not open route from {} to {}: {}",
                    loopback.display_name(),
                    playback.display_name(),
                    e
                );
                control.set_state(SupervisorState::Idle);
            }
        }
    }

    fn close_route(&self, control: &mut ControlState) {
        let Some(mut route) = control.route.take() else {
            return;
        };
        route.close();
        self.recording.clear();

        let failed = self.flags.take_failed_writes();
        if failed > 0 {
            log::warn!("{} output write(s) to {} failed", failed, route.playback_name());
        }
        log::info!(
            "Stopped processing audio from {} to {}.",
            route.loopback_name(),
            route.playback_name()
        );
    }
}

/// Per-client owner of one audio route.
///
/// A control thread polls the client's device selection and liveness once
/// per [`poll_interval`](SupervisorConfig::poll_interval), opening, swapping,
/// or tearing down the route. User operations run on the caller's thread and
/// are serialized with the control loop through the session lock.
///
/// ```text
/// [Front end] → set_*/toggle_*/recording ops ─┐
///                                             ├→ [ControlState lock] → AudioRoute
/// [Control thread] → poll_once every tick ────┘
/// ```
pub struct SessionSupervisor {
    core: Arc<SessionCore>,
    control_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SessionSupervisor {
    pub fn new(
        token: impl Into<String>,
        host: Arc<dyn AudioHost>,
        liveness: Arc<dyn LivenessProbe>,
        config: SupervisorConfig,
    ) -> Result<Self, RouteError> {
        config.validate().map_err(RouteError::ConfigurationFailed)?;
        let library = SampleLibrary::new(config.paths.speakers_dir.clone());
        Ok(Self {
            core: Arc::new(SessionCore {
                token: token.into(),
                host,
                liveness,
                config,
                library,
                flags: Arc::new(RouteFlags::new()),
                recording: Arc::new(RecordingBuffer::new()),
                control: Mutex::new(ControlState::new()),
            }),
            control_handle: Mutex::new(None),
        })
    }

    /// Create a supervisor, enumerate devices, and start its control loop.
    pub fn start(
        token: impl Into<String>,
        host: Arc<dyn AudioHost>,
        liveness: Arc<dyn LivenessProbe>,
        config: SupervisorConfig,
    ) -> Result<Self, RouteError> {
        let supervisor = Self::new(token, host, liveness, config)?;
        supervisor.find_audio_devices();
        supervisor.spawn_control_loop()?;
        Ok(supervisor)
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SupervisorDelegate>) {
        self.core.control.lock().delegate = Some(delegate);
    }

    pub fn token(&self) -> &str {
        &self.core.token
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.core.config
    }

    pub fn state(&self) -> SupervisorState {
        self.core.control.lock().state
    }

    // --- Control loop ---

    /// Run one control-loop tick on the calling thread.
    pub fn poll_once(&self) -> SupervisorState {
        self.core.poll_once()
    }

    /// Start the control thread. It exits once the session goes stale.
    pub fn spawn_control_loop(&self) -> Result<(), RouteError> {
        let mut handle_slot = self.control_handle.lock();
        if handle_slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(RouteError::ConfigurationFailed("control loop already running".into()));
        }

        let core = Arc::clone(&self.core);
        let handle = thread::Builder::new()
            .name(format!("session-supervisor-{}", self.core.token))
            .spawn(move || {
                let interval = core.config.poll_interval;
                while !core.poll_once().is_terminal() {
                    thread::sleep(interval);
                }
            })
            .map_err(|e| RouteError::Unknown(format!("failed to spawn control thread: {}", e)))?;

        *handle_slot = Some(handle);
        Ok(())
    }

    /// Block until the control thread has exited.
    pub fn join(&self) {
        let handle = self.control_handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Control thread for session {} panicked", self.core.token);
            }
        }
    }

    pub fn is_control_loop_running(&self) -> bool {
        self.control_handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    // --- Device selection ---

    /// Enumerate host devices and replace this session's catalog.
    pub fn find_audio_devices(&self) {
        let catalog = Arc::new(DeviceCatalog::enumerate(&*self.core.host));
        self.core.control.lock().catalog = catalog;
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Arc<DeviceCatalog> {
        Arc::clone(&self.core.control.lock().catalog)
    }

    pub fn set_loopback_device(&self, name: impl Into<String>) {
        self.core.control.lock().selection.loopback_name = name.into();
    }

    pub fn set_playback_device(&self, name: impl Into<String>) {
        self.core.control.lock().selection.playback_name = name.into();
    }

    pub fn selection(&self) -> RouteSelection {
        self.core.control.lock().selection.clone()
    }

    pub fn device_warning(&self) -> &'static str {
        let control = self.core.control.lock();
        control.catalog.device_warning(&control.selection)
    }

    pub fn devices_invalid(&self) -> bool {
        !self.device_warning().is_empty()
    }

    // --- Forward / mute ---

    pub fn toggle_forward(&self, enabled: bool) {
        let _control = self.core.control.lock();
        self.core.flags.set_forwarding(enabled);
    }

    pub fn set_muted(&self, muted: bool) {
        let _control = self.core.control.lock();
        self.core.flags.set_muted(muted);
    }

    // --- Recording ---

    /// Arm recording, discarding any unsaved frames and the cached artifact.
    pub fn start_recording(&self) {
        let mut control = self.core.control.lock();
        self.core.recording.start();
        control.recording_exists = false;
        control.last_artifact = None;
        control.save_sample_disabled = true;
    }

    /// Disarm recording and write what was captured as a new artifact.
    ///
    /// Returns `Ok(None)` when nothing was captured or the selected capture
    /// device no longer resolves; the cached artifact is cleared either way.
    pub fn stop_recording(&self) -> Result<Option<RecordingArtifact>, RouteError> {
        let mut control = self.core.control.lock();
        let payload = self.core.recording.stop();

        control.recording_exists = false;
        control.last_artifact = None;
        control.save_sample_disabled = true;

        let Some(loopback) = control.catalog.resolve_loopback(&control.selection.loopback_name).cloned() else {
            log::debug!("Recording stopped without a resolvable capture device");
            return Ok(None);
        };
        if payload.is_empty() {
            log::info!("Recording stopped with no captured audio");
            return Ok(None);
        }

        let artifact = wav_writer::write_artifact(
            &self.core.config.paths.recordings_dir,
            loopback.max_input_channels(),
            loopback.default_sample_rate(),
            self.core.config.bit_depth,
            &payload,
        )?;
        log::info!(
            "Recorded {:.2}s from {} to {}",
            artifact.duration_secs(),
            loopback.display_name(),
            artifact.file_path.display()
        );

        control.recording_exists = true;
        control.save_sample_disabled = control.speaker_for_sample.is_empty();
        control.last_artifact = Some(artifact.clone());
        if let Some(ref delegate) = control.delegate {
            delegate.on_recording_finished(&artifact);
        }
        Ok(Some(artifact))
    }

    pub fn is_recording(&self) -> bool {
        self.core.recording.is_armed()
    }

    pub fn last_artifact(&self) -> Option<RecordingArtifact> {
        self.core.control.lock().last_artifact.clone()
    }

    // --- Sample library ---

    pub fn select_speaker_for_sample(&self, label: impl Into<String>) {
        let mut control = self.core.control.lock();
        control.speaker_for_sample = label.into();
        control.save_sample_disabled = !control.recording_exists;
    }

    /// Copy the last artifact into the sample library under the selected
    /// speaker. No-op without an artifact or a speaker.
    pub fn save_sample(&self) -> Result<Option<PathBuf>, RouteError> {
        let control = self.core.control.lock();
        let Some(ref artifact) = control.last_artifact else {
            return Ok(None);
        };
        if control.speaker_for_sample.is_empty() {
            return Ok(None);
        }
        self.core
            .library
            .save(&control.speaker_for_sample, artifact)
            .map(Some)
    }

    /// Speaker labels currently in the sample library.
    pub fn speaker_options(&self) -> Vec<String> {
        self.core.library.speakers()
    }

    // --- Status ---

    pub fn status(&self) -> SessionStatus {
        let control = self.core.control.lock();
        let device_warning = control.catalog.device_warning(&control.selection);
        SessionStatus {
            state: control.state,
            loopback_device: control.selection.loopback_name.clone(),
            playback_device: control.selection.playback_name.clone(),
            loopback_device_names: control.catalog.loopback_names(),
            playback_device_names: control.catalog.playback_names(),
            device_warning: device_warning.to_string(),
            devices_invalid: !device_warning.is_empty(),
            forwarding_enabled: self.core.flags.forwarding_enabled(),
            muted: self.core.flags.muted(),
            recording: self.core.recording.is_armed(),
            recording_exists: control.recording_exists,
            recording_path: control.last_artifact.as_ref().map(|artifact| {
                self.core
                    .config
                    .paths
                    .relative_to_root(&artifact.file_path)
                    .to_string_lossy()
                    .into_owned()
            }),
            speaker_for_sample: control.speaker_for_sample.clone(),
            save_sample_disabled: control.save_sample_disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HostEvent, MockHost};
    use crate::session::registry::ConnectionRegistry;
    use std::fs;

    struct Fixture {
        host: Arc<MockHost>,
        registry: Arc<ConnectionRegistry>,
        supervisor: SessionSupervisor,
        root: PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.root).ok();
        }
    }

    fn fixture() -> Fixture {
        let root = std::env::temp_dir().join(format!("mute_button_supervisor_{}", uuid::Uuid::new_v4()));
        let host = Arc::new(MockHost::with_default_devices());
        let registry = Arc::new(ConnectionRegistry::new());
        registry.connect("client-1");
        let supervisor = SessionSupervisor::new(
            "client-1",
            host.clone(),
            registry.clone(),
            SupervisorConfig::with_upload_root(&root),
        )
        .unwrap();
        supervisor.find_audio_devices();
        Fixture {
            host,
            registry,
            supervisor,
            root,
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SupervisorConfig {
            callbacks_per_second: 0,
            ..Default::default()
        };
        let result = SessionSupervisor::new(
            "t",
            Arc::new(MockHost::with_default_devices()),
            Arc::new(ConnectionRegistry::new()),
            config,
        );
        assert!(matches!(result, Err(RouteError::ConfigurationFailed(_))));
    }

    #[test]
    fn idle_until_selection_is_complete() {
        let f = fixture();
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Idle);

        f.supervisor.set_loopback_device("Speakers");
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Idle);
        assert!(f.host.events().is_empty());
    }

    #[test]
    fn opens_route_with_rounded_frame_size() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        assert_eq!(f.supervisor.device_warning(), "");

        assert_eq!(f.supervisor.poll_once(), SupervisorState::Active);
        let format = f.host.capture_format().unwrap();
        assert_eq!(format.frames_per_buffer, 2400);
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(f.host.open_stream_count(), 2);

        // steady state: nothing reopened
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Active);
        assert_eq!(f.host.events().len(), 2);
    }

    #[test]
    fn unresolvable_selection_falls_back_to_idle() {
        let f = fixture();
        f.supervisor.set_loopback_device("Ghost");
        f.supervisor.set_playback_device("Headphones");
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Idle);
        assert!(f.host.events().is_empty());
    }

    #[test]
    fn open_failure_retried_next_tick() {
        let f = fixture();
        f.host.fail_open("Headphones");
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");

        assert_eq!(f.supervisor.poll_once(), SupervisorState::Idle);
        assert_eq!(f.host.open_stream_count(), 0);

        f.host.clear_failures();
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Active);
    }

    #[test]
    fn selection_change_closes_before_reopening() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();
        f.host.clear_events();

        f.supervisor.set_loopback_device("Headphones");
        f.supervisor.set_playback_device("Speakers");
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Active);

        assert_eq!(
            f.host.events(),
            vec![
                HostEvent::StopCapture("Speakers [Loopback]".into()),
                HostEvent::CloseCapture("Speakers [Loopback]".into()),
                HostEvent::StopPlayback("Headphones".into()),
                HostEvent::ClosePlayback("Headphones".into()),
                HostEvent::OpenPlayback("Speakers".into()),
                HostEvent::OpenCapture("Headphones [Loopback]".into()),
            ]
        );
        assert_eq!(f.host.max_concurrent_captures(), 1);
        assert_eq!(f.host.capture_format().unwrap().frames_per_buffer, 2205);
    }

    #[test]
    fn colliding_selection_closes_route() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();

        f.supervisor.set_playback_device("Speakers");
        assert_eq!(
            f.supervisor.device_warning(),
            "Capture device and playback device cannot be the same."
        );
        assert_eq!(f.supervisor.poll_once(), SupervisorState::Idle);
        assert_eq!(f.host.open_stream_count(), 0);
    }

    #[test]
    fn route_change_aborts_recording() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();
        f.supervisor.start_recording();
        f.host.feed(&[1, 2, 3, 4]);

        f.supervisor.set_playback_device("");
        f.supervisor.poll_once();

        assert!(!f.supervisor.is_recording());
        assert_eq!(f.supervisor.stop_recording().unwrap(), None);
    }

    #[test]
    fn stale_session_tears_down_once() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();
        f.host.clear_events();

        f.registry.disconnect("client-1");
        assert_eq!(f.supervisor.poll_once(), SupervisorState::TornDown);
        assert_eq!(f.supervisor.poll_once(), SupervisorState::TornDown);

        assert_eq!(f.host.events().len(), 4);
        assert_eq!(f.host.open_stream_count(), 0);

        // reconnecting does not revive a torn-down session
        f.registry.connect("client-1");
        assert_eq!(f.supervisor.poll_once(), SupervisorState::TornDown);
        assert_eq!(f.host.events().len(), 4);
    }

    #[test]
    fn stale_idle_session_tears_down() {
        let f = fixture();
        f.registry.disconnect("client-1");
        assert_eq!(f.supervisor.poll_once(), SupervisorState::TornDown);
        assert!(f.host.events().is_empty());
    }

    #[test]
    fn forward_and_mute_reach_callback() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();
        let playback = f.host.last_playback().unwrap();

        f.host.feed(&[1, 1]);
        f.supervisor.toggle_forward(true);
        f.host.feed(&[2, 2]);
        f.supervisor.set_muted(true);
        f.host.feed(&[3, 3]);
        f.supervisor.set_muted(false);
        f.host.feed(&[4, 4]);

        assert_eq!(playback.writes(), vec![vec![2, 2], vec![4, 4]]);
    }

    #[test]
    fn recording_without_frames_produces_nothing() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();

        f.supervisor.start_recording();
        assert!(f.supervisor.is_recording());
        assert_eq!(f.supervisor.stop_recording().unwrap(), None);

        let status = f.supervisor.status();
        assert!(!status.recording);
        assert!(!status.recording_exists);
        assert_eq!(status.recording_path, None);
    }

    #[test]
    fn save_sample_flow() {
        let f = fixture();
        f.supervisor.config().paths.prepare().unwrap();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();

        // nothing to save yet
        f.supervisor.select_speaker_for_sample("alice");
        assert!(f.supervisor.status().save_sample_disabled);
        assert_eq!(f.supervisor.save_sample().unwrap(), None);

        f.supervisor.start_recording();
        f.host.feed(&[0u8; 9600]);
        let artifact = f.supervisor.stop_recording().unwrap().unwrap();
        assert_eq!(artifact.channels, 2);
        assert_eq!(artifact.sample_rate, 48000);

        let status = f.supervisor.status();
        assert!(status.recording_exists);
        assert!(!status.save_sample_disabled);
        let expected = std::path::Path::new("audio").join("tmp").join(artifact.file_name());
        assert_eq!(status.recording_path, Some(expected.to_string_lossy().into_owned()));

        let saved = f.supervisor.save_sample().unwrap().unwrap();
        assert!(saved.starts_with(&f.supervisor.config().paths.speakers_dir));
        assert!(artifact.file_path.exists());
        assert_eq!(f.supervisor.speaker_options(), vec!["alice".to_string()]);
    }

    #[test]
    fn stop_before_speaker_keeps_save_disabled() {
        let f = fixture();
        f.supervisor.set_loopback_device("Speakers");
        f.supervisor.set_playback_device("Headphones");
        f.supervisor.poll_once();

        f.supervisor.start_recording();
        f.host.feed(&[5u8; 16]);
        f.supervisor.stop_recording().unwrap();
        assert!(f.supervisor.status().save_sample_disabled);
        assert_eq!(f.supervisor.save_sample().unwrap(), None);

        f.supervisor.select_speaker_for_sample("bob");
        assert!(!f.supervisor.status().save_sample_disabled);
    }

    #[test]
    fn control_loop_exits_when_stale() {
        let f = fixture();
        let fast = SessionSupervisor::start(
            "client-2",
            f.host.clone(),
            f.registry.clone(),
            SupervisorConfig {
                poll_interval: std::time::Duration::from_millis(5),
                ..SupervisorConfig::with_upload_root(&f.root)
            },
        )
        .unwrap();
        // never connected: first tick tears down
        fast.join();
        assert_eq!(fast.state(), SupervisorState::TornDown);
        assert!(!fast.is_control_loop_running());
    }
}
