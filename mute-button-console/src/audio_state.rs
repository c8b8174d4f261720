use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use mute_button_core::{ConnectionRegistry, RecordingArtifact, SessionSupervisor, SupervisorDelegate, SupervisorState};

/// Console-wide state: the one client session and the registry that
/// decides whether it is still alive.
pub struct AudioState {
    pub token: String,
    pub registry: Arc<ConnectionRegistry>,
    pub supervisor: SessionSupervisor,
}

impl AudioState {
    pub fn new(token: String, registry: Arc<ConnectionRegistry>, supervisor: SessionSupervisor) -> Self {
        Self {
            token,
            registry,
            supervisor,
        }
    }

    /// Mark the client gone and wait for the supervisor to tear down.
    pub fn shutdown(&self) {
        self.registry.disconnect(&self.token);
        self.supervisor.join();
    }
}

/// SupervisorDelegate that writes events to the console as JSON lines.
pub struct ConsoleDelegate<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleDelegate<W> {
    pub fn new(out: W) -> Arc<Self> {
        Arc::new(Self { out: Mutex::new(out) })
    }

    fn emit(&self, event: &Event<'_>) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let mut out = self.out.lock();
                let _ = writeln!(out, "{}", line);
                let _ = out.flush();
            }
            Err(e) => log::warn!("Failed to serialize event: {}", e),
        }
    }
}

// -- Event payloads --

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    StateChanged {
        state: SupervisorState,
    },
    RecordingFinished {
        file_path: String,
        duration_secs: f64,
        checksum: &'a str,
    },
}

impl<W: Write + Send> SupervisorDelegate for ConsoleDelegate<W> {
    fn on_state_changed(&self, state: SupervisorState) {
        log::debug!("Supervisor state: {}", state.as_str());
        self.emit(&Event::StateChanged { state });
    }

    fn on_recording_finished(&self, artifact: &RecordingArtifact) {
        self.emit(&Event::RecordingFinished {
            file_path: artifact.file_path.to_string_lossy().into_owned(),
            duration_secs: artifact.duration_secs(),
            checksum: &artifact.checksum,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_json_lines() {
        let delegate = ConsoleDelegate::new(Vec::new());
        delegate.on_state_changed(SupervisorState::Active);
        delegate.on_state_changed(SupervisorState::TornDown);

        let out = String::from_utf8(delegate.out.lock().clone()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec![
            r#"{"event":"state_changed","state":"active"}"#,
            r#"{"event":"state_changed","state":"torn_down"}"#,
        ]);
    }
}
