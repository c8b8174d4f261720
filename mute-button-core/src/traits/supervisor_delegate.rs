use crate::models::recording::RecordingArtifact;
use crate::models::state::SupervisorState;

/// Event delegate for supervisor notifications.
///
/// Methods are called from whichever thread drove the change: the control
/// loop for state changes, the caller of `stop_recording` for artifacts.
/// Both run under the session lock, so implementations must not call back
/// into the supervisor.
pub trait SupervisorDelegate: Send + Sync {
    /// Called when the control loop changes state.
    fn on_state_changed(&self, state: SupervisorState);

    /// Called when a recording artifact has been written.
    fn on_recording_finished(&self, artifact: &RecordingArtifact);
}
