/// Connection-membership query provided by the hosting front-end transport.
///
/// Called by the supervisor at most once per poll tick. Must be a pure read.
pub trait LivenessProbe: Send + Sync {
    /// Whether the client owning `token` is still connected.
    fn is_connected(&self, token: &str) -> bool;
}
