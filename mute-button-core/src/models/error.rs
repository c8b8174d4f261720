use thiserror::Error;

/// Errors that can occur while enumerating devices, running a route, or
/// persisting recordings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("audio host unavailable: {0}")]
    HostUnavailable(String),

    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("failed to open stream on {device}: {reason}")]
    StreamOpenFailed { device: String, reason: String },

    #[error("stream write failed: {0}")]
    StreamWriteFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl RouteError {
    pub fn stream_open(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StreamOpenFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_open_display() {
        let err = RouteError::stream_open("Headphones", "exclusive mode conflict");
        assert_eq!(
            err.to_string(),
            "failed to open stream on Headphones: exclusive mode conflict"
        );
    }
}
