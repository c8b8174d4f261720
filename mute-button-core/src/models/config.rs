use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::RouteError;

/// On-disk locations used by a session.
///
/// Everything lives under a single upload root so the front end can serve
/// recordings by their path relative to it:
/// ```text
/// <root>/audio/tmp/<uuid>.wav          recordings (wiped on startup)
/// <root>/audio/speakers/<label>/...    sample library
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPaths {
    pub upload_root: PathBuf,
    pub recordings_dir: PathBuf,
    pub speakers_dir: PathBuf,
}

impl AudioPaths {
    pub fn under(upload_root: impl Into<PathBuf>) -> Self {
        let upload_root = upload_root.into();
        let audio = upload_root.join("audio");
        Self {
            recordings_dir: audio.join("tmp"),
            speakers_dir: audio.join("speakers"),
            upload_root,
        }
    }

    /// Create the speakers directory and reset the recordings directory.
    ///
    /// Recordings that were never saved to a speaker do not survive a restart.
    pub fn prepare(&self) -> Result<(), RouteError> {
        fs::create_dir_all(&self.speakers_dir)
            .map_err(|e| RouteError::StorageError(format!("failed to create speakers directory: {}", e)))?;
        if self.recordings_dir.exists() {
            fs::remove_dir_all(&self.recordings_dir)
                .map_err(|e| RouteError::StorageError(format!("failed to clear recordings directory: {}", e)))?;
        }
        fs::create_dir_all(&self.recordings_dir)
            .map_err(|e| RouteError::StorageError(format!("failed to create recordings directory: {}", e)))?;
        Ok(())
    }

    /// Path relative to the upload root, as exposed to the front end.
    pub fn relative_to_root<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.upload_root).unwrap_or(path)
    }
}

/// Configuration for a session supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Control-loop tick; liveness is queried once per tick (default: 1s).
    pub poll_interval: Duration,

    /// Callback invocations per second at the capture rate (default: 20,
    /// i.e. 50 ms buffers).
    pub callbacks_per_second: u32,

    /// Bit depth of streams and recordings. Only 16 is supported.
    pub bit_depth: u16,

    pub paths: AudioPaths,
}

impl SupervisorConfig {
    pub fn with_upload_root(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            paths: AudioPaths::under(upload_root),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.callbacks_per_second == 0 {
            return Err("callbacks per second must be positive".into());
        }
        if self.bit_depth != 16 {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        Ok(())
    }

    /// Frames per callback buffer for a capture rate: `round(rate / callbacks_per_second)`.
    pub fn frames_per_buffer(&self, sample_rate: u32) -> u32 {
        (f64::from(sample_rate) / f64::from(self.callbacks_per_second)).round() as u32
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            callbacks_per_second: 20,
            bit_depth: 16,
            paths: AudioPaths::under("uploaded_files"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SupervisorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.callbacks_per_second, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_other_bit_depths() {
        let config = SupervisorConfig {
            bit_depth: 24,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err(), "unsupported bit depth: 24");
    }

    #[test]
    fn frames_per_buffer_rounds() {
        let config = SupervisorConfig::default();
        assert_eq!(config.frames_per_buffer(48000), 2400);
        assert_eq!(config.frames_per_buffer(44100), 2205);
        // 22050 / 20 = 1102.5 rounds away from zero
        assert_eq!(config.frames_per_buffer(22050), 1103);
    }

    #[test]
    fn paths_layout() {
        let paths = AudioPaths::under("/srv/upload");
        assert_eq!(paths.recordings_dir, PathBuf::from("/srv/upload/audio/tmp"));
        assert_eq!(paths.speakers_dir, PathBuf::from("/srv/upload/audio/speakers"));
        let file = paths.recordings_dir.join("a.wav");
        assert_eq!(paths.relative_to_root(&file), Path::new("audio/tmp/a.wav"));
    }

    #[test]
    fn prepare_wipes_recordings_and_keeps_speakers() {
        let root = std::env::temp_dir().join(format!("mute_button_paths_{}", uuid::Uuid::new_v4()));
        let paths = AudioPaths::under(&root);
        fs::create_dir_all(&paths.recordings_dir).unwrap();
        fs::write(paths.recordings_dir.join("stale.wav"), b"x").unwrap();
        fs::create_dir_all(paths.speakers_dir.join("alice")).unwrap();

        paths.prepare().unwrap();

        assert!(paths.recordings_dir.is_dir());
        assert_eq!(fs::read_dir(&paths.recordings_dir).unwrap().count(), 0);
        assert!(paths.speakers_dir.join("alice").is_dir());

        fs::remove_dir_all(&root).ok();
    }
}
