use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::RouteError;
use crate::models::recording::{RecordingArtifact, SampleMetadata};
use crate::storage::metadata;

/// Directory-per-speaker store of recording samples.
///
/// ```text
/// <root>/<speaker>/<id>.wav
/// <root>/<speaker>/<id>.metadata.json
/// ```
/// Entries are only ever added; existing files are never rewritten.
#[derive(Debug, Clone)]
pub struct SampleLibrary {
    root: PathBuf,
}

impl SampleLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Speaker labels, one per subdirectory, sorted.
    ///
    /// A missing or unreadable root yields an empty list.
    pub fn speakers(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut speakers: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        speakers.sort();
        speakers
    }

    /// Sample files stored for `speaker`, sorted by file name.
    pub fn samples(&self, speaker: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.root.join(speaker)) else {
            return Vec::new();
        };
        let mut samples: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "wav"))
            .collect();
        samples.sort();
        samples
    }

    /// Copy `artifact` into the `speaker` directory and write its metadata.
    ///
    /// The original artifact file is left in place. Saving an artifact that
    /// is already stored for `speaker` returns the existing path untouched.
    pub fn save(&self, speaker: &str, artifact: &RecordingArtifact) -> Result<PathBuf, RouteError> {
        validate_label(speaker)?;

        let speaker_dir = self.root.join(speaker);
        fs::create_dir_all(&speaker_dir)
            .map_err(|e| RouteError::StorageError(format!("failed to create speaker directory: {}", e)))?;

        let destination = speaker_dir.join(artifact.file_name());
        if destination.exists() {
            log::debug!("Sample {} already saved for speaker '{}'", artifact.id, speaker);
            return Ok(destination);
        }
        fs::copy(&artifact.file_path, &destination)
            .map_err(|e| RouteError::StorageError(format!("failed to copy sample: {}", e)))?;

        metadata::write_metadata(&SampleMetadata::for_artifact(artifact, speaker), &destination)?;

        log::info!("Saved sample {} for speaker '{}'", artifact.id, speaker);
        Ok(destination)
    }
}

/// Labels become directory names, so they must be a single path component.
fn validate_label(label: &str) -> Result<(), RouteError> {
    let trimmed = label.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(RouteError::ConfigurationFailed(format!("invalid speaker label: '{}'", label)));
    }
    if label.contains(['/', '\\', ':']) {
        return Err(RouteError::ConfigurationFailed(format!(
            "speaker label must not contain path separators: '{}'",
            label
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wav_writer::write_artifact;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mute_button_library_{}_{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_root_lists_no_speakers() {
        let library = SampleLibrary::new(temp_root("missing"));
        assert!(library.speakers().is_empty());
        assert!(library.samples("alice").is_empty());
    }

    #[test]
    fn save_copies_without_consuming() {
        let root = temp_root("save");
        let scratch = root.join("tmp");
        let artifact = write_artifact(&scratch, 2, 48000, 16, &[0u8; 96]).unwrap();
        let library = SampleLibrary::new(root.join("speakers"));

        let saved = library.save("alice", &artifact).unwrap();

        assert!(artifact.file_path.exists());
        assert_eq!(saved.file_name().unwrap().to_string_lossy(), artifact.file_name());
        assert_eq!(fs::read(&saved).unwrap(), fs::read(&artifact.file_path).unwrap());
        assert_eq!(library.speakers(), vec!["alice".to_string()]);
        assert_eq!(library.samples("alice"), vec![saved.clone()]);

        let meta = metadata::read_metadata(&saved).unwrap();
        assert_eq!(meta.speaker, "alice");
        assert_eq!(meta.checksum, artifact.checksum);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn saving_twice_keeps_first_copy() {
        let root = temp_root("twice");
        let artifact = write_artifact(&root.join("tmp"), 1, 48000, 16, &[3u8; 32]).unwrap();
        let library = SampleLibrary::new(root.join("speakers"));

        let first = library.save("alice", &artifact).unwrap();
        let stored = fs::read(&first).unwrap();
        let sidecar = first.with_extension("metadata.json");
        let stored_meta = fs::read(&sidecar).unwrap();

        // change the source; a second save must not pick it up
        fs::write(&artifact.file_path, b"rewritten").unwrap();
        let second = library.save("alice", &artifact).unwrap();

        assert_eq!(second, first);
        assert_eq!(fs::read(&second).unwrap(), stored);
        assert_eq!(fs::read(&sidecar).unwrap(), stored_meta);
        assert_eq!(library.samples("alice").len(), 1);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn speakers_sorted_and_files_ignored() {
        let root = temp_root("sorted");
        fs::create_dir_all(root.join("zoe")).unwrap();
        fs::create_dir_all(root.join("bob")).unwrap();
        fs::write(root.join("stray.wav"), b"x").unwrap();

        let library = SampleLibrary::new(&root);
        assert_eq!(library.speakers(), vec!["bob".to_string(), "zoe".to_string()]);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn rejects_path_like_labels() {
        assert!(validate_label("").is_err());
        assert!(validate_label("  ").is_err());
        assert!(validate_label("..").is_err());
        assert!(validate_label("a/b").is_err());
        assert!(validate_label("a\\b").is_err());
        assert!(validate_label("Dr. Smith").is_ok());
    }
}
