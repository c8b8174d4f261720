use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A finished recording written to disk.
///
/// Produced at most once per stop-recording action and never modified
/// afterwards. Saving to the sample library copies the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    /// Generated identifier; also the file stem.
    pub id: String,
    pub file_path: PathBuf,
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
    /// Length of the PCM payload in bytes (excluding the WAV header).
    pub data_len: u64,
    pub checksum: String,
}

impl RecordingArtifact {
    /// File name of the artifact, `<id>.wav`.
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.id)
    }

    pub fn duration_secs(&self) -> f64 {
        let bytes_per_frame = u64::from(self.channels) * u64::from(self.bit_depth / 8);
        if bytes_per_frame == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.data_len / bytes_per_frame) as f64 / f64::from(self.sample_rate)
    }
}

/// Metadata stored next to a sample in the library.
///
/// Serialized as `<id>.metadata.json` beside the copied WAV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub id: String,
    pub speaker: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub checksum: String,
    pub created_at: String,
}

impl SampleMetadata {
    pub fn for_artifact(artifact: &RecordingArtifact, speaker: &str) -> Self {
        Self {
            id: artifact.id.clone(),
            speaker: speaker.to_string(),
            channels: artifact.channels,
            sample_rate: artifact.sample_rate,
            duration_secs: artifact.duration_secs(),
            checksum: artifact.checksum.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
