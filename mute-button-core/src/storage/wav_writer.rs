use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RouteError;
use crate::models::recording::RecordingArtifact;
use crate::processing::wav_format;

/// Largest PCM payload whose RIFF size field (`36 + data`) still fits in a `u32`.
pub const MAX_WAV_DATA_LEN: u64 = u32::MAX as u64 - 36;

/// Streaming 16-bit PCM WAV writer.
///
/// Writes a placeholder header on open and patches the size fields on close.
///
/// ```text
/// [44-byte WAV header]
/// [raw 16-bit PCM data...]
/// ```
pub struct WavFileWriter {
    file_path: PathBuf,
    file: Option<File>,
    total_bytes_written: u64,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
            total_bytes_written: 0,
        }
    }

    /// Create the file (and parent directories) and write the header.
    pub fn open(&mut self, sample_rate: u32, bit_depth: u16, channels: u16) -> Result<(), RouteError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RouteError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| RouteError::StorageError(format!("failed to create file: {}", e)))?;
        self.file = Some(file);

        let header = wav_format::generate_wav_header(sample_rate, bit_depth, channels, 0);
        self.write_raw(&header)
    }

    /// Append raw PCM bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), RouteError> {
        if self.file.is_none() {
            return Err(RouteError::StorageError("file is not open for writing".into()));
        }
        let data_len = self.total_bytes_written.saturating_sub(wav_format::WAV_HEADER_SIZE as u64);
        check_data_len(data_len + data.len() as u64)?;
        self.write_raw(data)
    }

    /// Patch the header sizes, flush, and return the SHA-256 of the file.
    pub fn close(&mut self) -> Result<String, RouteError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| RouteError::StorageError("file is not open".into()))?;

        let mut header = [0u8; wav_format::WAV_HEADER_SIZE];
        let data_size = self.total_bytes_written - wav_format::WAV_HEADER_SIZE as u64;
        wav_format::patch_file_size(&mut header, self.total_bytes_written);
        wav_format::patch_data_size(&mut header, data_size);

        file.seek(SeekFrom::Start(4))
            .map_err(|e| RouteError::StorageError(e.to_string()))?;
        file.write_all(&header[4..8])
            .map_err(|e| RouteError::StorageError(e.to_string()))?;
        file.seek(SeekFrom::Start(40))
            .map_err(|e| RouteError::StorageError(e.to_string()))?;
        file.write_all(&header[40..44])
            .map_err(|e| RouteError::StorageError(e.to_string()))?;
        file.flush().map_err(|e| RouteError::StorageError(e.to_string()))?;
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Total bytes written so far (including the WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), RouteError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RouteError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| RouteError::StorageError(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

/// Write `payload` as a new artifact named `<uuid>.wav` under `dir`.
pub fn write_artifact(
    dir: &Path,
    channels: u16,
    sample_rate: u32,
    bit_depth: u16,
    payload: &[u8],
) -> Result<RecordingArtifact, RouteError> {
    check_data_len(payload.len() as u64)?;

    let id = uuid::Uuid::new_v4().to_string();
    let file_path = dir.join(format!("{}.wav", id));

    let mut writer = WavFileWriter::new(file_path.clone());
    writer.open(sample_rate, bit_depth, channels)?;
    writer.write(payload)?;
    let checksum = writer.close()?;

    Ok(RecordingArtifact {
        id,
        file_path,
        channels,
        sample_rate,
        bit_depth,
        data_len: payload.len() as u64,
        checksum,
    })
}

/// Reject payloads the 32-bit WAV size fields cannot describe.
fn check_data_len(len: u64) -> Result<(), RouteError> {
    if len > MAX_WAV_DATA_LEN {
        return Err(RouteError::StorageError(format!(
            "recording too large for WAV: {} bytes (max {})",
            len, MAX_WAV_DATA_LEN
        )));
    }
    Ok(())
}

/// Compute SHA-256 hex digest of a file.
pub(crate) fn sha256_file(path: &Path) -> Result<String, RouteError> {
    let data = fs::read(path)
        .map_err(|e| RouteError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::wav_format::parse_wav_header;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mute_button_writer_{}_{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn write_plain_wav() {
        let dir = temp_dir("plain");
        let path = dir.join("plain.wav");

        let mut writer = WavFileWriter::new(path.clone());
        writer.open(48000, 16, 2).unwrap();
        writer.write(&[0u8; 16]).unwrap();
        writer.write(&[1u8; 8]).unwrap();
        let checksum = writer.close().unwrap();
        assert_eq!(checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 24);
        let header = parse_wav_header(&file_data).unwrap();
        assert_eq!(header.data_size, 24);
        assert_eq!(header.channels, 2);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn write_before_open_fails() {
        let mut writer = WavFileWriter::new(temp_dir("closed").join("x.wav"));
        assert!(matches!(writer.write(&[0u8; 4]), Err(RouteError::StorageError(_))));
        assert!(writer.close().is_err());
    }

    #[test]
    fn oversized_payload_rejected() {
        assert!(check_data_len(MAX_WAV_DATA_LEN).is_ok());
        assert!(matches!(
            check_data_len(u64::from(u32::MAX)),
            Err(RouteError::StorageError(_))
        ));

        let dir = temp_dir("oversized");
        let mut writer = WavFileWriter::new(dir.join("big.wav"));
        writer.open(48000, 16, 2).unwrap();
        // pretend the file already holds all but two bytes of the limit
        writer.total_bytes_written = wav_format::WAV_HEADER_SIZE as u64 + MAX_WAV_DATA_LEN - 2;
        assert!(writer.write(&[0u8; 2]).is_ok());
        assert!(matches!(writer.write(&[0u8; 2]), Err(RouteError::StorageError(_))));
        assert_eq!(
            fs::metadata(writer.file_path()).unwrap().len(),
            wav_format::WAV_HEADER_SIZE as u64 + 2
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn artifact_named_by_fresh_id() {
        let dir = temp_dir("artifact");
        let payload: Vec<u8> = (0..32u8).collect();

        let a = write_artifact(&dir, 1, 44100, 16, &payload).unwrap();
        let b = write_artifact(&dir, 1, 44100, 16, &payload).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.file_path.file_name().unwrap().to_string_lossy(), a.file_name());
        assert_eq!(a.data_len, 32);
        // identical content, identical checksum
        assert_eq!(a.checksum, b.checksum);

        let bytes = fs::read(&a.file_path).unwrap();
        assert_eq!(&bytes[44..], payload.as_slice());
        let header = parse_wav_header(&bytes).unwrap();
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bit_depth, 16);

        fs::remove_dir_all(&dir).ok();
    }
}
