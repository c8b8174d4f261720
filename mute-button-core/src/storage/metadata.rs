use std::fs;
use std::path::Path;

use crate::models::error::RouteError;
use crate::models::recording::SampleMetadata;

/// Write sample metadata as a JSON sidecar file.
///
/// Creates `{sample_path}.metadata.json` alongside the sample.
pub fn write_metadata(metadata: &SampleMetadata, sample_path: &Path) -> Result<(), RouteError> {
    let metadata_path = sample_path.with_extension("metadata.json");
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RouteError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&metadata_path, json)
        .map_err(|e| RouteError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read sample metadata from a JSON sidecar file.
pub fn read_metadata(sample_path: &Path) -> Result<SampleMetadata, RouteError> {
    let metadata_path = sample_path.with_extension("metadata.json");
    let json = fs::read_to_string(&metadata_path)
        .map_err(|e| RouteError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| RouteError::StorageError(format!("failed to parse metadata: {}", e)))
}
