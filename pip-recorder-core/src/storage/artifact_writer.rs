use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::artifact::{RecordingArtifact, RecordingMetadata};
use crate::models::error::CaptureError;

/// Save a finished recording into `directory` under its file name, with a
/// JSON metadata sidecar next to it. Returns the path of the recording.
pub fn save_artifact(artifact: &RecordingArtifact, directory: &Path) -> Result<PathBuf, CaptureError> {
    fs::create_dir_all(directory).map_err(|e| storage_error("cannot create", directory, e))?;

    let file_name = Path::new(&artifact.file_name)
        .file_name()
        .ok_or_else(|| CaptureError::StorageError(format!("invalid file name: {:?}", artifact.file_name)))?;
    let path = directory.join(file_name);

    fs::write(&path, &artifact.data).map_err(|e| storage_error("cannot write", &path, e))?;
    write_metadata(&artifact.metadata(), &path)?;

    log::info!("Saved {} ({} bytes)", path.display(), artifact.len());
    Ok(path)
}

const SIDECAR_EXTENSION: &str = "metadata.json";

/// Sidecar location for a saved recording: `clip.webm` → `clip.metadata.json`.
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension(SIDECAR_EXTENSION)
}

fn storage_error(context: &str, path: &Path, source: impl std::fmt::Display) -> CaptureError {
    CaptureError::StorageError(format!("{} {}: {}", context, path.display(), source))
}

/// Store `metadata` in the sidecar of `recording_path`, replacing any previous one.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), CaptureError> {
    let sidecar = sidecar_path(recording_path);
    let file = File::create(&sidecar).map_err(|e| storage_error("cannot create", &sidecar, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, metadata).map_err(|e| storage_error("cannot encode", &sidecar, e))?;
    writer.flush().map_err(|e| storage_error("cannot flush", &sidecar, e))
}

/// Load the sidecar written by [`save_artifact`] for `recording_path`.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let sidecar = sidecar_path(recording_path);
    let file = File::open(&sidecar).map_err(|e| storage_error("cannot open", &sidecar, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| storage_error("malformed sidecar", &sidecar, e))
}

/// SHA-256 hex digest of a buffer.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
