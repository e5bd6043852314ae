use std::fmt;

use serde::{Deserialize, Serialize};

/// The finished recording: every collected chunk concatenated in emission order.
#[derive(Clone, PartialEq)]
pub struct RecordingArtifact {
    pub id: String,
    pub file_name: String,
    /// Negotiated container MIME type.
    pub mime_type: String,
    pub data: Vec<u8>,
    pub chunk_count: usize,
    pub duration_secs: f64,
    /// SHA-256 of `data`, lowercase hex.
    pub checksum: String,
    pub created_at: String,
}

impl RecordingArtifact {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn metadata(&self) -> RecordingMetadata {
        RecordingMetadata {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.data.len() as u64,
            chunk_count: self.chunk_count,
            duration_secs: self.duration_secs,
            checksum: self.checksum.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

impl fmt::Debug for RecordingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingArtifact")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("chunk_count", &self.chunk_count)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

/// Metadata describing a recording, serializable as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub chunk_count: usize,
    pub duration_secs: f64,
    pub checksum: String,
    pub created_at: String,
}
