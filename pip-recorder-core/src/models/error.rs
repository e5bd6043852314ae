use thiserror::Error;

/// Errors that can occur while acquiring, composing, mixing or encoding a recording.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user refused a permission prompt.
    #[error("permission denied: {0}")]
    AcquisitionDenied(String),

    /// The requested capture device does not exist or is in use.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// No candidate container/codec combination is supported by the encoder.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// A source reported a zero-sized frame geometry.
    #[error("degenerate geometry: {width}x{height}")]
    GeometryDegenerate { width: u32, height: u32 },

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    /// Whether the session can simply be retried from idle after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnsupportedEncoding(_) | Self::EncodingFailed(_))
    }

    /// Plain description suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::AcquisitionDenied(msg) | Self::DeviceUnavailable(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
