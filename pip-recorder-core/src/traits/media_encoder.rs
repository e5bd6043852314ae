use crate::models::config::EncoderSettings;
use crate::models::error::CaptureError;
use crate::models::media::CombinedStream;

/// Interface for the platform's incremental media encoder.
///
/// The recorder drives it: `start` once, `request_data` on every chunk
/// interval, and `stop` exactly once when finalizing. Returned buffers may
/// be empty when nothing new was encoded.
pub trait MediaEncoder: Send {
    /// Whether the container/codec combination can be produced.
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn start(&mut self, stream: CombinedStream, settings: &EncoderSettings) -> Result<(), CaptureError>;

    /// Encoded data produced since the previous request.
    fn request_data(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Stop encoding and return any trailing data. Returning is the stop
    /// acknowledgment: nothing is emitted afterwards.
    fn stop(&mut self) -> Result<Vec<u8>, CaptureError>;

    fn is_active(&self) -> bool;
}
