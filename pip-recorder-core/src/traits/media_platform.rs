use crate::models::config::{CameraConstraints, DisplayConstraints};
use crate::models::error::CaptureError;
use crate::models::media::MediaSource;

/// Interface to the platform media layer.
///
/// Both requests may block for as long as the user takes to answer the
/// permission prompt. Implementations map a refused prompt to
/// `CaptureError::AcquisitionDenied` and a missing or busy device to
/// `CaptureError::DeviceUnavailable`, with a human-readable message.
pub trait MediaPlatform: Send + Sync {
    /// Request a display share: video is mandatory, audio optional.
    fn request_display(&mut self, constraints: &DisplayConstraints) -> Result<MediaSource, CaptureError>;

    /// Request the camera (at the constrained resolution) and the microphone.
    fn request_camera_mic(&mut self, constraints: &CameraConstraints) -> Result<MediaSource, CaptureError>;
}
