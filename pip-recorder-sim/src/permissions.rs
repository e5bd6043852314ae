//! Scripted permission outcomes.
//!
//! A real backend learns these from the user-facing consent prompt; the
//! synthetic platform is told up front which one to report.

use pip_recorder_core::models::error::CaptureError;
use pip_recorder_core::models::media::SourceKind;

/// Result of the consent step for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionOutcome {
    #[default]
    Granted,
    /// The user dismissed or refused the prompt.
    Denied,
    /// No matching device exists.
    NotFound,
    /// The device is held by another application.
    InUse,
}

impl PermissionOutcome {
    /// Map the outcome to the error surfaced for `kind`.
    pub fn check(self, kind: SourceKind) -> Result<(), CaptureError> {
        let device = match kind {
            SourceKind::Display => "screen",
            SourceKind::CameraMic => "camera and microphone",
        };
        match self {
            Self::Granted => Ok(()),
            Self::Denied => Err(CaptureError::AcquisitionDenied(format!(
                "Permission to capture the {} was denied",
                device
            ))),
            Self::NotFound => Err(CaptureError::DeviceUnavailable(format!("No {} was found", device))),
            Self::InUse => Err(CaptureError::DeviceUnavailable(format!(
                "The {} is in use by another application",
                device
            ))),
        }
    }
}
