use crate::models::artifact::RecordingArtifact;
use crate::models::error::CaptureError;
use crate::models::state::SessionState;

/// Event delegate for recording session notifications.
///
/// Called from whichever context drives the session (the caller of
/// `start`/`stop`, or the scheduler tick for chunk events).
pub trait RecorderDelegate: Send + Sync {
    fn on_state_changed(&self, state: SessionState);

    /// Called when an error is surfaced to the user.
    fn on_error(&self, error: &CaptureError);

    /// Called after a non-empty chunk was appended.
    fn on_chunk(&self, chunk_len: usize, total_chunks: usize);

    /// Called once the artifact is assembled.
    fn on_recording_finished(&self, artifact: &RecordingArtifact);
}
