use std::sync::Arc;

use crate::models::media::{VideoFrame, VideoTrackSettings};

/// A live capture or generated track.
///
/// Implemented by platform backends for captured tracks and by the core for
/// the composition surface and the mixed audio output.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    /// End the track. Stopping an already-stopped track does nothing.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// A track that yields video frames.
pub trait VideoTrack: MediaTrack {
    /// Settings negotiated with the device.
    fn settings(&self) -> VideoTrackSettings;

    /// The most recent frame, or `None` if no frame is ready yet.
    fn current_frame(&self) -> Option<Arc<VideoFrame>>;
}

/// A track that yields mono f32 audio samples.
pub trait AudioTrack: MediaTrack {
    fn sample_rate(&self) -> u32;

    /// Drain the samples captured since the previous call.
    fn read_samples(&self) -> Vec<f32>;
}
