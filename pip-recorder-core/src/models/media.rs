use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use crate::traits::media_track::{AudioTrack, VideoTrack};

/// Which capture request produced a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Screen, window or tab share (optionally with system audio).
    Display,
    /// Webcam video plus microphone audio.
    CameraMic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => write!(f, "display"),
            Self::CameraMic => write!(f, "camera/microphone"),
        }
    }
}

/// Pixel dimensions of a video track or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Surface size used when the background source does not report one.
    pub const FALLBACK: Resolution = Resolution::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Height divided by width, `None` when the width is zero.
    pub fn inverse_aspect(&self) -> Option<f64> {
        if self.width == 0 {
            return None;
        }
        Some(self.height as f64 / self.width as f64)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single RGBA8 video frame.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl VideoFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = Resolution::new(width, height).pixel_count() * Self::BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(CaptureError::ConfigurationFailed(format!(
                "frame buffer of {} bytes does not match {}x{} RGBA",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Wrap a buffer already known to be `width * height` RGBA pixels.
    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), Resolution::new(width, height).pixel_count() * Self::BYTES_PER_PIXEL);
        Self { width, height, data }
    }

    /// A frame filled with a single colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = Resolution::new(width, height).pixel_count();
        let mut data = Vec::with_capacity(pixels * Self::BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + Self::BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Negotiated settings of a live video track. Fields the platform did not
/// report are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoTrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

impl VideoTrackSettings {
    pub fn with_resolution(resolution: Resolution) -> Self {
        Self {
            width: Some(resolution.width),
            height: Some(resolution.height),
            frame_rate: None,
        }
    }

    /// The explicit resolution, if both dimensions were reported.
    pub fn resolution(&self) -> Option<Resolution> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Resolution::new(width, height)),
            _ => None,
        }
    }
}

/// A live capture endpoint: one display share or one camera + microphone.
///
/// Owned exclusively by the capture session; all tracks are stopped on
/// release.
pub struct MediaSource {
    id: String,
    kind: SourceKind,
    video_tracks: Vec<Arc<dyn VideoTrack>>,
    audio_tracks: Vec<Arc<dyn AudioTrack>>,
}

impl MediaSource {
    pub fn new(
        kind: SourceKind,
        video_tracks: Vec<Arc<dyn VideoTrack>>,
        audio_tracks: Vec<Arc<dyn AudioTrack>>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            video_tracks,
            audio_tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn video_tracks(&self) -> &[Arc<dyn VideoTrack>] {
        &self.video_tracks
    }

    pub fn audio_tracks(&self) -> &[Arc<dyn AudioTrack>] {
        &self.audio_tracks
    }

    /// First video track, the one that is displayed and composed.
    pub fn primary_video(&self) -> Option<&Arc<dyn VideoTrack>> {
        self.video_tracks.first()
    }

    /// Explicit native resolution of the primary video track.
    pub fn native_resolution(&self) -> Option<Resolution> {
        self.primary_video()
            .and_then(|track| track.settings().resolution())
            .filter(|res| !res.is_degenerate())
    }

    pub fn track_count(&self) -> usize {
        self.video_tracks.len() + self.audio_tracks.len()
    }

    /// Stop every track. Safe to call repeatedly.
    pub fn stop_all(&self) {
        for track in &self.video_tracks {
            track.stop();
        }
        for track in &self.audio_tracks {
            track.stop();
        }
    }

    /// Whether every track has ended.
    pub fn is_released(&self) -> bool {
        self.video_tracks.iter().all(|t| !t.is_live()) && self.audio_tracks.iter().all(|t| !t.is_live())
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("video_tracks", &self.video_tracks.len())
            .field("audio_tracks", &self.audio_tracks.len())
            .finish()
    }
}

/// The single video + single audio stream handed to the encoder.
#[derive(Clone)]
pub struct CombinedStream {
    video: Arc<dyn VideoTrack>,
    audio: Arc<dyn AudioTrack>,
}

impl CombinedStream {
    pub fn new(video: Arc<dyn VideoTrack>, audio: Arc<dyn AudioTrack>) -> Self {
        Self { video, audio }
    }

    /// Build a stream from loose track lists, requiring exactly one of each kind.
    pub fn from_tracks(
        mut video: Vec<Arc<dyn VideoTrack>>,
        mut audio: Vec<Arc<dyn AudioTrack>>,
    ) -> Result<Self, CaptureError> {
        if video.len() != 1 || audio.len() != 1 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "combined stream needs exactly one video and one audio track, got {} and {}",
                video.len(),
                audio.len()
            )));
        }
        match (video.pop(), audio.pop()) {
            (Some(video), Some(audio)) => Ok(Self::new(video, audio)),
            _ => Err(CaptureError::ConfigurationFailed("combined stream is missing a track".into())),
        }
    }

    pub fn video(&self) -> &Arc<dyn VideoTrack> {
        &self.video
    }

    pub fn audio(&self) -> &Arc<dyn AudioTrack> {
        &self.audio
    }
}

impl fmt::Debug for CombinedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedStream")
            .field("video", &self.video.id())
            .field("audio", &self.audio.id())
            .finish()
    }
}

/// Counters for debugging a recording session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub render_ticks: u64,
    pub background_draws: u64,
    pub background_skipped: u64,
    pub inset_draws: u64,
    pub inset_skipped: u64,
    pub chunks_emitted: u64,
    pub empty_chunks_discarded: u64,
    pub bytes_collected: u64,
}
