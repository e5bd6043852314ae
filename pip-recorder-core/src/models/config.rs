use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Composition and encoding cadence in frames per second.
pub const FRAME_RATE: u32 = 30;

/// Fixed target audio bitrate for every recording.
pub const AUDIO_BITRATE_BPS: u32 = 192_000;

/// Interval at which the encoder is asked for its buffered output.
pub const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// Name under which the finished recording is offered for download.
pub const DEFAULT_ARTIFACT_NAME: &str = "recording.webm";

/// Container/codec candidates, most preferred first.
pub const DEFAULT_MIME_CANDIDATES: [&str; 3] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// User-selectable target video bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoBitrate {
    #[serde(rename = "3 Mbps")]
    Mbps3,
    #[default]
    #[serde(rename = "8 Mbps")]
    Mbps8,
    #[serde(rename = "15 Mbps")]
    Mbps15,
}

impl VideoBitrate {
    pub const ALL: [VideoBitrate; 3] = [Self::Mbps3, Self::Mbps8, Self::Mbps15];

    pub fn bits_per_second(&self) -> u32 {
        match self {
            Self::Mbps3 => 3_000_000,
            Self::Mbps8 => 8_000_000,
            Self::Mbps15 => 15_000_000,
        }
    }

    /// Label shown by the bitrate selector.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mbps3 => "3 Mbps",
            Self::Mbps8 => "8 Mbps",
            Self::Mbps15 => "15 Mbps",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label.trim())
    }
}

/// Constraints for the display-share request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConstraints {
    /// Always requested; a display source without video is unusable.
    pub video: bool,
    /// System/tab audio is optional; the user may decline to share it.
    pub audio: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// Constraints for the camera + microphone request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Audio mixing options, read once when the mixing graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MixConfiguration {
    pub echo_suppression_enabled: bool,
}

/// Encoder parameters, fixed for the lifetime of one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub video_bitrate: VideoBitrate,
    pub audio_bitrate_bps: u32,
    pub frame_rate: u32,
    /// Negotiated container/codec MIME type.
    pub mime_type: String,
    /// Chunk emission interval.
    pub timeslice: Duration,
}

impl EncoderSettings {
    pub fn new(video_bitrate: VideoBitrate, mime_type: impl Into<String>) -> Self {
        Self {
            video_bitrate,
            audio_bitrate_bps: AUDIO_BITRATE_BPS,
            frame_rate: FRAME_RATE,
            mime_type: mime_type.into(),
            timeslice: CHUNK_INTERVAL,
        }
    }

    pub fn video_bits_per_second(&self) -> u32 {
        self.video_bitrate.bits_per_second()
    }
}

/// Options for a recording session.
///
/// Changes made while a recording is running only apply at the next start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfiguration {
    /// Target video bitrate (default: 8 Mbps).
    pub video_bitrate: VideoBitrate,

    /// Route microphone audio through the high-pass + compressor chain (default: true).
    pub echo_suppression: bool,

    pub display: DisplayConstraints,

    pub camera: CameraConstraints,

    /// Container/codec candidates in preference order.
    pub mime_candidates: Vec<String>,

    /// File name of the finished recording.
    pub artifact_name: String,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.display.video {
            return Err("display capture must request video".into());
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(format!(
                "invalid camera resolution: {}x{}",
                self.camera.width, self.camera.height
            ));
        }
        if self.mime_candidates.is_empty() {
            return Err("no container candidates configured".into());
        }
        if self.artifact_name.trim().is_empty() {
            return Err("artifact name must not be empty".into());
        }
        Ok(())
    }

    pub fn mix_configuration(&self) -> MixConfiguration {
        MixConfiguration {
            echo_suppression_enabled: self.echo_suppression,
        }
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            video_bitrate: VideoBitrate::default(),
            echo_suppression: true,
            display: DisplayConstraints::default(),
            camera: CameraConstraints::default(),
            mime_candidates: DEFAULT_MIME_CANDIDATES.iter().map(|m| m.to_string()).collect(),
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
        }
    }
}
