//! Synthetic display and camera/microphone acquisition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pip_recorder_core::models::config::{CameraConstraints, DisplayConstraints};
use pip_recorder_core::models::error::CaptureError;
use pip_recorder_core::models::media::{MediaSource, Resolution, SourceKind};
use pip_recorder_core::traits::media_platform::MediaPlatform;
use pip_recorder_core::traits::media_track::{AudioTrack, MediaTrack, VideoTrack};

use crate::permissions::PermissionOutcome;
use crate::synthetic_tracks::{SyntheticAudioTrack, SyntheticVideoTrack};

const DISPLAY_COLOR: [u8; 4] = [32, 64, 160, 255];
const CAMERA_COLOR: [u8; 4] = [160, 96, 32, 255];
const DISPLAY_TONE_HZ: f64 = 440.0;
const MIC_TONE_HZ: f64 = 220.0;

/// Records what the platform handed out, so callers can check release.
#[derive(Default)]
pub struct PlatformProbe {
    display_requests: AtomicUsize,
    camera_requests: AtomicUsize,
    video_tracks: Mutex<Vec<Arc<SyntheticVideoTrack>>>,
    audio_tracks: Mutex<Vec<Arc<SyntheticAudioTrack>>>,
}

impl PlatformProbe {
    pub fn display_requests(&self) -> usize {
        self.display_requests.load(Ordering::SeqCst)
    }

    pub fn camera_requests(&self) -> usize {
        self.camera_requests.load(Ordering::SeqCst)
    }

    pub fn audio_tracks(&self) -> Vec<Arc<SyntheticAudioTrack>> {
        self.audio_tracks.lock().clone()
    }

    pub fn issued_track_count(&self) -> usize {
        self.video_tracks.lock().len() + self.audio_tracks.lock().len()
    }

    /// Whether every issued track has ended.
    pub fn all_tracks_stopped(&self) -> bool {
        self.video_tracks.lock().iter().all(|t| !t.is_live()) && self.audio_tracks.lock().iter().all(|t| !t.is_live())
    }
}

/// In-process media platform with scripted devices and permission outcomes.
///
/// Defaults: a 1280×720 display without audio, and a camera delivering the
/// requested resolution with a microphone.
pub struct SimPlatform {
    display_resolution: Resolution,
    report_display_resolution: bool,
    display_audio: bool,
    display_outcome: PermissionOutcome,
    camera_resolution: Option<Resolution>,
    camera_video: bool,
    camera_audio: bool,
    camera_warmup: usize,
    camera_outcome: PermissionOutcome,
    sample_rate: u32,
    probe: Arc<PlatformProbe>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            display_resolution: Resolution::new(1280, 720),
            report_display_resolution: true,
            display_audio: false,
            display_outcome: PermissionOutcome::Granted,
            camera_resolution: None,
            camera_video: true,
            camera_audio: true,
            camera_warmup: 0,
            camera_outcome: PermissionOutcome::Granted,
            sample_rate: 48_000,
            probe: Arc::new(PlatformProbe::default()),
        }
    }

    pub fn display_resolution(mut self, resolution: Resolution) -> Self {
        self.display_resolution = resolution;
        self
    }

    /// Deliver display frames without reporting their size in the track settings.
    pub fn unreported_display_resolution(mut self) -> Self {
        self.report_display_resolution = false;
        self
    }

    pub fn display_audio(mut self, enabled: bool) -> Self {
        self.display_audio = enabled;
        self
    }

    pub fn display_outcome(mut self, outcome: PermissionOutcome) -> Self {
        self.display_outcome = outcome;
        self
    }

    /// Override the resolution the camera delivers regardless of the constraints.
    pub fn camera_resolution(mut self, resolution: Resolution) -> Self {
        self.camera_resolution = Some(resolution);
        self
    }

    pub fn camera_video(mut self, enabled: bool) -> Self {
        self.camera_video = enabled;
        self
    }

    pub fn camera_audio(mut self, enabled: bool) -> Self {
        self.camera_audio = enabled;
        self
    }

    /// Camera reports no frame for the first `reads` frame requests.
    pub fn camera_warmup(mut self, reads: usize) -> Self {
        self.camera_warmup = reads;
        self
    }

    pub fn camera_outcome(mut self, outcome: PermissionOutcome) -> Self {
        self.camera_outcome = outcome;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn probe(&self) -> Arc<PlatformProbe> {
        Arc::clone(&self.probe)
    }

    fn issue_video(&self, track: SyntheticVideoTrack) -> Arc<dyn VideoTrack> {
        let track = Arc::new(track);
        self.probe.video_tracks.lock().push(Arc::clone(&track));
        track
    }

    fn issue_audio(&self, label: &str, frequency_hz: f64) -> Arc<dyn AudioTrack> {
        let track = Arc::new(SyntheticAudioTrack::sine(label, self.sample_rate, frequency_hz, 0.25));
        self.probe.audio_tracks.lock().push(Arc::clone(&track));
        track
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlatform for SimPlatform {
    fn request_display(&mut self, constraints: &DisplayConstraints) -> Result<MediaSource, CaptureError> {
        self.probe.display_requests.fetch_add(1, Ordering::SeqCst);
        self.display_outcome.check(SourceKind::Display)?;
        if !constraints.video {
            return Err(CaptureError::ConfigurationFailed("display capture requires video".into()));
        }

        let mut track = SyntheticVideoTrack::new("display", self.display_resolution, DISPLAY_COLOR);
        if !self.report_display_resolution {
            track = track.without_reported_resolution();
        }
        let video = vec![self.issue_video(track)];
        let audio = if constraints.audio && self.display_audio {
            vec![self.issue_audio("display-audio", DISPLAY_TONE_HZ)]
        } else {
            Vec::new()
        };

        log::info!(
            "Display shared at {} ({} audio track(s))",
            self.display_resolution,
            audio.len()
        );
        Ok(MediaSource::new(SourceKind::Display, video, audio))
    }

    fn request_camera_mic(&mut self, constraints: &CameraConstraints) -> Result<MediaSource, CaptureError> {
        self.probe.camera_requests.fetch_add(1, Ordering::SeqCst);
        self.camera_outcome.check(SourceKind::CameraMic)?;

        let resolution = self
            .camera_resolution
            .unwrap_or_else(|| Resolution::new(constraints.width, constraints.height));
        let video = if self.camera_video {
            let track = SyntheticVideoTrack::new("camera", resolution, CAMERA_COLOR).with_warmup(self.camera_warmup);
            vec![self.issue_video(track)]
        } else {
            Vec::new()
        };
        let audio = if self.camera_audio {
            vec![self.issue_audio("microphone", MIC_TONE_HZ)]
        } else {
            Vec::new()
        };

        log::info!(
            "Camera opened at {} (echo cancellation: {}, noise suppression: {})",
            resolution,
            constraints.echo_cancellation,
            constraints.noise_suppression
        );
        Ok(MediaSource::new(SourceKind::CameraMic, video, audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_devices() {
        let mut platform = SimPlatform::new();

        let display = platform.request_display(&DisplayConstraints::default()).unwrap();
        let camera = platform.request_camera_mic(&CameraConstraints::default()).unwrap();

        assert_eq!(display.native_resolution(), Some(Resolution::new(1280, 720)));
        assert!(display.audio_tracks().is_empty());
        assert_eq!(camera.native_resolution(), Some(Resolution::new(640, 480)));
        assert_eq!(camera.audio_tracks().len(), 1);
        assert_eq!(platform.probe().issued_track_count(), 3);
    }

    #[test]
    fn denied_camera_issues_nothing() {
        let mut platform = SimPlatform::new().camera_outcome(PermissionOutcome::Denied);

        let err = platform.request_camera_mic(&CameraConstraints::default()).unwrap_err();

        assert!(matches!(err, CaptureError::AcquisitionDenied(_)));
        assert_eq!(platform.probe().camera_requests(), 1);
        assert_eq!(platform.probe().issued_track_count(), 0);
    }

    #[test]
    fn display_audio_follows_constraints() {
        let mut platform = SimPlatform::new().display_audio(true);
        let constraints = DisplayConstraints { video: true, audio: false };

        let display = platform.request_display(&constraints).unwrap();

        assert!(display.audio_tracks().is_empty());
    }

    #[test]
    fn probe_sees_release() {
        let mut platform = SimPlatform::new();
        let probe = platform.probe();
        let display = platform.request_display(&DisplayConstraints::default()).unwrap();

        assert!(!probe.all_tracks_stopped());
        display.stop_all();
        assert!(probe.all_tracks_stopped());
    }
}
