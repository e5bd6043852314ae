//! Generated capture tracks.
//!
//! Video tracks hold one cached test-pattern frame; audio tracks produce a
//! sine tone in fixed-size blocks with continuous phase across reads.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pip_recorder_core::models::media::{Resolution, VideoFrame, VideoTrackSettings};
use pip_recorder_core::traits::media_track::{AudioTrack, MediaTrack, VideoTrack};

/// Test-pattern video track.
pub struct SyntheticVideoTrack {
    id: String,
    frame: Arc<VideoFrame>,
    report_resolution: bool,
    frame_rate: f64,
    /// Number of `current_frame` calls that still report "not ready".
    warmup: AtomicUsize,
    live: AtomicBool,
    stop_calls: AtomicUsize,
}

impl SyntheticVideoTrack {
    /// A track of `resolution` filled with `color`, with a lighter band
    /// across the top quarter so scaling is visible.
    pub fn new(label: &str, resolution: Resolution, color: [u8; 4]) -> Self {
        Self {
            id: format!("{}-{}", label, next_track_number()),
            frame: Arc::new(test_pattern(resolution, color)),
            report_resolution: true,
            frame_rate: 30.0,
            warmup: AtomicUsize::new(0),
            live: AtomicBool::new(true),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// Leave width and height out of the reported settings.
    pub fn without_reported_resolution(mut self) -> Self {
        self.report_resolution = false;
        self
    }

    /// Report no frame for the first `reads` frame requests.
    pub fn with_warmup(self, reads: usize) -> Self {
        self.warmup.store(reads, Ordering::SeqCst);
        self
    }

    pub fn frame(&self) -> &Arc<VideoFrame> {
        &self.frame
    }

    /// How many times `stop` was called, including repeats.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl MediaTrack for SyntheticVideoTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.live.swap(false, Ordering::SeqCst) {
            log::debug!("Video track {} stopped", self.id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl VideoTrack for SyntheticVideoTrack {
    fn settings(&self) -> VideoTrackSettings {
        let mut settings = if self.report_resolution {
            VideoTrackSettings::with_resolution(self.frame.resolution())
        } else {
            VideoTrackSettings::default()
        };
        settings.frame_rate = Some(self.frame_rate);
        settings
    }

    fn current_frame(&self) -> Option<Arc<VideoFrame>> {
        if !self.is_live() {
            return None;
        }
        let warming = self
            .warmup
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if warming {
            return None;
        }
        Some(Arc::clone(&self.frame))
    }
}

/// Sine-tone audio track.
pub struct SyntheticAudioTrack {
    id: String,
    sample_rate: u32,
    frequency_hz: f64,
    amplitude: f32,
    block_len: usize,
    phase: Mutex<f64>,
    live: AtomicBool,
    stop_calls: AtomicUsize,
}

impl SyntheticAudioTrack {
    /// Emits 10 ms of tone per read.
    pub fn sine(label: &str, sample_rate: u32, frequency_hz: f64, amplitude: f32) -> Self {
        Self {
            id: format!("{}-{}", label, next_track_number()),
            sample_rate,
            frequency_hz,
            amplitude,
            block_len: (sample_rate / 100).max(1) as usize,
            phase: Mutex::new(0.0),
            live: AtomicBool::new(true),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl MediaTrack for SyntheticAudioTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.live.swap(false, Ordering::SeqCst) {
            log::debug!("Audio track {} stopped", self.id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl AudioTrack for SyntheticAudioTrack {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_samples(&self) -> Vec<f32> {
        if !self.is_live() {
            return Vec::new();
        }
        let step = TAU * self.frequency_hz / f64::from(self.sample_rate);
        let mut phase = self.phase.lock();
        let block = (0..self.block_len)
            .map(|_| {
                let sample = (phase.sin() as f32) * self.amplitude;
                *phase = (*phase + step) % TAU;
                sample
            })
            .collect();
        block
    }
}

fn test_pattern(resolution: Resolution, color: [u8; 4]) -> VideoFrame {
    let Resolution { width, height } = resolution;
    let band = [
        color[0].saturating_add(64),
        color[1].saturating_add(64),
        color[2].saturating_add(64),
        color[3],
    ];
    let band_rows = height / 4;
    let mut data = Vec::with_capacity(resolution.pixel_count() * VideoFrame::BYTES_PER_PIXEL);
    for y in 0..height {
        let rgba = if y < band_rows { band } else { color };
        for _ in 0..width {
            data.extend_from_slice(&rgba);
        }
    }
    VideoFrame::new(width, height, data).unwrap_or_else(|_| VideoFrame::filled(width, height, color))
}

fn next_track_number() -> String {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_track_reports_settings_and_frames() {
        let track = SyntheticVideoTrack::new("display", Resolution::new(64, 36), [10, 20, 30, 255]);

        assert_eq!(track.settings().resolution(), Some(Resolution::new(64, 36)));
        let frame = track.current_frame().unwrap();
        assert_eq!(frame.pixel(0, 0), Some([74, 84, 94, 255]));
        assert_eq!(frame.pixel(0, 35), Some([10, 20, 30, 255]));
    }

    #[test]
    fn unreported_resolution_still_delivers_frames() {
        let track = SyntheticVideoTrack::new("display", Resolution::new(32, 18), [0, 0, 0, 255])
            .without_reported_resolution();

        assert_eq!(track.settings().resolution(), None);
        assert_eq!(track.current_frame().unwrap().resolution(), Resolution::new(32, 18));
    }

    #[test]
    fn warmup_withholds_frames() {
        let track = SyntheticVideoTrack::new("camera", Resolution::new(8, 8), [1, 2, 3, 255]).with_warmup(2);

        assert!(track.current_frame().is_none());
        assert!(track.current_frame().is_none());
        assert!(track.current_frame().is_some());
    }

    #[test]
    fn stopped_tracks_go_quiet() {
        let video = SyntheticVideoTrack::new("camera", Resolution::new(8, 8), [1, 2, 3, 255]);
        let audio = SyntheticAudioTrack::sine("mic", 48_000, 440.0, 0.5);

        video.stop();
        video.stop();
        audio.stop();

        assert!(!video.is_live());
        assert_eq!(video.stop_calls(), 2);
        assert!(video.current_frame().is_none());
        assert!(audio.read_samples().is_empty());
    }

    #[test]
    fn sine_phase_is_continuous_across_reads() {
        let track = SyntheticAudioTrack::sine("mic", 48_000, 1000.0, 1.0);

        let first = track.read_samples();
        let second = track.read_samples();

        assert_eq!(first.len(), 480);
        // 480 samples at 1 kHz / 48 kHz is exactly ten periods.
        assert!((second[0] - first[0]).abs() < 1e-3);
        assert!((second[12] - 1.0).abs() < 1e-3);
    }
}
