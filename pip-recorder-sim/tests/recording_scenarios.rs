//! End-to-end recording scenarios over the synthetic platform.
//!
//! Time is virtual: every scenario drives the session clock with `tick`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use pip_recorder_core::models::config::AUDIO_BITRATE_BPS;
use pip_recorder_core::processing::mixing_graph::GraphNode;
use pip_recorder_core::storage::artifact_writer::read_metadata;
use pip_recorder_core::{
    save_artifact, CaptureError, CaptureSessionManager, MediaTrack, RecorderDelegate, RecordingArtifact, Resolution,
    SessionState, VideoBitrate,
};
use pip_recorder_sim::{PermissionOutcome, SimEncoder, SimPlatform};

const DISPLAY_BODY: [u8; 4] = [32, 64, 160, 255];
const CAMERA_BODY: [u8; 4] = [160, 96, 32, 255];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn session(platform: SimPlatform, encoder: SimEncoder) -> CaptureSessionManager<SimPlatform, SimEncoder> {
    init_logging();
    CaptureSessionManager::new(platform, encoder)
}

#[derive(Default)]
struct Events {
    states: Mutex<Vec<SessionState>>,
    errors: Mutex<Vec<CaptureError>>,
    chunks: Mutex<Vec<(usize, usize)>>,
    finished: Mutex<Vec<String>>,
}

impl RecorderDelegate for Events {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }

    fn on_chunk(&self, chunk_len: usize, total_chunks: usize) {
        self.chunks.lock().push((chunk_len, total_chunks));
    }

    fn on_recording_finished(&self, artifact: &RecordingArtifact) {
        self.finished.lock().push(artifact.id.clone());
    }
}

#[test]
fn half_second_recording_produces_one_artifact() {
    let platform = SimPlatform::new()
        .display_resolution(Resolution::new(1280, 720))
        .display_audio(false);
    let tracks = platform.probe();
    let encoder = SimEncoder::new();
    let encoded = encoder.probe();
    let events = Arc::new(Events::default());
    let mut session = session(platform, encoder);
    session.set_delegate(events.clone());

    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.surface_resolution(), Some(Resolution::new(1280, 720)));

    session.tick(Duration::from_millis(500));

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.render_ticks, 15);
    assert_eq!(diagnostics.chunks_emitted, 5);
    assert_eq!(diagnostics.inset_draws, 15);
    assert_eq!(diagnostics.background_skipped, 0);
    assert!(encoded.audio_samples() > 0);

    let artifact = session.stop().unwrap().unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    // Five periodic chunks, the flush, and the trailer.
    assert_eq!(artifact.chunk_count, 7);
    assert_eq!(artifact.file_name, "recording.webm");
    assert_eq!(artifact.mime_type, "video/webm;codecs=vp8,opus");
    assert_eq!(artifact.checksum.len(), 64);
    assert!((artifact.duration_secs - 0.5).abs() < 1e-9);
    assert_eq!(session.last_artifact().map(|a| a.id), Some(artifact.id.clone()));
    assert_eq!(*events.finished.lock(), vec![artifact.id.clone()]);
    assert_eq!(
        *events.states.lock(),
        vec![
            SessionState::Requesting,
            SessionState::Recording,
            SessionState::Finalizing,
            SessionState::Idle
        ]
    );
    assert_eq!(events.chunks.lock().len(), 7);

    assert!(tracks.all_tracks_stopped());
    assert_eq!(session.scheduler().active_timers(), 0);
    assert_eq!(encoded.stops(), 1);
}

#[test]
fn no_ticks_after_stop() {
    let mut session = session(SimPlatform::new(), SimEncoder::new());

    session.start().unwrap();
    session.tick(Duration::from_millis(200));
    session.stop().unwrap();
    let before = session.diagnostics();

    let ran = session.tick(Duration::from_secs(2));

    assert_eq!(ran, 0);
    assert_eq!(session.diagnostics(), before);
}

#[test]
fn composed_frame_shows_display_with_camera_inset() {
    let mut session = session(SimPlatform::new(), SimEncoder::new());
    session.start().unwrap();

    session.tick(Duration::from_millis(100));
    let frame = session.composed_frame().unwrap();

    assert_eq!(frame.resolution(), Resolution::new(1280, 720));
    // Inset: 256×192 at (1004, 508).
    assert_eq!(frame.pixel(1100, 650), Some(CAMERA_BODY));
    assert_eq!(frame.pixel(10, 700), Some(DISPLAY_BODY));
    assert_eq!(frame.pixel(1270, 710), Some(DISPLAY_BODY));

    session.stop().unwrap();
}

#[test]
fn camera_denied_releases_display() {
    let platform = SimPlatform::new().camera_outcome(PermissionOutcome::Denied);
    let tracks = platform.probe();
    let encoder = SimEncoder::new();
    let encoded = encoder.probe();
    let events = Arc::new(Events::default());
    let mut session = session(platform, encoder);
    session.set_delegate(events.clone());

    let err = session.start().unwrap_err();

    assert!(matches!(err, CaptureError::AcquisitionDenied(_)));
    assert!(err.is_recoverable());
    assert_eq!(
        session.last_error().as_deref(),
        Some("Permission to capture the camera and microphone was denied")
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(tracks.display_requests(), 1);
    assert_eq!(tracks.issued_track_count(), 1);
    assert!(tracks.all_tracks_stopped());
    assert_eq!(encoded.starts(), 0);
    assert_eq!(session.scheduler().active_timers(), 0);
    assert_eq!(events.errors.lock().len(), 1);
}

#[test]
fn display_denied_never_asks_for_camera() {
    let platform = SimPlatform::new().display_outcome(PermissionOutcome::Denied);
    let tracks = platform.probe();
    let mut session = session(platform, SimEncoder::new());

    let err = session.start().unwrap_err();

    assert!(matches!(err, CaptureError::AcquisitionDenied(_)));
    assert_eq!(tracks.camera_requests(), 0);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn busy_camera_is_device_unavailable() {
    let platform = SimPlatform::new().camera_outcome(PermissionOutcome::InUse);
    let tracks = platform.probe();
    let mut session = session(platform, SimEncoder::new());

    let err = session.start().unwrap_err();

    assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
    assert!(tracks.all_tracks_stopped());
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn unsupported_encoding_releases_everything() {
    let platform = SimPlatform::new().display_audio(true);
    let tracks = platform.probe();
    let encoder = SimEncoder::new().with_supported_types(["video/mp4"]);
    let encoded = encoder.probe();
    let mut session = session(platform, encoder);

    let err = session.start().unwrap_err();

    assert!(matches!(err, CaptureError::UnsupportedEncoding(_)));
    assert!(!err.is_recoverable());
    assert!(session.last_error().is_some());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(tracks.issued_track_count(), 4);
    assert!(tracks.all_tracks_stopped());
    assert_eq!(encoded.starts(), 0);
    assert_eq!(session.scheduler().active_timers(), 0);
    assert_eq!(session.tick(Duration::from_secs(1)), 0);
}

#[test]
fn stop_twice_yields_one_artifact() {
    let encoder = SimEncoder::new();
    let encoded = encoder.probe();
    let mut session = session(SimPlatform::new(), encoder);
    session.start().unwrap();
    session.tick(Duration::from_millis(300));

    let first = session.stop().unwrap();
    let second = session.stop().unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(encoded.stops(), 1);
}

#[test]
fn stop_before_start_does_nothing() {
    let encoder = SimEncoder::new();
    let encoded = encoder.probe();
    let mut session = session(SimPlatform::new(), encoder);

    assert!(session.stop().unwrap().is_none());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(encoded.stops(), 0);
}

#[test]
fn second_start_while_recording_is_rejected() {
    let platform = SimPlatform::new();
    let tracks = platform.probe();
    let mut session = session(platform, SimEncoder::new());
    session.start().unwrap();

    let err = session.start().unwrap_err();

    assert!(matches!(err, CaptureError::InvalidState(_)));
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(tracks.display_requests(), 1);
    session.stop().unwrap();
}

#[test]
fn artifact_is_concatenation_of_non_empty_chunks() {
    let encoder = SimEncoder::new().with_empty_chunk_every(3);
    let encoded = encoder.probe();
    let mut session = session(SimPlatform::new(), encoder);
    session.start().unwrap();
    session.tick(Duration::from_millis(500));

    let artifact = session.stop().unwrap().unwrap();

    let expected: Vec<u8> = encoded.non_empty_output().concat();
    assert_eq!(artifact.data, expected);
    // Requests 3 and 6 (the flush) came back empty.
    assert_eq!(session.diagnostics().empty_chunks_discarded, 2);
    assert_eq!(artifact.chunk_count, encoded.non_empty_output().len());
    assert!(artifact.data.starts_with(b"SIMR"));
    assert!(artifact.data.ends_with(b"END\n"));
}

#[test]
fn bitrate_choice_reaches_the_encoder() {
    for bitrate in VideoBitrate::ALL {
        let encoder = SimEncoder::new();
        let encoded = encoder.probe();
        let mut session = session(SimPlatform::new(), encoder);
        session.set_video_bitrate(bitrate);

        session.start().unwrap();
        let settings = session.encoder_settings().cloned().unwrap();
        session.stop().unwrap();

        assert_eq!(settings.video_bits_per_second(), bitrate.bits_per_second());
        assert_eq!(settings.audio_bitrate_bps, AUDIO_BITRATE_BPS);
        assert_eq!(settings.audio_bitrate_bps, 192_000);
        assert_eq!(settings.frame_rate, 30);
        assert_eq!(encoded.last_settings(), Some(settings));
    }
}

#[test]
fn echo_suppression_shapes_the_mix() {
    for enabled in [true, false] {
        let mut session = session(SimPlatform::new().display_audio(true), SimEncoder::new());
        session.set_echo_suppression(enabled);
        session.start().unwrap();

        let graph = session.mixing_graph().unwrap();
        assert_eq!(graph.input_count(), 2);
        if enabled {
            assert_eq!(graph.echo_chain_count(), 1);
            assert_eq!(graph.direct_connection_count(), 1);
        } else {
            assert_eq!(graph.echo_chain_count(), 0);
            assert_eq!(graph.direct_connection_count(), 2);
        }
        assert!(graph
            .nodes()
            .iter()
            .all(|n| enabled || !matches!(n, GraphNode::HighPass { .. } | GraphNode::Compressor(_))));

        session.stop().unwrap();
    }
}

#[test]
fn microphone_at_44_1_khz_is_mixed_at_48_khz() {
    let platform = SimPlatform::new().sample_rate(44_100);
    let encoder = SimEncoder::new();
    let encoded = encoder.probe();
    let mut session = session(platform, encoder);
    session.start().unwrap();

    session.tick(Duration::from_secs(1));
    session.stop().unwrap();

    // Ten chunk requests plus the final flush, each draining 441 mic samples.
    let mixed = encoded.audio_samples();
    assert!((5_278..=5_281).contains(&mixed), "mixed {} samples", mixed);
}

#[test]
fn microphone_path_runs_through_filters() {
    let platform = SimPlatform::new();
    let tracks = platform.probe();
    let mut session = session(platform, SimEncoder::new());
    session.start().unwrap();

    let mic = tracks.audio_tracks().remove(0);
    let path = session.mixing_graph().unwrap().path_from(mic.id());

    assert_eq!(path.len(), 3);
    assert!(matches!(path[0], GraphNode::HighPass { .. }));
    assert!(matches!(path[1], GraphNode::Compressor(_)));
    assert!(matches!(path[2], GraphNode::Destination));
    session.stop().unwrap();
}

#[test]
fn missing_display_resolution_falls_back_to_1080p() {
    let platform = SimPlatform::new().unreported_display_resolution();
    let mut session = session(platform, SimEncoder::new());

    session.start().unwrap();
    session.tick(Duration::from_millis(34));

    assert_eq!(session.surface_resolution(), Some(Resolution::new(1920, 1080)));
    let frame = session.composed_frame().unwrap();
    assert_eq!(frame.resolution(), Resolution::new(1920, 1080));
    // Inset: 384×288 at (1516, 772).
    assert_eq!(frame.pixel(1700, 1000), Some(CAMERA_BODY));
    session.stop().unwrap();
}

#[test]
fn camera_warmup_skips_inset_draws() {
    let platform = SimPlatform::new().camera_warmup(3);
    let mut session = session(platform, SimEncoder::new());
    session.start().unwrap();

    session.tick(Duration::from_millis(200));

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.render_ticks, 6);
    assert_eq!(diagnostics.inset_skipped, 3);
    assert_eq!(diagnostics.inset_draws, 3);
    assert_eq!(diagnostics.background_draws, 6);
    session.stop().unwrap();
}

#[test]
fn options_changed_while_recording_apply_next_time() {
    let encoder = SimEncoder::new();
    let encoded = encoder.probe();
    let mut session = session(SimPlatform::new(), encoder);
    session.start().unwrap();

    session.set_video_bitrate(VideoBitrate::Mbps3);
    session.set_echo_suppression(false);

    assert_eq!(session.encoder_settings().map(|s| s.video_bitrate), Some(VideoBitrate::Mbps8));
    assert_eq!(session.mixing_graph().map(|g| g.echo_chain_count()), Some(1));
    session.stop().unwrap();

    // The synthetic platform hands out fresh tracks on every request.
    session.start().unwrap();
    assert_eq!(session.encoder_settings().map(|s| s.video_bitrate), Some(VideoBitrate::Mbps3));
    assert_eq!(session.mixing_graph().map(|g| g.echo_chain_count()), Some(0));
    session.stop().unwrap();

    assert_eq!(encoded.starts(), 2);
    let bitrates: Vec<u32> = encoded.settings().iter().map(|s| s.video_bits_per_second()).collect();
    assert_eq!(bitrates, vec![8_000_000, 3_000_000]);
}

#[test]
fn new_start_clears_previous_artifact() {
    let mut session = session(SimPlatform::new(), SimEncoder::new());
    session.start().unwrap();
    session.tick(Duration::from_millis(100));
    session.stop().unwrap();
    assert!(session.last_artifact().is_some());

    session.start().unwrap();

    assert!(session.last_artifact().is_none());
    session.stop().unwrap();
}

#[test]
fn encoder_stop_failure_keeps_collected_chunks() {
    let platform = SimPlatform::new();
    let tracks = platform.probe();
    let encoder = SimEncoder::new().failing_on_stop();
    let encoded = encoder.probe();
    let events = Arc::new(Events::default());
    let mut session = session(platform, encoder);
    session.set_delegate(events.clone());
    session.start().unwrap();
    session.tick(Duration::from_millis(200));

    let artifact = session.stop().unwrap().expect("collected chunks become an artifact");

    assert_eq!(artifact.data, encoded.non_empty_output().concat());
    assert_eq!(artifact.chunk_count, 3);
    assert!(!artifact.data.ends_with(b"END\n"));
    assert_eq!(session.last_artifact(), Some(artifact.clone()));
    assert!(session.last_error().is_some());
    assert_eq!(events.errors.lock().len(), 1);
    assert!(matches!(events.errors.lock()[0], CaptureError::EncodingFailed(_)));
    assert_eq!(*events.finished.lock(), vec![artifact.id.clone()]);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(tracks.all_tracks_stopped());
    assert_eq!(session.scheduler().active_timers(), 0);
}

#[test]
fn artifact_saves_with_metadata() {
    let mut session = session(SimPlatform::new(), SimEncoder::new());
    session.start().unwrap();
    session.tick(Duration::from_millis(300));
    let artifact = session.stop().unwrap().unwrap();
    let dir = std::env::temp_dir().join(format!("pip-recorder-scenario-{}", artifact.id));
    std::fs::create_dir_all(&dir).unwrap();

    let path = save_artifact(&artifact, &dir).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), artifact.data);
    let metadata = read_metadata(&path).unwrap();
    assert_eq!(metadata.checksum, artifact.checksum);
    assert_eq!(metadata.size_bytes, artifact.len() as u64);
    assert_eq!(metadata.chunk_count, artifact.chunk_count);
    std::fs::remove_dir_all(&dir).unwrap();
}
