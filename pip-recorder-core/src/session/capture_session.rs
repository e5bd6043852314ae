use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::artifact::RecordingArtifact;
use crate::models::config::{EncoderSettings, RecorderConfiguration, VideoBitrate, FRAME_RATE};
use crate::models::error::CaptureError;
use crate::models::media::{CombinedStream, MediaSource, Resolution, SessionDiagnostics, SourceKind, VideoFrame};
use crate::models::state::{SessionState, StateHandle};
use crate::processing::canvas::CanvasTrack;
use crate::processing::compositor::Compositor;
use crate::processing::mixing_graph::MixingGraph;
use crate::scheduler::{Scheduler, TimerId};
use crate::session::recorder::Recorder;
use crate::traits::media_encoder::MediaEncoder;
use crate::traits::media_platform::MediaPlatform;
use crate::traits::media_track::{AudioTrack, MediaTrack, VideoTrack};
use crate::traits::recorder_delegate::RecorderDelegate;

/// Results shared with the render timer.
#[derive(Default)]
struct SessionCore {
    diagnostics: SessionDiagnostics,
    last_error: Option<String>,
    last_artifact: Option<RecordingArtifact>,
}

/// Everything that exists only while recording.
struct ActiveRecording {
    display: MediaSource,
    camera: MediaSource,
    compositor: Arc<Compositor>,
    canvas_track: Arc<CanvasTrack>,
    graph: MixingGraph,
    render_timer: Option<TimerId>,
    artifact_name: String,
}

/// Owns one screen + camera recording from acquisition to artifact.
///
/// Generic over the platform media layer and the encoder backend:
/// ```text
/// [Display source] ─ video ─→ [Compositor] → canvas track ─┐
///        └──────── audio ──┐                               ├→ [Recorder] → chunks → artifact
/// [Camera/mic source] ─────┴→ [MixingGraph] → mixed track ─┘
///        └── video (inset) ─→ [Compositor]
/// ```
/// The render step and chunk emission run on the shared [`Scheduler`];
/// the host advances it with [`CaptureSessionManager::tick`]. Both only
/// act while the session state is `Recording`.
pub struct CaptureSessionManager<P: MediaPlatform, E: MediaEncoder> {
    platform: P,
    recorder: Recorder<E>,
    scheduler: Scheduler,
    /// Applied at the next `start`.
    pending: RecorderConfiguration,
    state: StateHandle,
    core: Arc<Mutex<SessionCore>>,
    active: Option<ActiveRecording>,
    delegate: Option<Arc<dyn RecorderDelegate>>,
}

impl<P: MediaPlatform, E: MediaEncoder + 'static> CaptureSessionManager<P, E> {
    pub fn new(platform: P, encoder: E) -> Self {
        Self {
            platform,
            recorder: Recorder::new(encoder),
            scheduler: Scheduler::new(),
            pending: RecorderConfiguration::default(),
            state: StateHandle::new(),
            core: Arc::new(Mutex::new(SessionCore::default())),
            active: None,
            delegate: None,
        }
    }

    pub fn with_configuration(
        platform: P,
        encoder: E,
        config: RecorderConfiguration,
    ) -> Result<Self, CaptureError> {
        let mut manager = Self::new(platform, encoder);
        manager.set_configuration(config)?;
        Ok(manager)
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecorderDelegate>) {
        self.recorder.set_delegate(Arc::clone(&delegate));
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let mut diagnostics = self.core.lock().diagnostics.clone();
        let stats = self.recorder.stats();
        diagnostics.chunks_emitted = stats.chunks_emitted;
        diagnostics.empty_chunks_discarded = stats.empty_chunks_discarded;
        diagnostics.bytes_collected = stats.bytes_collected;
        diagnostics
    }

    /// Message of the most recent surfaced error, cleared at the next start.
    pub fn last_error(&self) -> Option<String> {
        self.core.lock().last_error.clone()
    }

    /// Most recent finished recording, cleared at the next start.
    pub fn last_artifact(&self) -> Option<RecordingArtifact> {
        self.core.lock().last_artifact.clone()
    }

    /// Configuration that the next `start` will use.
    pub fn configuration(&self) -> &RecorderConfiguration {
        &self.pending
    }

    pub fn set_configuration(&mut self, config: RecorderConfiguration) -> Result<(), CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        self.pending = config;
        Ok(())
    }

    /// Takes effect at the next start.
    pub fn set_video_bitrate(&mut self, bitrate: VideoBitrate) {
        self.pending.video_bitrate = bitrate;
    }

    /// Takes effect at the next start.
    pub fn set_echo_suppression(&mut self, enabled: bool) {
        self.pending.echo_suppression = enabled;
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Advance the session clock, running due render and chunk ticks.
    pub fn tick(&self, elapsed: Duration) -> usize {
        self.scheduler.advance(elapsed)
    }

    /// Encoder settings of the running recording.
    pub fn encoder_settings(&self) -> Option<&EncoderSettings> {
        self.recorder.settings()
    }

    pub fn mixing_graph(&self) -> Option<&MixingGraph> {
        self.active.as_ref().map(|a| &a.graph)
    }

    pub fn surface_resolution(&self) -> Option<Resolution> {
        self.active.as_ref().map(|a| a.compositor.surface())
    }

    /// Current contents of the composition surface.
    pub fn composed_frame(&self) -> Option<Arc<VideoFrame>> {
        self.active.as_ref().and_then(|a| a.canvas_track.current_frame())
    }

    /// Acquire both sources, wire the compositor and mixing graph, then
    /// enter `Recording` and start the encoder and render cadence.
    ///
    /// Rejected with `InvalidState` unless idle. Any later failure releases
    /// whatever was acquired and returns the session to idle; the error's
    /// user message is kept in `last_error`.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if let Err(e) = self.set_state(SessionState::Requesting) {
            log::warn!("start() rejected: {}", e);
            return Err(e);
        }

        let config = self.pending.clone();
        *self.core.lock() = SessionCore::default();

        let display = match self.request_source(SourceKind::Display, &config) {
            Ok(source) => source,
            Err(e) => return Err(self.abandon(e, &[])),
        };
        let camera = match self.request_source(SourceKind::CameraMic, &config) {
            Ok(source) => source,
            Err(e) => return Err(self.abandon(e, &[&display])),
        };

        // Negotiate and build while still requesting so an unsupported
        // format never reaches the encoder or the scheduler.
        let mime_type = match self.recorder.negotiate(&config.mime_candidates) {
            Ok(mime_type) => mime_type,
            Err(e) => return Err(self.abandon(e, &[&display, &camera])),
        };
        let background = match display.primary_video().cloned() {
            Some(track) => track,
            None => {
                let e = CaptureError::DeviceUnavailable("The shared display has no video track".into());
                return Err(self.abandon(e, &[&display, &camera]));
            }
        };
        let inset = camera.primary_video().cloned();
        if inset.is_none() {
            log::warn!("Camera source has no video track, recording without inset");
        }

        let compositor = Arc::new(Compositor::new(background, inset));
        let canvas_track = compositor.capture_stream(FRAME_RATE);
        let graph = MixingGraph::build(&display, &camera, config.mix_configuration());
        let video: Arc<dyn VideoTrack> = canvas_track.clone();
        let audio: Arc<dyn AudioTrack> = graph.output_track();

        self.active = Some(ActiveRecording {
            display,
            camera,
            compositor,
            canvas_track,
            graph,
            render_timer: None,
            artifact_name: config.artifact_name.clone(),
        });

        let activated = CombinedStream::from_tracks(vec![video], vec![audio])
            .and_then(|stream| self.activate(stream, EncoderSettings::new(config.video_bitrate, mime_type)));
        if let Err(e) = activated {
            if let Some(active) = self.active.take() {
                if let Some(timer) = active.render_timer {
                    self.scheduler.clear(timer);
                }
                release(&active);
            }
            return Err(self.abandon(e, &[]));
        }
        Ok(())
    }

    /// Finalize the encoder, release both sources and return the artifact.
    ///
    /// Returns `Ok(None)` without side effects when not recording. If the
    /// encoder fails to stop, the chunks collected so far still become the
    /// artifact and the failure is reported through `last_error` and the
    /// delegate.
    pub fn stop(&mut self) -> Result<Option<RecordingArtifact>, CaptureError> {
        if let Err(e) = self.state.require_recording("stop") {
            log::debug!("stop() ignored: {}", e);
            return Ok(None);
        }
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        self.set_state(SessionState::Finalizing)?;

        let scheduler = self.scheduler.clone();
        let render_timer = active.render_timer;
        let finalized = self
            .recorder
            .finalize(&self.scheduler, &active.artifact_name, move || {
                if let Some(timer) = render_timer {
                    scheduler.clear(timer);
                }
            });
        release(&active);

        let outcome = match finalized {
            Ok(outcome) => outcome,
            Err(e) => {
                // Finalize bailed before the stop acknowledgment.
                if let Some(timer) = render_timer {
                    self.scheduler.clear(timer);
                }
                self.surface_error(&e);
                self.set_state(SessionState::Idle)?;
                return Err(e);
            }
        };
        if let Some(ref e) = outcome.stop_error {
            self.surface_error(e);
        }

        let artifact = outcome.artifact;
        self.core.lock().last_artifact = Some(artifact.clone());
        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_finished(&artifact);
        }
        self.set_state(SessionState::Idle)?;
        Ok(Some(artifact))
    }

    // --- Internal helpers ---

    fn request_source(&mut self, kind: SourceKind, config: &RecorderConfiguration) -> Result<MediaSource, CaptureError> {
        self.state.require_acquisition(&format!("{} request", kind))?;
        log::info!("Requesting {} source", kind);
        let source = match kind {
            SourceKind::Display => self.platform.request_display(&config.display)?,
            SourceKind::CameraMic => self.platform.request_camera_mic(&config.camera)?,
        };
        log::info!("{} source acquired ({} tracks)", kind, source.track_count());
        Ok(source)
    }

    /// Enter `Recording`, schedule the render cadence and start the encoder.
    fn activate(&mut self, stream: CombinedStream, settings: EncoderSettings) -> Result<(), CaptureError> {
        self.set_state(SessionState::Recording)?;

        let compositor = match self.active.as_ref() {
            Some(active) => Arc::clone(&active.compositor),
            None => return Err(CaptureError::InvalidState("no pipeline to activate".into())),
        };
        let timer = self.schedule_render(compositor)?;
        if let Some(active) = self.active.as_mut() {
            active.render_timer = Some(timer);
        }

        self.recorder.start(stream, settings, &self.scheduler, &self.state)
    }

    fn schedule_render(&self, compositor: Arc<Compositor>) -> Result<TimerId, CaptureError> {
        self.state.require_recording("render scheduling")?;
        let state = self.state.clone();
        let core = Arc::clone(&self.core);
        let has_inset = compositor.has_inset();
        let timer = self.scheduler.set_interval(Duration::from_secs(1) / FRAME_RATE, move || {
            if !state.is_recording() {
                return;
            }
            let outcome = compositor.render_tick();

            let mut core = core.lock();
            let d = &mut core.diagnostics;
            d.render_ticks += 1;
            if outcome.background_drawn {
                d.background_draws += 1;
            } else {
                d.background_skipped += 1;
            }
            if outcome.inset_drawn {
                d.inset_draws += 1;
            } else if has_inset {
                d.inset_skipped += 1;
            }
        });
        Ok(timer)
    }

    /// Release partially acquired sources after a failed start and go back
    /// to idle.
    fn abandon(&mut self, error: CaptureError, sources: &[&MediaSource]) -> CaptureError {
        for source in sources {
            source.stop_all();
            log::info!("Released {} source", source.kind());
        }
        log::warn!("Recording start abandoned: {}", error);
        self.surface_error(&error);

        // Recording has no direct edge back to idle; unwind through finalizing.
        if self.state.is_recording() {
            if let Err(e) = self.set_state(SessionState::Finalizing) {
                log::error!("Failed to unwind recording state: {}", e);
            }
        }
        if let Err(e) = self.set_state(SessionState::Idle) {
            log::error!("Failed to return to idle: {}", e);
        }
        error
    }

    fn surface_error(&self, error: &CaptureError) {
        self.core.lock().last_error = Some(error.user_message());
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    fn set_state(&self, next: SessionState) -> Result<(), CaptureError> {
        self.state.transition(next)?;
        log::info!("Session state: {:?}", next);
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(next);
        }
        Ok(())
    }
}

impl<P: MediaPlatform, E: MediaEncoder> Drop for CaptureSessionManager<P, E> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            log::warn!("Session dropped while recording, releasing sources");
            if let Some(timer) = active.render_timer {
                self.scheduler.clear(timer);
            }
            release(&active);
        }
    }
}

/// Stop the generated tracks and every captured track. Idempotent.
fn release(active: &ActiveRecording) {
    active.canvas_track.stop();
    active.graph.close();
    active.display.stop_all();
    active.camera.stop_all();
    if active.display.is_released() && active.camera.is_released() {
        log::info!("Released display and camera/microphone sources");
    } else {
        log::warn!("Some captured tracks are still live after release");
    }
}
