//! # pip-recorder-core
//!
//! Platform-agnostic core of a picture-in-picture screen recorder.
//!
//! Composites a shared display with a camera inset, mixes display and
//! microphone audio (with optional echo dampening on the microphone), and
//! encodes the result into a single chunked artifact. Platform backends
//! implement the `MediaPlatform` and `MediaEncoder` traits and plug into the
//! generic `CaptureSessionManager`.
//!
//! ## Architecture
//!
//! ```text
//! pip-recorder-core (this crate)
//! ├── traits/       ← MediaTrack, MediaPlatform, MediaEncoder, RecorderDelegate
//! ├── models/       ← CaptureError, SessionState, RecorderConfiguration, MediaSource, etc.
//! ├── processing/   ← Canvas, Compositor, MixingGraph, DSP nodes, ChunkBuffer
//! ├── scheduler/    ← virtual-time interval timers
//! ├── session/      ← Recorder, CaptureSessionManager (generic orchestrator)
//! └── storage/      ← artifact writer, metadata
//! ```

pub mod models;
pub mod processing;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::artifact::{RecordingArtifact, RecordingMetadata};
pub use models::config::{CameraConstraints, DisplayConstraints, EncoderSettings, RecorderConfiguration, VideoBitrate};
pub use models::error::CaptureError;
pub use models::media::{CombinedStream, MediaSource, Resolution, SessionDiagnostics, SourceKind, VideoFrame, VideoTrackSettings};
pub use models::state::{SessionState, StateHandle};
pub use processing::compositor::Compositor;
pub use processing::mixing_graph::{GraphNode, MixingGraph};
pub use scheduler::{Scheduler, TimerId};
pub use session::capture_session::CaptureSessionManager;
pub use session::recorder::{FinalizeOutcome, Recorder};
pub use storage::artifact_writer::save_artifact;
pub use traits::media_encoder::MediaEncoder;
pub use traits::media_platform::MediaPlatform;
pub use traits::media_track::{AudioTrack, MediaTrack, VideoTrack};
pub use traits::recorder_delegate::RecorderDelegate;
