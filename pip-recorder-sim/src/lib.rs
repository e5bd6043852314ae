//! # pip-recorder-sim
//!
//! Synthetic media backend for pip-recorder.
//!
//! Provides:
//! - `SimPlatform`: display and camera/microphone acquisition with scripted permission outcomes
//! - `SyntheticVideoTrack` / `SyntheticAudioTrack`: test-pattern video and sine-tone audio
//! - `SimEncoder`: in-memory chunking encoder with a configurable supported-type list
//! - `permissions`: permission outcome model and the errors it maps to
//!
//! ## Usage
//! ```ignore
//! use pip_recorder_core::CaptureSessionManager;
//! use pip_recorder_sim::{SimEncoder, SimPlatform};
//!
//! let mut session = CaptureSessionManager::new(SimPlatform::new(), SimEncoder::new());
//! session.start()?;
//! session.tick(std::time::Duration::from_millis(500));
//! let artifact = session.stop()?;
//! ```

pub mod permissions;
pub mod sim_encoder;
pub mod sim_platform;
pub mod synthetic_tracks;

pub use permissions::PermissionOutcome;
pub use sim_encoder::{EncoderProbe, SimEncoder};
pub use sim_platform::{PlatformProbe, SimPlatform};
pub use synthetic_tracks::{SyntheticAudioTrack, SyntheticVideoTrack};
