use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle → requesting → recording → finalizing → idle
///            ↓
///          idle   (acquisition or negotiation failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Requesting,
    Recording,
    Finalizing,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Source acquisition is only valid before recording starts.
    pub fn can_acquire(&self) -> bool {
        matches!(self, Self::Idle | Self::Requesting)
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Requesting)
                | (Self::Requesting, Self::Recording)
                | (Self::Requesting, Self::Idle)
                | (Self::Recording, Self::Finalizing)
                | (Self::Finalizing, Self::Idle)
        )
    }

    /// Validate and perform a transition, returning the new state.
    pub fn transition(self, next: SessionState) -> Result<SessionState, CaptureError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CaptureError::InvalidState(format!(
                "cannot transition from {:?} to {:?}",
                self, next
            )))
        }
    }
}

/// Shared handle to the one session state.
///
/// Every state-dependent operation (acquisition, encoder start, chunk
/// collection, render ticks) checks through this handle.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> SessionState {
        *self.inner.lock()
    }

    pub fn is_recording(&self) -> bool {
        self.get().is_recording()
    }

    /// Move to `next` if the edge is legal; the state is unchanged otherwise.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, CaptureError> {
        let mut state = self.inner.lock();
        *state = state.transition(next)?;
        Ok(next)
    }

    pub fn require_recording(&self, operation: &str) -> Result<(), CaptureError> {
        let state = self.get();
        if state.is_recording() {
            Ok(())
        } else {
            Err(CaptureError::InvalidState(format!(
                "{} is only valid while recording (session is {:?})",
                operation, state
            )))
        }
    }

    pub fn require_acquisition(&self, operation: &str) -> Result<(), CaptureError> {
        let state = self.get();
        if state.can_acquire() {
            Ok(())
        } else {
            Err(CaptureError::InvalidState(format!(
                "{} is not allowed while {:?}",
                operation, state
            )))
        }
    }
}
