use serde::{Deserialize, Serialize};

/// Explicit capture lifecycle state.
///
/// Replaces the boolean-flag encoding (`isRecording`, `isTranscribing`,
/// `isListening`, ...) with one enumerated variable and a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Acquiring,
    Active,
    Stopping,
    Transcribing,
    Complete,
    Failed,
}

impl CaptureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Complete | CaptureState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal capture state transition: {from:?} -> {to:?}")]
pub struct StateError {
    pub from: CaptureState,
    pub to: CaptureState,
}

/// Serializes capture state transitions; no two transitions are ever in
/// flight concurrently, and illegal ones are rejected rather than applied.
#[derive(Debug)]
pub struct CaptureStateMachine {
    state: CaptureState,
}

impl CaptureStateMachine {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn transition(&mut self, to: CaptureState) -> Result<(), StateError> {
        if Self::allowed(self.state, to) {
            self.state = to;
            Ok(())
        } else {
            Err(StateError {
                from: self.state,
                to,
            })
        }
    }

    /// Back to `Idle` for a fresh capture; the previous attempt's state is
    /// discarded wholesale.
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
    }

    fn allowed(from: CaptureState, to: CaptureState) -> bool {
        use CaptureState::*;
        matches!(
            (from, to),
            (Idle, Acquiring)
                | (Acquiring, Active)
                | (Active, Stopping)
                | (Stopping, Transcribing)
                | (Stopping, Complete)
                | (Transcribing, Complete)
                // Failed is reachable from any non-terminal state
                | (Idle | Acquiring | Active | Stopping | Transcribing, Failed)
        )
    }
}

impl Default for CaptureStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
