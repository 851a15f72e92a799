//! Unified-run state machine
//!
//! ```text
//! Idle -> Collecting(1..3) -> Analyzing(video -> document -> face) -> Resolved | Failed
//! ```
//!
//! Resolved and Failed are resting states: selecting files or starting
//! again begins a fresh check; Reset always returns to Idle.

use kycshield_common::{Capability, KycError, Result, UnifiedResult};
use serde::Serialize;

/// Number of files the unified run needs
pub const UNIFIED_FILE_COUNT: usize = 3;

/// UI-facing state of the unified flow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnifiedState {
    #[default]
    Idle,
    Collecting { present: usize },
    Analyzing { phase: Capability },
    Resolved(Box<UnifiedResult>),
    Failed { error: String },
}

/// Events driving [`UnifiedState`]
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// The set of selected files changed
    FilesChanged { present: usize },
    /// The user started the run
    Start,
    /// A later phase's call began
    PhaseStarted(Capability),
    Completed(Box<UnifiedResult>),
    Errored(String),
    Reset,
}

impl FlowEvent {
    fn name(&self) -> &'static str {
        match self {
            FlowEvent::FilesChanged { .. } => "files_changed",
            FlowEvent::Start => "start",
            FlowEvent::PhaseStarted(_) => "phase_started",
            FlowEvent::Completed(_) => "completed",
            FlowEvent::Errored(_) => "errored",
            FlowEvent::Reset => "reset",
        }
    }
}

impl UnifiedState {
    /// Compute the state that follows `event`
    pub fn apply(&self, event: FlowEvent) -> Result<UnifiedState> {
        use UnifiedState::*;

        let next = match (self, event) {
            (_, FlowEvent::Reset) => Idle,

            // selecting files is allowed at rest, never mid-run
            (Idle | Collecting { .. } | Resolved(_) | Failed { .. }, FlowEvent::FilesChanged { present }) => {
                Self::collecting(present)
            }

            (Collecting { present }, FlowEvent::Start) if *present >= UNIFIED_FILE_COUNT => Analyzing {
                phase: Capability::Video,
            },
            // retry with the same files
            (Resolved(_) | Failed { .. }, FlowEvent::Start) => Analyzing {
                phase: Capability::Video,
            },

            (Analyzing { phase }, FlowEvent::PhaseStarted(next)) if phase.next() == Some(next) => {
                Analyzing { phase: next }
            }
            (Analyzing { phase: Capability::Face }, FlowEvent::Completed(result)) => Resolved(result),
            (Analyzing { .. }, FlowEvent::Errored(error)) => Failed { error },

            (state, event) => {
                return Err(KycError::InvalidTransition {
                    from: state.name().to_string(),
                    event: event.name().to_string(),
                })
            }
        };

        Ok(next)
    }

    fn collecting(present: usize) -> UnifiedState {
        if present == 0 {
            UnifiedState::Idle
        } else {
            UnifiedState::Collecting {
                present: present.min(UNIFIED_FILE_COUNT),
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnifiedState::Idle => "idle",
            UnifiedState::Collecting { .. } => "collecting",
            UnifiedState::Analyzing { .. } => "analyzing",
            UnifiedState::Resolved(_) => "resolved",
            UnifiedState::Failed { .. } => "failed",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, UnifiedState::Analyzing { .. })
    }

    /// The result, only once the run resolved
    pub fn result(&self) -> Option<&UnifiedResult> {
        match self {
            UnifiedState::Resolved(result) => Some(result),
            _ => None,
        }
    }
}
