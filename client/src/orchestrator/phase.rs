//! Job lifecycle as an explicit state machine.
//!
//! ```text
//! Idle ──▶ Submitting ──▶ AwaitingConfirmation ──▶ GeneratingImages ──▶ Complete
//!              │                   │                      │
//!              └───────────────────┴──────────────────────┴────────▶ Failed
//! ```
//!
//! `Complete` and `Failed` may start a new job. Anything else is rejected.

use serde::Serialize;

use crate::error::{JobError, JobResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation,
    GeneratingImages,
    Complete,
    Failed,
}

impl JobPhase {
    pub fn name(self) -> &'static str {
        match self {
            JobPhase::Idle => "Idle",
            JobPhase::Submitting => "Submitting",
            JobPhase::AwaitingConfirmation => "AwaitingConfirmation",
            JobPhase::GeneratingImages => "GeneratingImages",
            JobPhase::Complete => "Complete",
            JobPhase::Failed => "Failed",
        }
    }

    /// A job is between submission and a terminal phase.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobPhase::Submitting | JobPhase::AwaitingConfirmation | JobPhase::GeneratingImages
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Complete | JobPhase::Failed)
    }

    pub fn can_transition_to(self, next: JobPhase) -> bool {
        use JobPhase::*;
        matches!(
            (self, next),
            (Idle | Complete | Failed, Submitting)
                | (Submitting, AwaitingConfirmation)
                | (AwaitingConfirmation, GeneratingImages)
                | (GeneratingImages, Complete)
                | (Submitting | AwaitingConfirmation | GeneratingImages, Failed)
        )
    }

    /// Checked move to `next`.
    pub fn transition(self, next: JobPhase) -> JobResult<JobPhase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(JobError::InvalidTransition {
                from: self.name(),
                to: next.name(),
            })
        }
    }
}
