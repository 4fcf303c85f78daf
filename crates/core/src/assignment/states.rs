use serde::{Deserialize, Serialize};

use crate::domain::lead::{LeadState, Outcome};

/// How the reason field was handled when a lead reaches a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonInput {
    NotSolicited,
    Provided,
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentEvent {
    Claim,
    RequestReason(Outcome),
    Finalize { outcome: Outcome, reason: ReasonInput },
    ReclaimStale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentAction {
    MarkInProgress,
    RecordClaimTime,
    PromptForReason,
    WriteNotes,
    WriteResult,
    ClearClaim,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: LeadState,
    pub to: LeadState,
    pub event: AssignmentEvent,
    pub actions: Vec<AssignmentAction>,
}

impl TransitionOutcome {
    pub fn requires(&self, action: AssignmentAction) -> bool {
        self.actions.contains(&action)
    }
}
