use thiserror::Error;

use crate::assignment::states::{
    AssignmentAction, AssignmentEvent, ReasonInput, TransitionOutcome,
};
use crate::domain::lead::{LeadRecord, LeadState, Outcome};
use crate::errors::DomainError;

#[derive(Clone, Debug, Default)]
pub struct AssignmentEngine {
    reclaim_enabled: bool,
}

impl AssignmentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `InProgress -> Pending` for claims abandoned past the configured age.
    pub fn with_reclaim(mut self, enabled: bool) -> Self {
        self.reclaim_enabled = enabled;
        self
    }

    pub fn initial_state(&self) -> LeadState {
        LeadState::Pending
    }

    pub fn apply(
        &self,
        current: &LeadState,
        event: &AssignmentEvent,
    ) -> Result<TransitionOutcome, AssignmentTransitionError> {
        transition(current, event, self.reclaim_enabled)
    }

    /// Applies `event` to `lead` as currently stored and refuses unless the lead is still
    /// claimed by `completed_by`.
    pub fn apply_to_claim(
        &self,
        lead: &LeadRecord,
        completed_by: &str,
        event: &AssignmentEvent,
    ) -> Result<TransitionOutcome, DomainError> {
        let state = lead.result.state().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "row {} holds an unrecognized result",
                lead.row_index
            ))
        })?;
        let transition = self.apply(&state, event)?;
        if !lead.is_claimed_by(completed_by) {
            return Err(DomainError::ClaimNotHeld {
                row: lead.row_index.get(),
                operator: completed_by.to_owned(),
            });
        }
        Ok(transition)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssignmentTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: LeadState, event: AssignmentEvent },
    #[error("outcome {outcome:?} must be preceded by a reason step")]
    ReasonRequired { outcome: Outcome },
    #[error("outcome {outcome:?} does not take a reason")]
    ReasonNotSolicited { outcome: Outcome },
}

fn transition(
    current: &LeadState,
    event: &AssignmentEvent,
    reclaim_enabled: bool,
) -> Result<TransitionOutcome, AssignmentTransitionError> {
    use AssignmentAction::{
        ClearClaim, MarkInProgress, PromptForReason, RecordClaimTime, WriteNotes, WriteResult,
    };
    use AssignmentEvent::{Claim, Finalize, ReclaimStale, RequestReason};
    use LeadState::{Completed, InProgress, Pending};

    let (to, actions) = match (current, event) {
        (Pending, Claim) => {
            let mut actions = vec![MarkInProgress];
            if reclaim_enabled {
                actions.push(RecordClaimTime);
            }
            (InProgress, actions)
        }
        (InProgress, RequestReason(outcome)) => {
            if !outcome.requires_reason() {
                return Err(AssignmentTransitionError::ReasonNotSolicited { outcome: *outcome });
            }
            (InProgress, vec![PromptForReason])
        }
        (InProgress, Finalize { outcome, reason }) => {
            match (outcome.requires_reason(), reason) {
                (true, ReasonInput::NotSolicited) => {
                    return Err(AssignmentTransitionError::ReasonRequired { outcome: *outcome });
                }
                (false, ReasonInput::Provided | ReasonInput::Skipped) => {
                    return Err(AssignmentTransitionError::ReasonNotSolicited {
                        outcome: *outcome,
                    });
                }
                _ => {}
            }
            let actions = match reason {
                ReasonInput::Provided => vec![WriteNotes, WriteResult],
                ReasonInput::Skipped | ReasonInput::NotSolicited => vec![WriteResult],
            };
            (Completed(*outcome), actions)
        }
        (InProgress, ReclaimStale) if reclaim_enabled => (Pending, vec![ClearClaim]),
        _ => {
            return Err(AssignmentTransitionError::InvalidTransition {
                state: *current,
                event: *event,
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}
