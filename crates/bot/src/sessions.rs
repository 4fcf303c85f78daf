use std::collections::HashMap;

use outreach_core::{
    ApplicationError, AssignmentEngine, AssignmentEvent, DomainError, Operator, OperatorId,
    OperatorSession, Outcome, ReasonInput, RowIndex,
};
use outreach_sheets::{LeadRepository, RepositoryError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Operators parked on the "awaiting reason" step, keyed by operator id.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<OperatorId, OperatorSession>>,
    engine: AssignmentEngine,
}

impl SessionManager {
    pub fn new(engine: AssignmentEngine) -> Self {
        Self { sessions: RwLock::default(), engine }
    }

    /// Parks `operator` on a reason prompt for a row they still hold. A previous unanswered
    /// prompt is dropped.
    pub async fn begin(
        &self,
        operator: &Operator,
        outcome: Outcome,
        row_index: RowIndex,
        repository: &dyn LeadRepository,
    ) -> Result<OperatorSession, ApplicationError> {
        let completed_by = operator.completed_by_tag();
        let lead = repository.lead_at(row_index).await?;
        let event = AssignmentEvent::RequestReason(outcome);
        self.engine.apply_to_claim(&lead, &completed_by, &event)?;

        let session = OperatorSession {
            operator_id: operator.id.clone(),
            outcome,
            row_index,
            completed_by,
        };
        let replaced =
            self.sessions.write().await.insert(operator.id.clone(), session.clone());
        if let Some(previous) = replaced {
            warn!(
                event_name = "bot.session.replaced",
                operator = %operator.id,
                abandoned_row = previous.row_index.get(),
                row_index = row_index.get(),
                "operator started a new reason prompt before answering the previous one"
            );
        }
        Ok(session)
    }

    pub async fn get(&self, operator_id: &OperatorId) -> Option<OperatorSession> {
        self.sessions.read().await.get(operator_id).cloned()
    }

    pub async fn take(&self, operator_id: &OperatorId) -> Option<OperatorSession> {
        self.sessions.write().await.remove(operator_id)
    }

    pub async fn clear(&self, operator_id: &OperatorId) -> bool {
        self.take(operator_id).await.is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Finalizes the parked lead with `reason` as its notes. `Ok(None)` when the operator
    /// has no open prompt. The session survives a failed write so the operator can resend;
    /// it is dropped once the claim has moved on to someone else.
    pub async fn resolve_reason(
        &self,
        operator_id: &OperatorId,
        reason: &str,
        repository: &dyn LeadRepository,
    ) -> Result<Option<OperatorSession>, ApplicationError> {
        let Some(session) = self.get(operator_id).await else {
            return Ok(None);
        };

        let finalized = repository
            .finalize_claim(
                session.row_index,
                session.outcome,
                ReasonInput::Provided,
                reason,
                &session.completed_by,
            )
            .await;
        match finalized {
            Ok(()) => {}
            Err(RepositoryError::Domain(error)) => {
                self.drop_stale(&session, &error).await;
                return Err(error.into());
            }
            Err(error) => return Err(error.into()),
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(operator_id) == Some(&session) {
            sessions.remove(operator_id);
        }
        debug!(
            event_name = "bot.session.resolved",
            operator = %operator_id,
            row_index = session.row_index.get(),
            "reason recorded"
        );
        Ok(Some(session))
    }

    /// Finalizes `row_index` without notes, then drops the operator's prompt for that row.
    pub async fn skip_reason(
        &self,
        operator: &Operator,
        outcome: Outcome,
        row_index: RowIndex,
        repository: &dyn LeadRepository,
    ) -> Result<(), ApplicationError> {
        let finalized = repository
            .finalize_claim(
                row_index,
                outcome,
                ReasonInput::Skipped,
                "",
                &operator.completed_by_tag(),
            )
            .await;
        match &finalized {
            Ok(()) | Err(RepositoryError::Domain(_)) => {
                let mut sessions = self.sessions.write().await;
                if sessions.get(&operator.id).is_some_and(|open| open.row_index == row_index) {
                    sessions.remove(&operator.id);
                }
            }
            Err(RepositoryError::StoreUnavailable(_)) => {}
        }
        finalized?;
        Ok(())
    }

    async fn drop_stale(&self, session: &OperatorSession, error: &DomainError) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(&session.operator_id) == Some(session) {
            sessions.remove(&session.operator_id);
        }
        warn!(
            event_name = "bot.session.stale",
            operator = %session.operator_id,
            row_index = session.row_index.get(),
            error = %error,
            "reason arrived after the claim moved on; prompt closed"
        );
    }
}
