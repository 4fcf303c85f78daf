use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use outreach_core::config::AppConfig;
use outreach_core::{
    ApplicationError, AssignmentAction, AssignmentEngine, AssignmentEvent, DomainError,
    LeadRecord, LeadState, LeadStats, NewLead, Outcome, ReasonInput, ResultCell, RowIndex,
};

use crate::range::{Column, SheetLayout};
use crate::store::{RangeUpdate, Row, RowStore, RowStoreError};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] RowStoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<outreach_core::AssignmentTransitionError> for RepositoryError {
    fn from(error: outreach_core::AssignmentTransitionError) -> Self {
        Self::Domain(DomainError::from(error))
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::StoreUnavailable(error) => Self::StoreUnavailable(error.to_string()),
            RepositoryError::Domain(error) => Self::Domain(error),
        }
    }
}

/// Queue operations over the lead sheet.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Rows whose result is empty, in ascending row order.
    async fn list_unclaimed_leads(&self) -> Result<Vec<LeadRecord>, RepositoryError>;

    /// Marks the first unclaimed lead "In Progress" for `operator_tag` and returns it as it was
    /// found (result still pending). `None` means the queue is empty; nothing is written.
    async fn claim_next(&self, operator_tag: &str) -> Result<Option<LeadRecord>, RepositoryError>;

    /// Writes notes (when non-empty), result and completed-by in one batch. Last write wins.
    async fn finalize(
        &self,
        row_index: RowIndex,
        outcome: Outcome,
        notes: &str,
        completed_by: &str,
    ) -> Result<(), RepositoryError>;

    /// Current contents of one data row. A blank or missing row is `InvalidRowIndex`.
    async fn lead_at(&self, row_index: RowIndex) -> Result<LeadRecord, RepositoryError>;

    /// Completes a claim still held by `completed_by`. Once the row has been reclaimed,
    /// re-claimed or finalized by someone else this is refused with a domain error and
    /// nothing is written. Repeating a finalize that already landed is a no-op.
    async fn finalize_claim(
        &self,
        row_index: RowIndex,
        outcome: Outcome,
        reason: ReasonInput,
        notes: &str,
        completed_by: &str,
    ) -> Result<(), RepositoryError>;

    async fn compute_stats(&self) -> Result<LeadStats, RepositoryError>;

    /// Returns claimed rows older than the reclaim threshold to the queue. No-op when
    /// reclaim is not configured.
    async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<Vec<RowIndex>, RepositoryError>;

    /// Appends identity columns for new leads after the last used row.
    async fn append_leads(&self, leads: &[NewLead]) -> Result<Vec<RowIndex>, RepositoryError>;
}

pub struct SheetLeadRepository {
    store: Arc<dyn RowStore>,
    layout: SheetLayout,
    engine: AssignmentEngine,
    reclaim_after: Option<Duration>,
    claim_guard: Mutex<()>,
}

impl SheetLeadRepository {
    pub fn new(store: Arc<dyn RowStore>, layout: SheetLayout) -> Self {
        Self {
            store,
            layout,
            engine: AssignmentEngine::new(),
            reclaim_after: None,
            claim_guard: Mutex::new(()),
        }
    }

    /// Enables claim timestamps (column H) and the stale-claim sweep.
    pub fn with_reclaim_after(mut self, reclaim_after: Option<Duration>) -> Self {
        self.reclaim_after = reclaim_after;
        self.engine = AssignmentEngine::new().with_reclaim(reclaim_after.is_some());
        self
    }

    /// Repository over `store` using the configured sheet name and reclaim window.
    pub fn configured(store: Arc<dyn RowStore>, config: &AppConfig) -> Self {
        let reclaim_after = config.queue.reclaim_after_secs.map(|secs| {
            Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000))
        });
        Self::new(store, SheetLayout::new(config.sheet_prefix())).with_reclaim_after(reclaim_after)
    }

    async fn read_records(&self) -> Result<Vec<LeadRecord>, RepositoryError> {
        let rows = self.store.read_range(&self.layout.all_rows()).await?;
        Ok(parse_rows(rows))
    }

    async fn read_lead(&self, row_index: RowIndex) -> Result<LeadRecord, RepositoryError> {
        let range = self.layout.cells(row_index, Column::Id, Column::CompletedBy);
        let rows = self.store.read_range(&range).await?;
        rows.first()
            .and_then(|row| parse_record(row_index, row))
            .ok_or_else(|| DomainError::InvalidRowIndex(row_index.get()).into())
    }

    /// True when the claim block F:H still shows the claim the sweep found.
    async fn claim_unchanged(
        &self,
        row_index: RowIndex,
        seen_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let range = self.layout.cells(row_index, Column::Result, Column::ClaimedAt);
        let rows = self.store.read_range(&range).await?;
        let Some(block) = rows.first() else {
            return Ok(false);
        };
        let result = block.first().map(String::as_str).unwrap_or("");
        let stamp = block.get(Column::ClaimedAt.offset() - Column::Result.offset());
        Ok(LeadState::parse(result) == Some(LeadState::InProgress)
            && parse_claim_time(stamp) == Some(seen_at))
    }

    /// Callers hold `claim_guard`.
    async fn write_completion(
        &self,
        row_index: RowIndex,
        outcome: Outcome,
        notes: &str,
        completed_by: &str,
    ) -> Result<(), RepositoryError> {
        let mut updates = Vec::with_capacity(3);
        if !notes.is_empty() {
            updates.push(RangeUpdate::single_row(self.layout.cell(row_index, Column::Notes), [notes]));
        }
        updates.push(RangeUpdate::single_row(
            self.layout.cell(row_index, Column::Result),
            [outcome.label()],
        ));
        updates.push(RangeUpdate::single_row(
            self.layout.cell(row_index, Column::CompletedBy),
            [completed_by],
        ));

        self.store.batch_write(updates).await?;

        info!(
            event_name = "queue.lead.finalized",
            row_index = row_index.get(),
            outcome = outcome.label(),
            operator = completed_by,
            with_notes = !notes.is_empty(),
            "lead finalized"
        );
        Ok(())
    }
}

/// Data rows with their row index. Row 1 is the header; blank rows are skipped.
pub fn parse_rows(rows: Vec<Row>) -> Vec<LeadRecord> {
    rows.into_iter()
        .enumerate()
        .skip(1)
        .filter_map(|(position, row)| {
            let row_index = RowIndex::new(position as u32 + 1)?;
            parse_record(row_index, &row)
        })
        .collect()
}

fn parse_record(row_index: RowIndex, row: &[String]) -> Option<LeadRecord> {
    let text = |column: Column| row.get(column.offset()).map(String::as_str).unwrap_or("");
    let optional = |column: Column| {
        let value = text(column).trim();
        (!value.is_empty()).then(|| value.to_owned())
    };

    let is_blank = [Column::Id, Column::Name, Column::Company, Column::OriginalTitle]
        .iter()
        .all(|column| text(*column).trim().is_empty());
    if is_blank {
        return None;
    }

    Some(LeadRecord {
        row_index,
        id: text(Column::Id).trim().to_owned(),
        name: optional(Column::Name),
        company: optional(Column::Company),
        original_title: text(Column::OriginalTitle).to_owned(),
        notes: optional(Column::Notes),
        result: ResultCell::parse(text(Column::Result)),
        completed_by: optional(Column::CompletedBy),
    })
}

fn parse_claim_time(cell: Option<&String>) -> Option<DateTime<Utc>> {
    let raw = cell?.trim();
    DateTime::parse_from_rfc3339(raw).ok().map(|value| value.with_timezone(&Utc))
}

#[async_trait]
impl LeadRepository for SheetLeadRepository {
    async fn list_unclaimed_leads(&self) -> Result<Vec<LeadRecord>, RepositoryError> {
        let records = self.read_records().await?;
        let unclaimed: Vec<LeadRecord> =
            records.into_iter().filter(|record| record.result.is_unclaimed()).collect();
        debug!(
            event_name = "queue.lead.listed",
            unclaimed = unclaimed.len(),
            "listed unclaimed leads"
        );
        Ok(unclaimed)
    }

    async fn claim_next(&self, operator_tag: &str) -> Result<Option<LeadRecord>, RepositoryError> {
        let _guard = self.claim_guard.lock().await;

        let Some(lead) = self.list_unclaimed_leads().await?.into_iter().next() else {
            info!(
                event_name = "queue.lead.none_available",
                operator = operator_tag,
                "no unclaimed leads"
            );
            return Ok(None);
        };

        let transition = self.engine.apply(&LeadState::Pending, &AssignmentEvent::Claim)?;
        let mut cells = vec![LeadState::InProgress.as_str().to_owned(), operator_tag.to_owned()];
        let last_column = if transition.requires(AssignmentAction::RecordClaimTime) {
            cells.push(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
            Column::ClaimedAt
        } else {
            Column::CompletedBy
        };

        let range = self.layout.cells(lead.row_index, Column::Result, last_column);
        self.store.write_range(&range, vec![cells]).await?;

        info!(
            event_name = "queue.lead.claimed",
            row_index = lead.row_index.get(),
            lead_id = %lead.id,
            operator = operator_tag,
            "lead claimed"
        );
        Ok(Some(lead))
    }

    async fn finalize(
        &self,
        row_index: RowIndex,
        outcome: Outcome,
        notes: &str,
        completed_by: &str,
    ) -> Result<(), RepositoryError> {
        let _guard = self.claim_guard.lock().await;
        self.write_completion(row_index, outcome, notes, completed_by).await
    }

    async fn lead_at(&self, row_index: RowIndex) -> Result<LeadRecord, RepositoryError> {
        self.read_lead(row_index).await
    }

    async fn finalize_claim(
        &self,
        row_index: RowIndex,
        outcome: Outcome,
        reason: ReasonInput,
        notes: &str,
        completed_by: &str,
    ) -> Result<(), RepositoryError> {
        let _guard = self.claim_guard.lock().await;
        let lead = self.read_lead(row_index).await?;

        if let Some(state) = lead.result.state().filter(|state| state.is_terminal()) {
            let replay = state == LeadState::Completed(outcome)
                && lead.completed_by.as_deref() == Some(completed_by.trim());
            if replay {
                debug!(
                    event_name = "queue.lead.finalize_replayed",
                    row_index = row_index.get(),
                    outcome = outcome.label(),
                    operator = completed_by,
                    "row already carries this completion"
                );
                return Ok(());
            }
        }

        let event = AssignmentEvent::Finalize { outcome, reason };
        let transition = match self.engine.apply_to_claim(&lead, completed_by, &event) {
            Ok(transition) => transition,
            Err(error) => {
                warn!(
                    event_name = "queue.lead.finalize_refused",
                    row_index = row_index.get(),
                    outcome = outcome.label(),
                    operator = completed_by,
                    holder = lead.completed_by.as_deref().unwrap_or(""),
                    error = %error,
                    "claim moved on before it was finalized"
                );
                return Err(error.into());
            }
        };
        let notes = if transition.requires(AssignmentAction::WriteNotes) { notes } else { "" };
        self.write_completion(row_index, outcome, notes, completed_by).await
    }

    async fn compute_stats(&self) -> Result<LeadStats, RepositoryError> {
        let records = self.read_records().await?;
        let stats = LeadStats::from_cells(records.iter().map(|record| &record.result));
        if stats.unrecognized > 0 {
            warn!(
                event_name = "queue.stats.unrecognized_results",
                unrecognized = stats.unrecognized,
                "result column holds values outside the known vocabulary"
            );
        }
        Ok(stats)
    }

    async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<Vec<RowIndex>, RepositoryError> {
        let Some(threshold) = self.reclaim_after else {
            return Ok(Vec::new());
        };
        let _guard = self.claim_guard.lock().await;

        let rows = self.store.read_range(&self.layout.all_rows()).await?;
        let mut candidates = Vec::new();

        for (position, row) in rows.iter().enumerate().skip(1) {
            let Some(row_index) = RowIndex::new(position as u32 + 1) else {
                continue;
            };
            let Some(record) = parse_record(row_index, row) else {
                continue;
            };
            let Some(state @ LeadState::InProgress) = record.result.state() else {
                continue;
            };
            let Some(claimed_at) = parse_claim_time(row.get(Column::ClaimedAt.offset())) else {
                continue;
            };
            if now - claimed_at < threshold {
                continue;
            }

            let transition = self.engine.apply(&state, &AssignmentEvent::ReclaimStale)?;
            if transition.requires(AssignmentAction::ClearClaim) {
                candidates.push((row_index, claimed_at));
            }
        }

        // The full read can be stale by now if another process finalized a row.
        let mut reclaimed = Vec::new();
        let mut updates = Vec::new();
        for (row_index, claimed_at) in candidates {
            if !self.claim_unchanged(row_index, claimed_at).await? {
                debug!(
                    event_name = "queue.lead.reclaim_skipped",
                    row_index = row_index.get(),
                    "claim changed since the sweep read it"
                );
                continue;
            }
            updates.push(RangeUpdate::single_row(
                self.layout.cells(row_index, Column::Result, Column::ClaimedAt),
                ["", "", ""],
            ));
            reclaimed.push(row_index);
        }

        if !updates.is_empty() {
            self.store.batch_write(updates).await?;
        }

        for row_index in &reclaimed {
            info!(
                event_name = "queue.lead.reclaimed",
                row_index = row_index.get(),
                threshold_secs = threshold.num_seconds(),
                "stale claim returned to the queue"
            );
        }
        Ok(reclaimed)
    }

    async fn append_leads(&self, leads: &[NewLead]) -> Result<Vec<RowIndex>, RepositoryError> {
        if leads.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.store.read_range(&self.layout.all_rows()).await?;
        let mut updates = Vec::with_capacity(2);
        if rows.is_empty() {
            updates.push(RangeUpdate::single_row(self.layout.header(), Column::HEADERS));
        }

        let first_row = (rows.len() as u32 + 1).max(RowIndex::FIRST_DATA_ROW);
        let last_row = first_row + leads.len() as u32 - 1;
        let values = leads
            .iter()
            .map(|lead| {
                vec![
                    lead.id.clone(),
                    lead.name.clone().unwrap_or_default(),
                    lead.company.clone().unwrap_or_default(),
                    lead.title.clone(),
                ]
            })
            .collect();
        updates.push(RangeUpdate::new(self.layout.identity_block(first_row, last_row), values));

        self.store.batch_write(updates).await?;

        info!(
            event_name = "queue.lead.imported",
            first_row,
            last_row,
            count = leads.len(),
            "leads appended to sheet"
        );
        Ok((first_row..=last_row).filter_map(RowIndex::new).collect())
    }
}
