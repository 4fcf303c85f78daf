use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use outreach_core::{DomainError, LeadStats, Outcome, ReasonInput, RowIndex};
use outreach_sheets::{
    InMemoryRowStore, LeadRepository, RangeUpdate, RepositoryError, Row, RowStore, RowStoreError,
    SheetLayout, SheetLeadRepository,
};
use tokio::sync::{Barrier, Notify};

type QueueContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

fn sheet(results: &[&str]) -> Arc<InMemoryRowStore> {
    let mut rows: Vec<Vec<String>> = vec![[
        "ID",
        "Name",
        "Company",
        "Original Title",
        "Notes",
        "Result",
        "Completed By",
    ]
    .iter()
    .map(|cell| cell.to_string())
    .collect()];
    for (index, result) in results.iter().enumerate() {
        rows.push(vec![
            format!("-10{index}"),
            String::new(),
            String::new(),
            format!("chat {index}"),
            String::new(),
            result.to_string(),
            String::new(),
        ]);
    }
    Arc::new(InMemoryRowStore::with_rows(rows))
}

fn repository(store: Arc<dyn RowStore>) -> SheetLeadRepository {
    SheetLeadRepository::new(store, SheetLayout::default())
}

fn row(value: u32) -> QueueContractResult<RowIndex> {
    RowIndex::new(value).ok_or_else(|| format!("{value} is not a data row"))
}

async fn in_progress_rows(store: &InMemoryRowStore) -> Vec<usize> {
    store
        .snapshot()
        .await
        .iter()
        .enumerate()
        .filter(|(_, cells)| cells.get(5).map(String::as_str) == Some("In Progress"))
        .map(|(position, _)| position + 1)
        .collect()
}

/// Holds every full-sheet read until `parties` readers have arrived, so concurrent claims
/// all observe the queue before any of them writes.
struct LockstepReads {
    inner: Arc<InMemoryRowStore>,
    barrier: Barrier,
}

#[async_trait]
impl RowStore for LockstepReads {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, RowStoreError> {
        let rows = self.inner.read_range(range).await?;
        self.barrier.wait().await;
        Ok(rows)
    }

    async fn write_range(&self, range: &str, values: Vec<Row>) -> Result<(), RowStoreError> {
        self.inner.write_range(range, values).await
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<(), RowStoreError> {
        self.inner.batch_write(updates).await
    }
}

/// Stalls the first full-sheet read after `arm` until `resume` fires, leaving a window between
/// a sweep's read and its write.
struct StalledSweepRead {
    inner: Arc<InMemoryRowStore>,
    armed: AtomicBool,
    paused: Notify,
    resume: Notify,
}

impl StalledSweepRead {
    fn new(inner: Arc<InMemoryRowStore>) -> Self {
        Self { inner, armed: AtomicBool::new(false), paused: Notify::new(), resume: Notify::new() }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RowStore for StalledSweepRead {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, RowStoreError> {
        let rows = self.inner.read_range(range).await?;
        if range == SheetLayout::default().all_rows() && self.armed.swap(false, Ordering::SeqCst)
        {
            self.paused.notify_one();
            self.resume.notified().await;
        }
        Ok(rows)
    }

    async fn write_range(&self, range: &str, values: Vec<Row>) -> Result<(), RowStoreError> {
        self.inner.write_range(range, values).await
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<(), RowStoreError> {
        self.inner.batch_write(updates).await
    }
}

fn reclaiming(store: Arc<dyn RowStore>) -> SheetLeadRepository {
    repository(store).with_reclaim_after(Some(Duration::minutes(30)))
}

#[tokio::test]
async fn unclaimed_listing_matches_empty_results_in_order() -> QueueContractResult {
    let store = sheet(&["Successful", "", "In Progress", "", "Ignored", ""]);
    let repo = repository(store);

    let rows: Vec<u32> = repo
        .list_unclaimed_leads()
        .await
        .map_err(|error| error.to_string())?
        .iter()
        .map(|lead| lead.row_index.get())
        .collect();

    require_eq!(rows, vec![3, 5, 7]);
    Ok(())
}

#[tokio::test]
async fn claimed_lead_leaves_the_unclaimed_set() -> QueueContractResult {
    let store = sheet(&["", ""]);
    let repo = repository(store.clone());

    let lead = repo
        .claim_next("1001 @alice")
        .await
        .map_err(|error| error.to_string())?
        .ok_or("expected a lead")?;
    let remaining = repo.list_unclaimed_leads().await.map_err(|error| error.to_string())?;

    require_eq!(lead.row_index, row(2)?);
    require!(remaining.iter().all(|other| other.row_index != lead.row_index));
    require_eq!(remaining.len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_queue_claims_nothing_and_writes_nothing() -> QueueContractResult {
    let store = sheet(&["Ignored"]);
    let repo = repository(store.clone());

    let claimed = repo.claim_next("1001 @alice").await.map_err(|error| error.to_string())?;

    require!(claimed.is_none());
    require_eq!(store.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn ignored_finalize_keeps_empty_notes_untouched() -> QueueContractResult {
    let store = sheet(&["In Progress"]);
    let repo = repository(store.clone());

    repo.finalize(row(2)?, Outcome::Ignored, "", "1001 @alice")
        .await
        .map_err(|error| error.to_string())?;

    require_eq!(store.cell(2, 5).await, "Ignored");
    require_eq!(store.cell(2, 4).await, "");
    Ok(())
}

#[tokio::test]
async fn stats_classify_mixed_case_results() -> QueueContractResult {
    let store = sheet(&["", "In Progress", "Successful", "Rejected", "Ignored", "successful"]);
    let stats = repository(store).compute_stats().await.map_err(|error| error.to_string())?;

    require_eq!(
        stats,
        LeadStats {
            total: 6,
            completed: 4,
            pending: 1,
            in_progress: 1,
            successful: 2,
            rejected: 1,
            ignored: 1,
            unrecognized: 0,
        }
    );
    Ok(())
}

#[tokio::test]
async fn finalize_is_idempotent() -> QueueContractResult {
    let store = sheet(&["In Progress"]);
    let repo = repository(store.clone());

    repo.finalize(row(2)?, Outcome::Rejected, "No budget", "7 @bob")
        .await
        .map_err(|error| error.to_string())?;
    let once = store.snapshot().await;
    repo.finalize(row(2)?, Outcome::Rejected, "No budget", "7 @bob")
        .await
        .map_err(|error| error.to_string())?;

    require_eq!(store.snapshot().await, once);
    Ok(())
}

#[tokio::test]
async fn concurrent_claims_in_one_process_are_serialized() -> QueueContractResult {
    let store = sheet(&[""]);
    let repo = repository(store.clone());

    let (first, second) = tokio::join!(repo.claim_next("1001 @alice"), repo.claim_next("7 @bob"));
    let first = first.map_err(|error| error.to_string())?;
    let second = second.map_err(|error| error.to_string())?;

    require_eq!(usize::from(first.is_some()) + usize::from(second.is_some()), 1);
    require_eq!(in_progress_rows(&store).await, vec![2]);
    let owner = store.cell(2, 6).await;
    let winner = if first.is_some() { "1001 @alice" } else { "7 @bob" };
    require_eq!(owner, winner, "claim owner should be the operator who got the lead");
    Ok(())
}

#[tokio::test]
async fn concurrent_claims_across_processes_misattribute_but_never_duplicate(
) -> QueueContractResult {
    let inner = sheet(&[""]);
    let shared: Arc<dyn RowStore> =
        Arc::new(LockstepReads { inner: inner.clone(), barrier: Barrier::new(2) });
    let alice_process = repository(shared.clone());
    let bob_process = repository(shared);

    let (alice, bob) = tokio::join!(
        alice_process.claim_next("1001 @alice"),
        bob_process.claim_next("7 @bob")
    );
    let alice = alice.map_err(|error| error.to_string())?.ok_or("alice saw the lead")?;
    let bob = bob.map_err(|error| error.to_string())?.ok_or("bob saw the lead")?;

    require_eq!(alice.row_index, bob.row_index, "both processes raced for the same row");
    require_eq!(in_progress_rows(&inner).await, vec![2], "the row is still single-valued");
    let owner = inner.cell(2, 6).await;
    require!(owner == "1001 @alice" || owner == "7 @bob", "owner is one of the racers: {}", owner);
    Ok(())
}

#[tokio::test]
async fn sweep_skips_a_row_finalized_by_another_process_after_its_read() -> QueueContractResult {
    let inner = sheet(&[""]);
    let stalled = Arc::new(StalledSweepRead::new(inner.clone()));
    let repo = Arc::new(reclaiming(stalled.clone()));
    repo.claim_next("1001 @alice").await.map_err(|error| error.to_string())?;

    stalled.arm();
    let later = Utc::now() + Duration::minutes(31);
    let sweep = tokio::spawn({
        let repo = repo.clone();
        async move { repo.reclaim_stale(later).await }
    });
    stalled.paused.notified().await;

    inner
        .write_range("F2:G2", vec![vec!["Successful".to_owned(), "1001 @alice".to_owned()]])
        .await
        .map_err(|error| error.to_string())?;
    stalled.resume.notify_one();

    let reclaimed =
        sweep.await.map_err(|error| error.to_string())?.map_err(|error| error.to_string())?;
    require!(reclaimed.is_empty(), "finalized row was reclaimed: {:?}", reclaimed);
    require_eq!(inner.cell(2, 5).await, "Successful");
    require_eq!(inner.cell(2, 6).await, "1001 @alice");
    Ok(())
}

#[tokio::test]
async fn finalize_waits_for_an_in_flight_sweep() -> QueueContractResult {
    let inner = sheet(&[""]);
    let stalled = Arc::new(StalledSweepRead::new(inner.clone()));
    let repo = Arc::new(reclaiming(stalled.clone()));
    repo.claim_next("1001 @alice").await.map_err(|error| error.to_string())?;

    stalled.arm();
    let later = Utc::now() + Duration::minutes(31);
    let sweep = tokio::spawn({
        let repo = repo.clone();
        async move { repo.reclaim_stale(later).await }
    });
    stalled.paused.notified().await;

    let row_two = row(2)?;
    let finalize = tokio::spawn({
        let repo = repo.clone();
        async move { repo.finalize(row_two, Outcome::Successful, "deal", "1001 @alice").await }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    require_eq!(
        inner.cell(2, 5).await,
        "In Progress",
        "finalize ran while the sweep held the row"
    );

    stalled.resume.notify_one();
    let reclaimed =
        sweep.await.map_err(|error| error.to_string())?.map_err(|error| error.to_string())?;
    finalize.await.map_err(|error| error.to_string())?.map_err(|error| error.to_string())?;

    require_eq!(reclaimed, vec![row(2)?]);
    require_eq!(inner.cell(2, 5).await, "Successful", "the later finalize is not overwritten");
    require_eq!(inner.cell(2, 4).await, "deal");
    require_eq!(inner.cell(2, 6).await, "1001 @alice");
    Ok(())
}

#[tokio::test]
async fn late_finalize_after_reclaim_does_not_complete_the_new_claim() -> QueueContractResult {
    let store = sheet(&[""]);
    let repo = reclaiming(store.clone());

    repo.claim_next("1001 @alice").await.map_err(|error| error.to_string())?;
    let reclaimed = repo
        .reclaim_stale(Utc::now() + Duration::minutes(31))
        .await
        .map_err(|error| error.to_string())?;
    require_eq!(reclaimed, vec![row(2)?]);
    repo.claim_next("7 @bob").await.map_err(|error| error.to_string())?.ok_or("bob's lead")?;

    let late = repo
        .finalize_claim(
            row(2)?,
            Outcome::Rejected,
            ReasonInput::Provided,
            "No budget",
            "1001 @alice",
        )
        .await;

    require!(
        matches!(late, Err(RepositoryError::Domain(DomainError::ClaimNotHeld { row: 2, .. }))),
        "late finalize was not refused: {:?}",
        late
    );
    require_eq!(store.cell(2, 5).await, "In Progress");
    require_eq!(store.cell(2, 6).await, "7 @bob");
    require_eq!(store.cell(2, 4).await, "", "no notes from the stale claim");
    Ok(())
}
