use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::range::A1Range;
use crate::store::{RangeUpdate, Row, RowStore, RowStoreError};

/// Spreadsheet stand-in backed by a grid of strings. Sheet prefixes are ignored.
#[derive(Default)]
pub struct InMemoryRowStore {
    grid: RwLock<Vec<Row>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryRowStore {
    pub fn with_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let grid =
            rows.into_iter().map(|row| row.into_iter().map(Into::into).collect()).collect();
        Self { grid: RwLock::new(grid), ..Self::default() }
    }

    pub async fn snapshot(&self) -> Vec<Row> {
        self.grid.read().await.clone()
    }

    /// Value of one cell, empty when outside the populated grid.
    pub async fn cell(&self, row: u32, column: usize) -> String {
        let grid = self.grid.read().await;
        grid.get(row.saturating_sub(1) as usize)
            .and_then(|cells| cells.get(column))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of write requests served; a batch counts once.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// While set, every call fails with [`RowStoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RowStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RowStoreError::Unavailable("in-memory store switched off".to_owned()));
        }
        Ok(())
    }
}

fn write_into(grid: &mut Vec<Row>, range: &str, values: &[Row]) -> Result<(), RowStoreError> {
    let parsed = A1Range::parse(range)?;
    let first_row = parsed.start_row.unwrap_or(1) as usize;
    let width = parsed.width();

    for (offset, values_row) in values.iter().enumerate() {
        let row_number = first_row + offset;
        if let Some(end_row) = parsed.end_row {
            if row_number > end_row as usize {
                return Err(RowStoreError::InvalidRange(range.to_owned()));
            }
        }
        if values_row.len() > width {
            return Err(RowStoreError::InvalidRange(range.to_owned()));
        }
        if grid.len() < row_number {
            grid.resize_with(row_number, Vec::new);
        }
        let cells = &mut grid[row_number - 1];
        for (column_offset, value) in values_row.iter().enumerate() {
            let column = parsed.start_column + column_offset;
            if cells.len() <= column {
                cells.resize(column + 1, String::new());
            }
            cells[column] = value.clone();
        }
    }

    Ok(())
}

fn trim_row(mut row: Row) -> Row {
    while row.last().is_some_and(|cell| cell.is_empty()) {
        row.pop();
    }
    row
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, RowStoreError> {
        self.check_available()?;
        let parsed = A1Range::parse(range)?;
        let grid = self.grid.read().await;

        let first_row = parsed.start_row.unwrap_or(1) as usize;
        let last_row = parsed.end_row.map(|row| row as usize).unwrap_or(grid.len()).min(grid.len());

        let mut rows: Vec<Row> = (first_row..=last_row)
            .map(|row_number| {
                let cells = &grid[row_number - 1];
                let selected = (parsed.start_column..=parsed.end_column)
                    .map(|column| cells.get(column).cloned().unwrap_or_default())
                    .collect();
                trim_row(selected)
            })
            .collect();
        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }

        Ok(rows)
    }

    async fn write_range(&self, range: &str, values: Vec<Row>) -> Result<(), RowStoreError> {
        self.check_available()?;
        let mut grid = self.grid.write().await;
        write_into(&mut grid, range, &values)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<(), RowStoreError> {
        self.check_available()?;
        let mut grid = self.grid.write().await;
        for update in &updates {
            write_into(&mut grid, &update.range, &update.values)?;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::InMemoryRowStore;
    use crate::store::{RangeUpdate, RowStore};

    #[tokio::test]
    async fn reads_omit_trailing_empty_cells_and_rows() {
        let store = InMemoryRowStore::with_rows(vec![
            vec!["ID", "Name", "", ""],
            vec!["1", "", "Acme", ""],
            vec!["", "", "", ""],
        ]);

        let rows = store.read_range("A:H").await.expect("read");

        assert_eq!(rows, vec![vec!["ID", "Name"], vec!["1", "", "Acme"]]);
    }

    #[tokio::test]
    async fn writes_extend_the_grid() {
        let store = InMemoryRowStore::default();
        store
            .write_range("Leads!F3:G3", vec![vec!["In Progress".to_owned(), "7 @bob".to_owned()]])
            .await
            .expect("write");

        assert_eq!(store.cell(3, 5).await, "In Progress");
        assert_eq!(store.cell(3, 6).await, "7 @bob");
        assert_eq!(store.read_range("F3:G3").await.expect("read"), vec![vec!["In Progress", "7 @bob"]]);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn batch_write_counts_once_and_rejects_oversized_values() {
        let store = InMemoryRowStore::default();
        store
            .batch_write(vec![
                RangeUpdate::single_row("E2:E2", ["note"]),
                RangeUpdate::single_row("F2:F2", ["Rejected"]),
            ])
            .await
            .expect("batch");
        assert_eq!(store.write_count(), 1);

        let error = store
            .write_range("F2:F2", vec![vec!["a".to_owned(), "b".to_owned()]])
            .await
            .expect_err("two values do not fit one column");
        assert!(error.to_string().contains("F2:F2"));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryRowStore::with_rows(vec![vec!["ID"]]);
        store.set_unavailable(true);

        assert!(store.read_range("A:H").await.is_err());
        assert!(store.write_range("A2", vec![vec!["x".to_owned()]]).await.is_err());
        assert_eq!(store.write_count(), 0);
    }
}
