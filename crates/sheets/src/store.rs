use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub type Row = Vec<String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeUpdate {
    pub range: String,
    pub values: Vec<Row>,
}

impl RangeUpdate {
    pub fn new(range: impl Into<String>, values: Vec<Row>) -> Self {
        Self { range: range.into(), values }
    }

    pub fn single_row<I, S>(range: impl Into<String>, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(range, vec![cells.into_iter().map(Into::into).collect()])
    }
}

#[derive(Debug, Error)]
pub enum RowStoreError {
    #[error("row store request failed: {0}")]
    Transport(String),
    #[error("row store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("row store response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid range `{0}`")]
    InvalidRange(String),
    #[error("row store unavailable: {0}")]
    Unavailable(String),
}

/// Tabular store addressed with A1 ranges. Reads omit trailing empty cells and rows,
/// matching the spreadsheet values API.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, RowStoreError>;
    async fn write_range(&self, range: &str, values: Vec<Row>) -> Result<(), RowStoreError>;
    /// Several ranges in one request. Not atomic across ranges.
    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<(), RowStoreError>;
}

#[async_trait]
impl<T> RowStore for Arc<T>
where
    T: RowStore + ?Sized,
{
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, RowStoreError> {
        (**self).read_range(range).await
    }

    async fn write_range(&self, range: &str, values: Vec<Row>) -> Result<(), RowStoreError> {
        (**self).write_range(range, values).await
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<(), RowStoreError> {
        (**self).batch_write(updates).await
    }
}
