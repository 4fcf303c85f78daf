//! A1 notation for the fixed lead sheet layout.

use outreach_core::RowIndex;

use crate::store::RowStoreError;

/// Lead sheet columns, left to right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Id,
    Name,
    Company,
    OriginalTitle,
    Notes,
    Result,
    CompletedBy,
    ClaimedAt,
}

impl Column {
    pub const HEADERS: [&'static str; 8] = [
        "ID",
        "Name",
        "Company",
        "Original Title",
        "Notes",
        "Result",
        "Completed By",
        "Claimed At",
    ];

    pub fn offset(self) -> usize {
        match self {
            Self::Id => 0,
            Self::Name => 1,
            Self::Company => 2,
            Self::OriginalTitle => 3,
            Self::Notes => 4,
            Self::Result => 5,
            Self::CompletedBy => 6,
            Self::ClaimedAt => 7,
        }
    }

    pub fn letter(self) -> char {
        (b'A' + self.offset() as u8) as char
    }
}

/// Builds ranges for one sheet, optionally qualified by sheet name (`Leads!A:H`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SheetLayout {
    prefix: String,
}

impl SheetLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn all_rows(&self) -> String {
        format!("{}{}:{}", self.prefix, Column::Id.letter(), Column::ClaimedAt.letter())
    }

    pub fn header(&self) -> String {
        format!("{}A1:{}1", self.prefix, Column::ClaimedAt.letter())
    }

    /// Range read by health checks.
    pub fn health_range(&self) -> String {
        format!("{}A1:{}1", self.prefix, Column::CompletedBy.letter())
    }

    pub fn cells(&self, row: RowIndex, from: Column, to: Column) -> String {
        format!("{}{}{}:{}{}", self.prefix, from.letter(), row, to.letter(), row)
    }

    pub fn cell(&self, row: RowIndex, column: Column) -> String {
        self.cells(row, column, column)
    }

    pub fn identity_block(&self, first_row: u32, last_row: u32) -> String {
        format!(
            "{}{}{}:{}{}",
            self.prefix,
            Column::Id.letter(),
            first_row,
            Column::OriginalTitle.letter(),
            last_row
        )
    }
}

/// Parsed A1 range. Rows are 1-based, columns 0-based. Open row bounds mean "to the edge".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct A1Range {
    pub start_column: usize,
    pub start_row: Option<u32>,
    pub end_column: usize,
    pub end_row: Option<u32>,
}

impl A1Range {
    pub fn parse(range: &str) -> Result<Self, RowStoreError> {
        let invalid = || RowStoreError::InvalidRange(range.to_owned());
        let cells = range.rsplit_once('!').map(|(_, cells)| cells).unwrap_or(range);
        let (start, end) = cells.split_once(':').unwrap_or((cells, cells));

        let (start_column, start_row) = parse_cell(start).ok_or_else(invalid)?;
        let (end_column, end_row) = parse_cell(end).ok_or_else(invalid)?;
        if end_column < start_column {
            return Err(invalid());
        }
        if let (Some(start_row), Some(end_row)) = (start_row, end_row) {
            if end_row < start_row {
                return Err(invalid());
            }
        }

        Ok(Self { start_column, start_row, end_column, end_row })
    }

    pub fn width(&self) -> usize {
        self.end_column - self.start_column + 1
    }
}

fn parse_cell(cell: &str) -> Option<(usize, Option<u32>)> {
    let cell = cell.trim();
    let split = cell.find(|ch: char| ch.is_ascii_digit()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }

    let column = letters
        .chars()
        .fold(0usize, |acc, ch| acc * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1))
        - 1;
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<u32>() {
            Ok(row) if row > 0 => Some(row),
            _ => return None,
        }
    };

    Some((column, row))
}
