use std::fmt;

use serde::{Deserialize, Serialize};

/// 1-based position of a lead in the row store. Row 1 holds the headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowIndex(u32);

impl RowIndex {
    pub const FIRST_DATA_ROW: u32 = 2;

    pub fn new(value: u32) -> Option<Self> {
        (value >= Self::FIRST_DATA_ROW).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Position among data rows, as shown to operators (`Lead #1` is row 2).
    pub fn display_number(self) -> u32 {
        self.0 - 1
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Successful,
    Rejected,
    Ignored,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Successful, Outcome::Rejected, Outcome::Ignored];

    /// Canonical value stored in the result column.
    pub fn label(self) -> &'static str {
        match self {
            Self::Successful => "Successful",
            Self::Rejected => "Rejected",
            Self::Ignored => "Ignored",
        }
    }

    /// Lowercase form used in button payloads.
    pub fn token(self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "successful" | "success" => Some(Self::Successful),
            "rejected" | "rejection" => Some(Self::Rejected),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }

    pub fn requires_reason(self) -> bool {
        matches!(self, Self::Successful | Self::Rejected)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadState {
    Pending,
    InProgress,
    Completed(Outcome),
}

impl LeadState {
    pub const IN_PROGRESS_LABEL: &'static str = "In Progress";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "",
            Self::InProgress => Self::IN_PROGRESS_LABEL,
            Self::Completed(outcome) => outcome.label(),
        }
    }

    /// Classifies a raw result cell. Matching is trimmed and case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" => Some(Self::Pending),
            "in progress" => Some(Self::InProgress),
            other => Outcome::parse(other).map(Self::Completed),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Result column as found in the store. Values outside the known vocabulary are
/// kept verbatim so they are never rewritten by accident.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCell {
    State(LeadState),
    Unrecognized(String),
}

impl ResultCell {
    pub fn parse(value: &str) -> Self {
        match LeadState::parse(value) {
            Some(state) => Self::State(state),
            None => Self::Unrecognized(value.trim().to_owned()),
        }
    }

    pub fn state(&self) -> Option<LeadState> {
        match self {
            Self::State(state) => Some(*state),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn is_unclaimed(&self) -> bool {
        matches!(self, Self::State(LeadState::Pending))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub row_index: RowIndex,
    pub id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub original_title: String,
    pub notes: Option<String>,
    pub result: ResultCell,
    pub completed_by: Option<String>,
}

impl LeadRecord {
    /// True while the row is "In Progress" under `completed_by`.
    pub fn is_claimed_by(&self, completed_by: &str) -> bool {
        self.result.state() == Some(LeadState::InProgress)
            && self.completed_by.as_deref() == Some(completed_by.trim())
    }
}

/// Identity columns of a lead produced by the upstream pipeline, before it has a row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLead {
    pub id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: String,
}
