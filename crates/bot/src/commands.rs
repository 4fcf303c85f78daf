use std::fmt;

use outreach_core::{Outcome, RowIndex};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Next,
    Stats,
    Unknown(String),
}

impl BotCommand {
    /// Parses `/next`, `/next@OutreachBot extra` and friends. `None` for plain text.
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.trim().split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split_once('@').map(|(name, _)| name).unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        Some(match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "next" => Self::Next,
            "stats" => Self::Stats,
            other => Self::Unknown(other.to_owned()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackKind {
    /// Outcome button on a lead card.
    Result,
    /// "Skip reason" button on a reason prompt.
    Skip,
}

impl CallbackKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Result => "result",
            Self::Skip => "skip",
        }
    }
}

/// Button payload: `(action, outcome, row)` encoded as `action:outcome:row`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackAction {
    pub kind: CallbackKind,
    pub outcome: Outcome,
    pub row_index: RowIndex,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("malformed button payload `{0}`")]
    MalformedCallback(String),
    #[error("unknown outcome `{0}` in button payload")]
    UnknownOutcome(String),
    #[error("row `{0}` in button payload is not a data row")]
    InvalidRow(String),
}

impl CallbackAction {
    pub fn result(outcome: Outcome, row_index: RowIndex) -> Self {
        Self { kind: CallbackKind::Result, outcome, row_index }
    }

    pub fn skip(outcome: Outcome, row_index: RowIndex) -> Self {
        Self { kind: CallbackKind::Skip, outcome, row_index }
    }

    pub fn parse(data: &str) -> Result<Self, CommandParseError> {
        let malformed = || CommandParseError::MalformedCallback(data.to_owned());
        let (kind, rest) = data.split_once(':').ok_or_else(malformed)?;
        let (outcome, row) = rest.rsplit_once(':').ok_or_else(malformed)?;

        let kind = match kind {
            "result" => CallbackKind::Result,
            "skip" => CallbackKind::Skip,
            _ => return Err(malformed()),
        };
        if outcome.is_empty() || row.is_empty() || !row.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let outcome =
            Outcome::parse(outcome).ok_or_else(|| CommandParseError::UnknownOutcome(outcome.to_owned()))?;
        let row_index = row
            .parse::<u32>()
            .ok()
            .and_then(RowIndex::new)
            .ok_or_else(|| CommandParseError::InvalidRow(row.to_owned()))?;

        Ok(Self { kind, outcome, row_index })
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.outcome.token(), self.row_index)
    }
}
