use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::lead::{Outcome, RowIndex};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub String);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a chat event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Operator {
    /// Value written to the completed-by column, e.g. `1001 @alice`.
    pub fn completed_by_tag(&self) -> String {
        let handle = self
            .username
            .as_deref()
            .filter(|value| !value.is_empty())
            .or_else(|| self.first_name.as_deref().filter(|value| !value.is_empty()))
            .unwrap_or("Unknown");
        format!("{} @{}", self.id, handle)
    }
}

/// A parked "awaiting reason" step. Operators without a pending action have no session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSession {
    pub operator_id: OperatorId,
    pub outcome: Outcome,
    pub row_index: RowIndex,
    pub completed_by: String,
}
