use std::collections::HashSet;

use outreach_core::OperatorId;

/// Operator allow-list. An empty list lets everyone through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed: HashSet<String>,
}

impl AccessPolicy {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn from_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = users
            .into_iter()
            .map(|user| user.as_ref().trim().to_owned())
            .filter(|user| !user.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn permits(&self, operator: &OperatorId) -> bool {
        self.is_open() || self.allowed.contains(operator.0.as_str())
    }
}
