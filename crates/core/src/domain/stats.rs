use serde::{Deserialize, Serialize};

use crate::domain::lead::{LeadState, Outcome, ResultCell};

/// Aggregate counts over the leads of the store. Blank rows (no id, name, company or
/// title) are not leads and are left out of `total`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub successful: u64,
    pub rejected: u64,
    pub ignored: u64,
    /// Non-empty results outside the known vocabulary. Included in `total` and
    /// `completed`, excluded from every typed bucket.
    pub unrecognized: u64,
}

impl LeadStats {
    pub fn from_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a ResultCell>,
    {
        let mut stats = Self::default();
        for cell in cells {
            stats.record(cell);
        }
        stats
    }

    pub fn record(&mut self, cell: &ResultCell) {
        self.total += 1;
        match cell {
            ResultCell::State(LeadState::Pending) => self.pending += 1,
            ResultCell::State(LeadState::InProgress) => self.in_progress += 1,
            ResultCell::State(LeadState::Completed(Outcome::Successful)) => self.successful += 1,
            ResultCell::State(LeadState::Completed(Outcome::Rejected)) => self.rejected += 1,
            ResultCell::State(LeadState::Completed(Outcome::Ignored)) => self.ignored += 1,
            ResultCell::Unrecognized(_) => self.unrecognized += 1,
        }
        self.completed = self.total - self.pending - self.in_progress;
    }
}

#[cfg(test)]
mod tests {
    use super::LeadStats;
    use crate::domain::lead::ResultCell;

    #[test]
    fn classifies_mixed_case_results() {
        let cells: Vec<ResultCell> =
            ["", "In Progress", "Successful", "Rejected", "Ignored", "successful"]
                .iter()
                .map(|value| ResultCell::parse(value))
                .collect();

        let stats = LeadStats::from_cells(&cells);

        assert_eq!(
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
    }

    #[test]
    fn unrecognized_results_count_toward_total_only() {
        let cells = vec![ResultCell::parse("maybe"), ResultCell::parse("")];
        let stats = LeadStats::from_cells(&cells);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.successful + stats.rejected + stats.ignored, 0);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn empty_store_has_zero_counts() {
        assert_eq!(LeadStats::from_cells(&Vec::<ResultCell>::new()), LeadStats::default());
    }
}
