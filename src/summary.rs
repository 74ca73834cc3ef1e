use getset::Getters;
use serde::Serialize;

use crate::models::{STATUS_COLUMN, Status, Table};

/// Totals of a reconciled table; rows without an `OK` status count as unmatched.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
pub struct Summary {
    #[getset(get = "pub")]
    total: usize,
    #[getset(get = "pub")]
    matched: usize,
    #[getset(get = "pub")]
    unmatched: usize,
}

impl Summary {
    pub fn from_result(result: &Table) -> Self {
        let total = result.len();
        let matched = result
            .column(STATUS_COLUMN)
            .unwrap_or_default()
            .iter()
            .filter(|status| **status == Some(Status::Matched.label()))
            .count();

        Summary {
            total,
            matched,
            unmatched: total - matched,
        }
    }

    /// Fraction of matched rows in `[0, 1]`; zero for an empty result.
    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total as f64
    }

    pub fn match_percentage(&self) -> f64 {
        self.match_rate() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(statuses: &[Status]) -> Table {
        Table::from_rows(
            vec!["id".to_string(), STATUS_COLUMN.to_string()],
            statuses
                .iter()
                .map(|s| vec![None, Some(s.label().to_string())])
                .collect(),
        )
    }

    #[test]
    fn test_counts_and_rate() {
        let summary = Summary::from_result(&result(&[
            Status::Matched,
            Status::Unmatched,
            Status::Matched,
            Status::Matched,
        ]));
        assert_eq!(*summary.total(), 4);
        assert_eq!(*summary.matched(), 3);
        assert_eq!(*summary.unmatched(), 1);
        assert!((summary.match_rate() - 0.75).abs() < f64::EPSILON);
        assert!((summary.match_percentage() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_has_zero_rate() {
        let summary = Summary::from_result(&result(&[]));
        assert_eq!(*summary.total(), 0);
        assert_eq!(summary.match_rate(), 0.0);
    }

    #[test]
    fn test_table_without_status_column_counts_every_row_unmatched() {
        let table = Table::from_rows(
            vec!["id".to_string()],
            vec![vec![Some("1".to_string())], vec![None]],
        );
        let summary = Summary::from_result(&table);
        assert_eq!(*summary.total(), 2);
        assert_eq!(*summary.matched(), 0);
        assert_eq!(*summary.unmatched(), 2);
    }
}
