//! Success-Rate Reporter

use std::fmt;

use serde::{Deserialize, Serialize};

use super::run_names;
use crate::experiment::RunRecord;
use crate::{Error, Result};

/// Per-experiment run totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessSummary {
    /// Experiment name
    pub run_name: String,
    /// Every run with this name, including failed and unparsable ones
    pub total_count: usize,
    /// Runs that reached their final day
    pub success_count: usize,
    /// `success_count / total_count`
    pub success_rate: f64,
}

impl SuccessSummary {
    /// Build a summary row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DivideByZero`] if `total_count` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        run_name: impl Into<String>,
        total_count: usize,
        success_count: usize,
    ) -> Result<Self> {
        let run_name = run_name.into();
        if total_count == 0 {
            return Err(Error::DivideByZero(run_name));
        }
        Ok(Self {
            run_name,
            total_count,
            success_count,
            success_rate: success_count as f64 / total_count as f64,
        })
    }
}

/// One summary row per experiment, sorted by name.
///
/// # Errors
///
/// Returns [`Error::NotLoaded`] if any run was never loaded.
pub fn success_rates(runs: &[RunRecord]) -> Result<Vec<SuccessSummary>> {
    run_names(runs)
        .into_iter()
        .map(|name| {
            let mut total = 0;
            let mut successes = 0;
            for run in runs.iter().filter(|r| r.run_name() == name) {
                total += 1;
                if run.is_success()? {
                    successes += 1;
                }
            }
            SuccessSummary::new(name, total, successes)
        })
        .collect()
}

/// Rows whose experiment is in `names`, keeping name order.
#[must_use]
pub fn select_summaries<S: AsRef<str>>(
    rows: &[SuccessSummary],
    names: &[S],
) -> Vec<SuccessSummary> {
    rows.iter()
        .filter(|row| names.iter().any(|n| n.as_ref() == row.run_name))
        .cloned()
        .collect()
}

/// Console rendering of summary rows as an aligned table.
pub struct SuccessTable<'a>(pub &'a [SuccessSummary]);

impl fmt::Display for SuccessTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .0
            .iter()
            .map(|row| row.run_name.len())
            .chain(std::iter::once("run_name".len()))
            .max()
            .unwrap_or_default();

        writeln!(
            f,
            "{:<width$}  {:>8}  {:>9}  {:>12}",
            "run_name", "count", "successes", "success_rate"
        )?;
        for row in self.0 {
            writeln!(
                f,
                "{:<width$}  {:>8}  {:>9}  {:>12.6}",
                row.run_name, row.total_count, row.success_count, row.success_rate
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::run;
    use crate::experiment::RunKey;

    #[test]
    fn test_success_rate_arithmetic() {
        let runs = vec![
            run("C", "1", 5, 4, &[]),
            run("C", "2", 5, 4, &[]),
            run("C", "3", 5, 4, &[]),
            run("C", "4", 5, 1, &[]),
        ];
        let rows = success_rates(&runs).unwrap();
        assert_eq!(rows, vec![SuccessSummary::new("C", 4, 3).unwrap()]);
        assert!((rows[0].success_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rows_sorted_by_name() {
        let runs = vec![run("z", "1", 1, 0, &[]), run("a", "1", 2, 0, &[])];
        let rows = success_rates(&runs).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.run_name.as_str()).collect();
        assert_eq!(names, vec!["a", "z"]);
        assert!((rows[0].success_rate).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_failures_count_toward_total() {
        let runs = vec![
            run("x", "1", 1, 0, &[]),
            RunRecord::failed(RunKey::new("x", "2"), "bad csv"),
        ];
        let rows = success_rates(&runs).unwrap();
        assert_eq!(rows[0].total_count, 2);
        assert_eq!(rows[0].success_count, 1);
    }

    #[test]
    fn test_zero_total_is_error() {
        assert!(matches!(
            SuccessSummary::new("ghost", 0, 0),
            Err(Error::DivideByZero(ref name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_select_and_table() {
        let rows = vec![
            SuccessSummary::new("default", 4, 2).unwrap(),
            SuccessSummary::new("pg10", 2, 2).unwrap(),
        ];
        let picked = select_summaries(&rows, &["pg10"]);
        assert_eq!(picked.len(), 1);

        let table = SuccessTable(&rows).to_string();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("run_name"));
        assert!(lines[1].starts_with("default"));
        assert!(lines[1].ends_with("0.500000"));
    }
}
