//! Parameter Consistency Check
//!
//! Successful runs sharing a name are repeated trials of one configuration.
//! Divergent params mean the batch itself is corrupt, so the check stops at
//! the first mismatch instead of averaging incompatible trials.

use tracing::debug;

use super::successful_by_name;
use crate::experiment::RunRecord;
use crate::{Error, Result};

/// Check that all successful runs of each experiment carry identical params.
///
/// Groups are scanned in name order, runs within a group in id order; the
/// lowest-id successful run is the reference.
///
/// # Errors
///
/// Returns [`Error::ParamMismatch`] naming the first offending run, or
/// [`Error::NotLoaded`] if any run was never loaded.
pub fn verify_params(runs: &[RunRecord]) -> Result<()> {
    for (name, group) in successful_by_name(runs)? {
        let Some((reference, rest)) = group.split_first() else {
            continue;
        };
        if let Some(offender) = rest.iter().find(|run| run.params() != reference.params()) {
            return Err(Error::ParamMismatch {
                run_name: name.to_string(),
                run_id: offender.run_id().to_string(),
                reference_id: reference.run_id().to_string(),
            });
        }
        debug!(experiment = name, runs = group.len(), "params consistent");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::run;
    use crate::experiment::{RunParams, TimeSeries};

    fn run_with(name: &str, id: &str, params: RunParams, last_tick: i64) -> RunRecord {
        let ticks: Vec<i64> = (0..=last_tick).collect();
        let series = TimeSeries::from_columns(ticks, vec![]).unwrap();
        RunRecord::new(name, id).load_params(series, params).unwrap()
    }

    #[test]
    fn test_identical_params_pass() {
        let runs = vec![
            run_with("a", "1", RunParams::new(3).with("seed", 1), 2),
            run_with("a", "2", RunParams::new(3).with("seed", 1), 2),
        ];
        assert!(verify_params(&runs).is_ok());
    }

    #[test]
    fn test_mismatch_detected() {
        let runs = vec![
            run("B", "1", 10, 9, &[]),
            run("B", "2", 20, 19, &[]),
        ];
        let err = verify_params(&runs).unwrap_err();
        assert!(matches!(
            err,
            Error::ParamMismatch { ref run_name, ref run_id, ref reference_id }
                if run_name == "B" && run_id == "2" && reference_id == "1"
        ));
    }

    #[test]
    fn test_failed_runs_ignored() {
        // "2" differs but never finished, so it is not compared
        let runs = vec![
            run_with("a", "1", RunParams::new(3), 2),
            run_with("a", "2", RunParams::new(3).with("food", 2), 0),
        ];
        assert!(verify_params(&runs).is_ok());
    }

    #[test]
    fn test_single_and_empty_groups_pass() {
        assert!(verify_params(&[]).is_ok());
        assert!(verify_params(&[run("solo", "1", 1, 0, &[])]).is_ok());
    }
}
