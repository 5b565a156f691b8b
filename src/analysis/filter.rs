//! Success Filter

use crate::experiment::RunRecord;
use crate::Result;

/// Runs that reached their final day, in input order.
///
/// # Errors
///
/// Returns [`crate::Error::NotLoaded`] if any run was never loaded.
pub fn filter_successful(runs: &[RunRecord]) -> Result<Vec<&RunRecord>> {
    let mut successful = Vec::with_capacity(runs.len());
    for run in runs {
        if run.is_success()? {
            successful.push(run);
        }
    }
    Ok(successful)
}
