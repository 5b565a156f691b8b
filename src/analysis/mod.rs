//! Batch analysis: success filtering, parameter checks, aggregation, reporting
//!
//! Every function here is pure over fully loaded runs: nothing is cached,
//! nothing is mutated, and the result does not depend on input order.
//!
//! ```text
//! runs ──> filter_successful
//!      ──> verify_params ──> aggregate ──> {success_rates, renderer}
//! ```

mod aggregate;
mod filter;
mod report;
mod verify;

use std::collections::BTreeMap;

pub use aggregate::{
    aggregate, aggregate_with, AggregateOptions, AggregatedSeries, POP_COUNT, SHARE_AVG, SHARE_LOWER,
    SHARE_MAX, SHARE_MIN, SHARE_SD, SHARE_UPPER,
};
pub use filter::filter_successful;
pub use report::{select_summaries, success_rates, SuccessSummary, SuccessTable};
pub use verify::verify_params;

use crate::experiment::RunRecord;
use crate::Result;

/// Distinct experiment names, sorted lexicographically.
#[must_use]
pub fn run_names(runs: &[RunRecord]) -> Vec<&str> {
    let mut names: Vec<&str> = runs.iter().map(RunRecord::run_name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Sub-mapping of `map` restricted to `names`, still ordered by name.
///
/// Names absent from `map` are ignored.
#[must_use]
pub fn select<T: Clone, S: AsRef<str>>(
    map: &BTreeMap<String, T>,
    names: &[S],
) -> BTreeMap<String, T> {
    map.iter()
        .filter(|(name, _)| names.iter().any(|n| n.as_ref() == name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Successful runs of every experiment, keyed by name.
///
/// Every name present in `runs` gets an entry, possibly empty. Runs within a
/// group are ordered by id so reductions over them are reproducible.
fn successful_by_name(runs: &[RunRecord]) -> Result<BTreeMap<&str, Vec<&RunRecord>>> {
    let mut groups: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
    for run in runs {
        let group = groups.entry(run.run_name()).or_default();
        if run.is_success()? {
            group.push(run);
        }
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.key().cmp(b.key()));
    }
    Ok(groups)
}
